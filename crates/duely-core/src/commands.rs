use std::sync::{Mutex, MutexGuard};

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::datetime;
use crate::filter::{self, FilterMode};
use crate::render::Renderer;
use crate::reorder::{self, DragResult};
use crate::store::TaskStore;
use crate::task::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    Quit,
}

#[derive(Debug)]
pub struct Session {
    pub filter: FilterMode,
}

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "add", "list", "filter", "done", "edit", "delete", "move", "help", "quit", "exit",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[instrument(skip(store, session, renderer, line))]
pub fn dispatch(
    store: &Mutex<TaskStore>,
    session: &mut Session,
    renderer: &mut Renderer,
    line: &str,
) -> anyhow::Result<Outcome> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let Some((&head, args)) = tokens.split_first() else {
        return Ok(Outcome::Continue);
    };

    let now = Utc::now();
    let known = known_command_names();
    let Some(command) = expand_command_abbrev(head, &known) else {
        println!("unknown command: {head} (try: help)");
        return Ok(Outcome::Continue);
    };

    debug!(command, args = ?args, "dispatching command");

    match command {
        "quit" | "exit" => return Ok(Outcome::Quit),
        "help" => renderer.print_help()?,
        "list" => render_view(store, session, renderer, now)?,
        "filter" => cmd_filter(store, session, renderer, args, now)?,
        "add" => cmd_add(store, session, renderer, args, now)?,
        "done" => cmd_toggle(store, session, renderer, args, now)?,
        "edit" => cmd_edit(store, session, renderer, args, now)?,
        "delete" => cmd_delete(store, session, renderer, args, now)?,
        "move" => cmd_move(store, session, renderer, args, now)?,
        other => return Err(anyhow!("unhandled command: {other}")),
    }

    Ok(Outcome::Continue)
}

#[instrument(skip_all)]
fn cmd_add(
    store: &Mutex<TaskStore>,
    session: &mut Session,
    renderer: &mut Renderer,
    args: &[&str],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let mut text_parts: Vec<&str> = Vec::new();
    let mut deadline = None;

    for arg in args {
        if let Some(raw) = arg.strip_prefix("due:") {
            match datetime::parse_deadline(raw) {
                Ok(parsed) => deadline = Some(parsed),
                Err(err) => {
                    debug!(error = %err, "add skipped: unparseable deadline");
                    return Ok(());
                }
            }
            continue;
        }
        text_parts.push(arg);
    }

    let Some(deadline) = deadline else {
        debug!("add skipped: missing deadline");
        return Ok(());
    };

    let text = text_parts.join(" ");
    let mut guard = lock_store(store)?;
    let added = guard.add(&text, deadline)?;
    drop(guard);

    if added.is_some() {
        render_view(store, session, renderer, now)?;
    }
    Ok(())
}

#[instrument(skip_all)]
fn cmd_filter(
    store: &Mutex<TaskStore>,
    session: &mut Session,
    renderer: &mut Renderer,
    args: &[&str],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let Some(&raw) = args.first() else {
        renderer.print_filter_mode(session.filter)?;
        return Ok(());
    };

    match raw.parse::<FilterMode>() {
        Ok(mode) => {
            session.filter = mode;
            render_view(store, session, renderer, now)?;
        }
        Err(err) => println!("{err:#}"),
    }
    Ok(())
}

#[instrument(skip_all)]
fn cmd_toggle(
    store: &Mutex<TaskStore>,
    session: &mut Session,
    renderer: &mut Renderer,
    args: &[&str],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let Some(&raw) = args.first() else {
        println!("done requires a position (see: list)");
        return Ok(());
    };

    let mut guard = lock_store(store)?;
    let Some(id) = resolve_position(guard.tasks(), session.filter, now, raw) else {
        drop(guard);
        println!("no task at position {raw}");
        return Ok(());
    };

    guard.toggle_done(id)?;
    drop(guard);
    render_view(store, session, renderer, now)
}

#[instrument(skip_all)]
fn cmd_edit(
    store: &Mutex<TaskStore>,
    session: &mut Session,
    renderer: &mut Renderer,
    args: &[&str],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let Some((&raw, rest)) = args.split_first() else {
        println!("edit requires a position and replacement text");
        return Ok(());
    };

    let new_text = rest.join(" ");
    if new_text.trim().is_empty() {
        debug!("edit skipped: empty replacement text");
        return Ok(());
    }

    let mut guard = lock_store(store)?;
    let Some(id) = resolve_position(guard.tasks(), session.filter, now, raw) else {
        drop(guard);
        println!("no task at position {raw}");
        return Ok(());
    };

    let changed = guard.edit(id, &new_text)?;
    drop(guard);

    if changed {
        render_view(store, session, renderer, now)?;
    }
    Ok(())
}

#[instrument(skip_all)]
fn cmd_delete(
    store: &Mutex<TaskStore>,
    session: &mut Session,
    renderer: &mut Renderer,
    args: &[&str],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let Some(&raw) = args.first() else {
        println!("delete requires a position (see: list)");
        return Ok(());
    };

    let mut guard = lock_store(store)?;
    let Some(id) = resolve_position(guard.tasks(), session.filter, now, raw) else {
        drop(guard);
        println!("no task at position {raw}");
        return Ok(());
    };

    guard.delete(id)?;
    drop(guard);
    render_view(store, session, renderer, now)
}

#[instrument(skip_all)]
fn cmd_move(
    store: &Mutex<TaskStore>,
    session: &mut Session,
    renderer: &mut Renderer,
    args: &[&str],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let Some(source) = args.first().and_then(|raw| parse_position(raw)) else {
        println!("move requires a source position (see: list)");
        return Ok(());
    };

    // A missing or unparseable destination is the canceled gesture.
    let destination = args.get(1).and_then(|raw| parse_position(raw));

    let drag = DragResult {
        source: source - 1,
        destination: destination.map(|d| d - 1),
    };

    let mut guard = lock_store(store)?;
    let Some(new_order) = reorder::apply_drag(guard.tasks(), session.filter, now, drag) else {
        return Ok(());
    };

    let changed = guard.reorder(new_order)?;
    drop(guard);

    if changed {
        render_view(store, session, renderer, now)?;
    }
    Ok(())
}

pub fn render_view(
    store: &Mutex<TaskStore>,
    session: &Session,
    renderer: &mut Renderer,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let guard = lock_store(store)?;
    renderer.print_task_list(guard.tasks(), session.filter, now)
}

fn lock_store(store: &Mutex<TaskStore>) -> anyhow::Result<MutexGuard<'_, TaskStore>> {
    store.lock().map_err(|_| anyhow!("task store lock poisoned"))
}

fn resolve_position(
    tasks: &[Task],
    mode: FilterMode,
    now: DateTime<Utc>,
    raw: &str,
) -> Option<Uuid> {
    let position = parse_position(raw)?;
    let visible = filter::visible(tasks, mode, now);
    if position > visible.len() {
        return None;
    }
    Some(visible[position - 1].id)
}

// Positions are 1-based, matching the rendered table.
fn parse_position(raw: &str) -> Option<usize> {
    raw.parse::<usize>().ok().filter(|position| *position >= 1)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use tempfile::tempdir;

    use super::{Outcome, Session, dispatch, expand_command_abbrev, known_command_names};
    use crate::config::Config;
    use crate::filter::FilterMode;
    use crate::render::Renderer;
    use crate::store::TaskStore;

    fn harness(dir: &std::path::Path) -> (Mutex<TaskStore>, Session, Renderer) {
        let store = Mutex::new(TaskStore::open(dir).expect("open store"));
        let session = Session {
            filter: FilterMode::All,
        };
        let renderer = Renderer::new(&Config::default());
        (store, session, renderer)
    }

    #[test]
    fn add_requires_text_and_deadline() {
        let temp = tempdir().expect("tempdir");
        let (store, mut session, mut renderer) = harness(temp.path());

        dispatch(&store, &mut session, &mut renderer, "add Buy milk").expect("dispatch");
        assert!(store.lock().expect("lock").tasks().is_empty());

        dispatch(&store, &mut session, &mut renderer, "add due:2099-01-01T10:00")
            .expect("dispatch");
        assert!(store.lock().expect("lock").tasks().is_empty());

        dispatch(
            &store,
            &mut session,
            &mut renderer,
            "add Buy milk due:2099-01-01T10:00",
        )
        .expect("dispatch");

        let guard = store.lock().expect("lock");
        assert_eq!(guard.tasks().len(), 1);
        assert_eq!(guard.tasks()[0].text, "Buy milk");
        assert!(!guard.tasks()[0].done);
    }

    #[test]
    fn unparseable_deadline_never_adds() {
        let temp = tempdir().expect("tempdir");
        let (store, mut session, mut renderer) = harness(temp.path());

        dispatch(&store, &mut session, &mut renderer, "add Buy milk due:soon")
            .expect("dispatch");
        assert!(store.lock().expect("lock").tasks().is_empty());
    }

    #[test]
    fn done_toggles_via_visible_position() {
        let temp = tempdir().expect("tempdir");
        let (store, mut session, mut renderer) = harness(temp.path());

        dispatch(
            &store,
            &mut session,
            &mut renderer,
            "add Buy milk due:2099-01-01T10:00",
        )
        .expect("dispatch");
        dispatch(&store, &mut session, &mut renderer, "done 1").expect("dispatch");
        assert!(store.lock().expect("lock").tasks()[0].done);

        dispatch(&store, &mut session, &mut renderer, "done 1").expect("dispatch");
        assert!(!store.lock().expect("lock").tasks()[0].done);
    }

    #[test]
    fn positions_are_resolved_against_the_active_view() {
        let temp = tempdir().expect("tempdir");
        let (store, mut session, mut renderer) = harness(temp.path());

        dispatch(
            &store,
            &mut session,
            &mut renderer,
            "add First due:2099-01-01T10:00",
        )
        .expect("dispatch");
        dispatch(
            &store,
            &mut session,
            &mut renderer,
            "add Second due:2099-01-02T10:00",
        )
        .expect("dispatch");
        dispatch(&store, &mut session, &mut renderer, "done 2").expect("dispatch");

        // In the done view, position 1 is "Second".
        dispatch(&store, &mut session, &mut renderer, "filter done").expect("dispatch");
        dispatch(&store, &mut session, &mut renderer, "delete 1").expect("dispatch");

        let guard = store.lock().expect("lock");
        assert_eq!(guard.tasks().len(), 1);
        assert_eq!(guard.tasks()[0].text, "First");
    }

    #[test]
    fn out_of_range_position_changes_nothing() {
        let temp = tempdir().expect("tempdir");
        let (store, mut session, mut renderer) = harness(temp.path());

        dispatch(
            &store,
            &mut session,
            &mut renderer,
            "add Only due:2099-01-01T10:00",
        )
        .expect("dispatch");
        dispatch(&store, &mut session, &mut renderer, "delete 5").expect("dispatch");
        dispatch(&store, &mut session, &mut renderer, "done 0").expect("dispatch");

        let guard = store.lock().expect("lock");
        assert_eq!(guard.tasks().len(), 1);
        assert!(!guard.tasks()[0].done);
    }

    #[test]
    fn move_without_destination_is_canceled() {
        let temp = tempdir().expect("tempdir");
        let (store, mut session, mut renderer) = harness(temp.path());

        dispatch(
            &store,
            &mut session,
            &mut renderer,
            "add First due:2099-01-01T10:00",
        )
        .expect("dispatch");
        dispatch(
            &store,
            &mut session,
            &mut renderer,
            "add Second due:2099-01-02T10:00",
        )
        .expect("dispatch");

        dispatch(&store, &mut session, &mut renderer, "move 2").expect("dispatch");
        let guard = store.lock().expect("lock");
        assert_eq!(guard.tasks()[0].text, "First");
    }

    #[test]
    fn move_reorders_the_visible_list() {
        let temp = tempdir().expect("tempdir");
        let (store, mut session, mut renderer) = harness(temp.path());

        for line in [
            "add First due:2099-01-01T10:00",
            "add Second due:2099-01-02T10:00",
            "add Third due:2099-01-03T10:00",
        ] {
            dispatch(&store, &mut session, &mut renderer, line).expect("dispatch");
        }

        dispatch(&store, &mut session, &mut renderer, "move 3 1").expect("dispatch");

        let guard = store.lock().expect("lock");
        let texts: Vec<&str> = guard.tasks().iter().map(|task| task.text.as_str()).collect();
        assert_eq!(texts, vec!["Third", "First", "Second"]);
    }

    #[test]
    fn quit_and_abbreviations() {
        let temp = tempdir().expect("tempdir");
        let (store, mut session, mut renderer) = harness(temp.path());

        let outcome = dispatch(&store, &mut session, &mut renderer, "q").expect("dispatch");
        assert_eq!(outcome, Outcome::Quit);

        // "d" is ambiguous between done and delete, so it resolves to nothing.
        let known = known_command_names();
        assert_eq!(expand_command_abbrev("d", &known), None);
        assert_eq!(expand_command_abbrev("do", &known), Some("done"));
        assert_eq!(expand_command_abbrev("del", &known), Some("delete"));
        assert_eq!(expand_command_abbrev("f", &known), Some("filter"));
    }

    #[test]
    fn unknown_command_keeps_the_session_alive() {
        let temp = tempdir().expect("tempdir");
        let (store, mut session, mut renderer) = harness(temp.path());

        let outcome = dispatch(&store, &mut session, &mut renderer, "zap").expect("dispatch");
        assert_eq!(outcome, Outcome::Continue);
    }

    #[test]
    fn blank_line_is_ignored() {
        let temp = tempdir().expect("tempdir");
        let (store, mut session, mut renderer) = harness(temp.path());

        let outcome = dispatch(&store, &mut session, &mut renderer, "   \n").expect("dispatch");
        assert_eq!(outcome, Outcome::Continue);
    }
}
