use std::io::{self, IsTerminal, Write};

use chrono::{DateTime, Utc};
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::datetime::format_deadline;
use crate::filter::{self, FilterMode};
use crate::task::Task;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> Self {
        Self { color: cfg.color }
    }

    #[tracing::instrument(skip(self, tasks, now))]
    pub fn print_task_list(
        &mut self,
        tasks: &[Task],
        mode: FilterMode,
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        let done_count = tasks.iter().filter(|task| task.done).count();
        let overdue_count = tasks
            .iter()
            .filter(|task| filter::is_overdue(task, now))
            .count();

        let mut subtitle = format!("{} total · {} done", tasks.len(), done_count);
        if overdue_count > 0 {
            subtitle.push_str(&format!(" · {overdue_count} overdue"));
        }
        writeln!(out, "{subtitle}")?;

        let visible = filter::visible(tasks, mode, now);
        if visible.is_empty() {
            let empty_line = match mode {
                FilterMode::Done => "Nothing completed yet.",
                FilterMode::Overdue => "No overdue tasks.",
                _ => "All clear. Add a task with: add <text> due:<deadline>",
            };
            writeln!(out, "{empty_line}")?;
            return Ok(());
        }

        let headers = vec![
            "#".to_string(),
            "Done".to_string(),
            "Due".to_string(),
            "Task".to_string(),
        ];

        let mut rows = Vec::with_capacity(visible.len());
        for (index, task) in visible.iter().enumerate() {
            let position = self.paint(&(index + 1).to_string(), "33");

            let mark = if task.done {
                self.paint("x", "32")
            } else {
                String::new()
            };

            let due = format_deadline(task.deadline);
            let due = if filter::is_overdue(task, now) {
                self.paint(&due, "31")
            } else {
                due
            };

            let text = if task.done {
                self.paint(&task.text, "9")
            } else {
                task.text.clone()
            };

            rows.push(vec![position, mark, due, text]);
        }

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    pub fn print_filter_mode(&mut self, mode: FilterMode) -> anyhow::Result<()> {
        writeln!(io::stdout().lock(), "filter: {mode}")?;
        Ok(())
    }

    pub fn print_help(&mut self) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "commands:")?;
        writeln!(out, "  add <text...> due:<YYYY-MM-DD[THH:MM]>  add a task")?;
        writeln!(out, "  list                                    show the current view")?;
        writeln!(out, "  filter <all|active|overdue|done>        switch the view")?;
        writeln!(out, "  done <pos>                              toggle completion")?;
        writeln!(out, "  edit <pos> <text...>                    replace a task's text")?;
        writeln!(out, "  delete <pos>                            remove a task")?;
        writeln!(out, "  move <src> <dst>                        reorder within the view")?;
        writeln!(out, "  quit                                    end the session")?;
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

// The reminder thread's one push surface: a bell plus a line naming the task.
pub fn print_reminder(task: &Task) {
    eprintln!("\x07Reminder: \"{}\" is due soon!", task.text);
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
