pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod filter;
pub mod reminder;
pub mod render;
pub mod reorder;
pub mod store;
pub mod task;

use std::ffi::OsString;
use std::io::{self, BufRead, IsTerminal, Write};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing::info;

#[tracing::instrument(skip_all)]
pub fn run(raw_args: Vec<OsString>) -> anyhow::Result<()> {
    let cli = cli::GlobalCli::parse_from(raw_args);
    cli::init_tracing(cli.verbose, cli.quiet)?;

    info!(verbose = cli.verbose, quiet = cli.quiet, "starting duely session");

    let mut cfg = config::Config::load(cli.config.as_deref())?;
    cfg.apply_overrides(
        cli.rc_overrides
            .into_iter()
            .map(|kv| (kv.key, kv.value)),
    )?;

    let data_dir = config::resolve_data_dir(&cfg, cli.data.as_deref())
        .context("failed to resolve data directory")?;

    let store = store::TaskStore::open(&data_dir)
        .with_context(|| format!("failed to open task store at {}", data_dir.display()))?;
    let store = Arc::new(Mutex::new(store));

    let reminder = reminder::Reminder::spawn(
        Arc::clone(&store),
        cfg.reminder.tick(),
        cfg.reminder.window(),
        render::print_reminder,
    );

    let mut renderer = render::Renderer::new(&cfg);
    let mut session = commands::Session {
        filter: cfg.default_filter,
    };

    commands::render_view(&store, &session, &mut renderer, Utc::now())?;

    let interactive = io::stdin().is_terminal();
    let stdin = io::stdin();
    let mut out = io::stdout();

    loop {
        if interactive {
            write!(out, "duely> ")?;
            out.flush()?;
        }

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        match commands::dispatch(&store, &mut session, &mut renderer, &line)? {
            commands::Outcome::Quit => break,
            commands::Outcome::Continue => {}
        }
    }

    reminder.cancel();
    info!("session ended");
    Ok(())
}
