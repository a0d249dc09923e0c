mod cli;
mod format;
mod output;
mod table;

use cli::{Action, Cli, NewEntry};
use format::TerminalFormatter;
use journal_core::{AppConfig, JournalApp, JournalConfig, LoadingMode, Logger, SystemLogger};
use output::{CliEvent, OutputHandler, entry_table};
use std::io::{self, ErrorKind};
use std::sync::Arc;

/// Initialise the `log` backend. RUST_LOG overrides the default level.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

async fn execute(
    add: Option<NewEntry>,
    list: bool,
    config: AppConfig,
    show_ids: bool,
    output: &OutputHandler,
) -> io::Result<()> {
    let logger: Arc<dyn Logger> = Arc::new(SystemLogger::new("journal"));
    let app = JournalApp::load(config, logger)?;
    app.start().await.map_err(io::Error::other)?;

    if let Some(entry) = add {
        output.emit_event(CliEvent::EntryQueued {
            title: entry.title.clone(),
        });
        app.store().add_entry(entry.title, entry.content);
    }

    if list {
        let entries = app.store().list_entries().await;
        output.emit_event(CliEvent::Listed {
            count: entries.len(),
        });
        output.emit_result(&entry_table(
            &entries,
            &TerminalFormatter,
            show_ids,
            output.viewport_width(),
        ));
    }

    app.exit().await.map_err(io::Error::other)
}

#[tokio::main]
async fn main() -> io::Result<()> {
    let cli = Cli::parse_args()?;
    init_logging(cli.verbose);
    let output = OutputHandler::new(cli.verbose);

    let action = cli.action()?;
    let Action::Run { add, list } = &action else {
        println!("{}", Cli::help_text());
        return Err(io::Error::new(
            ErrorKind::InvalidInput,
            "No entry to add and nothing to list",
        ));
    };

    let journal = JournalConfig::load(cli.home.clone())?;
    log::debug!("library location: {:?}", journal.location);
    let config = match action.loading_mode() {
        LoadingMode::Immediate => AppConfig::development(journal),
        LoadingMode::WriteOnly => AppConfig::add_only(journal),
    };

    execute(add.clone(), *list, config, cli.ids, &output).await
}
