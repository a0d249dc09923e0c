//! CLI argument parsing with clap.
//!
//! Two surfaces lead to the same actions: the `add`/`list` subcommands and
//! the options-only form `--create <body> --title <title> --list`.

use clap::{CommandFactory, Parser, Subcommand};
use journal_core::LoadingMode;
use std::io::{self, ErrorKind};
use std::path::PathBuf;

/// journal - Store and display personal journal entries
#[derive(Parser, Debug)]
#[command(
    name = "journal",
    version,
    about = "Store and display personal journal entries.",
    after_help = CLI_AFTER_HELP
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Add an entry with a body
    #[arg(long = "create", value_name = "ENTRY BODY")]
    pub create: Option<String>,

    /// Add an entry with a title
    #[arg(long = "title", value_name = "ENTRY TITLE")]
    pub title: Option<String>,

    /// Enumerate your journal entries
    #[arg(long = "list")]
    pub list: bool,

    /// Include entry IDs in listings
    #[arg(long = "ids", global = true)]
    pub ids: bool,

    /// Show debug logging (RUST_LOG takes precedence)
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    /// Journal home holding config.toml (overrides JOURNAL_HOME)
    #[arg(long = "home", value_name = "DIR", global = true)]
    pub home: Option<PathBuf>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Add entries to your journal
    Add {
        /// Add an entry with a title
        #[arg(short = 't', long = "title", value_name = "ENTRY TITLE", default_value = "")]
        title: String,
        /// Add an entry with a body
        #[arg(short = 'e', long = "entry", value_name = "ENTRY BODY", default_value = "")]
        entry: String,
    },
    /// Enumerate your journal entries
    List,
}

const CLI_AFTER_HELP: &str = r#"EXAMPLES:
  journal add -t "Monday" -e "Started a journal"
  journal list
  journal --create "Started a journal" --title "Monday" --list

Configuration is read from $JOURNAL_HOME/config.toml (default ~/.journal)."#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Nothing to do: show help and fail.
    Help,
    Run { add: Option<NewEntry>, list: bool },
}

impl Action {
    /// Adding alone never needs the existing entries.
    pub fn loading_mode(&self) -> LoadingMode {
        match self {
            Action::Run { list: true, .. } => LoadingMode::Immediate,
            _ => LoadingMode::WriteOnly,
        }
    }
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn parse_args() -> io::Result<Self> {
        let args: Vec<String> = std::env::args().collect();
        Self::parse_from_args(&args)
    }

    /// Parse CLI arguments from a slice (testable version)
    ///
    /// `--help` and `--version` print and exit here, as clap does.
    pub fn parse_from_args(args: &[String]) -> io::Result<Self> {
        match Self::try_parse_from(args) {
            Ok(cli) => Ok(cli),
            Err(e) if !e.use_stderr() => e.exit(),
            Err(e) => Err(io::Error::new(ErrorKind::InvalidInput, e.to_string())),
        }
    }

    pub fn help_text() -> String {
        Self::command().render_help().to_string()
    }

    /// Resolve what to do.
    pub fn action(&self) -> io::Result<Action> {
        let has_options = self.create.is_some() || self.title.is_some() || self.list;

        match &self.command {
            Some(_) if has_options => Err(io::Error::new(
                ErrorKind::InvalidInput,
                "Use either a subcommand or --create/--title/--list, not both",
            )),
            Some(Commands::Add { title, entry }) => {
                if title.trim().is_empty() && entry.trim().is_empty() {
                    return Err(io::Error::new(
                        ErrorKind::InvalidInput,
                        "Nothing to add: provide --title or --entry",
                    ));
                }
                Ok(Action::Run {
                    add: Some(NewEntry {
                        title: title.clone(),
                        content: entry.clone(),
                    }),
                    list: false,
                })
            }
            Some(Commands::List) => Ok(Action::Run {
                add: None,
                list: true,
            }),
            None => {
                let title = self.title.clone().unwrap_or_default();
                let content = self.create.clone().unwrap_or_default();
                let add = (!title.is_empty() || !content.is_empty())
                    .then_some(NewEntry { title, content });
                if add.is_none() && !self.list {
                    return Ok(Action::Help);
                }
                Ok(Action::Run {
                    add,
                    list: self.list,
                })
            }
        }
    }
}
