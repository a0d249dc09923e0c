//! Output handling for the CLI.
//!
//! Results go to stdout; diagnostics go to stderr and only in verbose mode.

use crate::table::{Adjustability, Column, PlainTextTable, TableOptions, Wrap};
use journal_core::{Entry, EntryFormatting};
use std::io::{self, IsTerminal};

/// Viewport width when stdout is not a terminal or its size is unknown.
pub const FALLBACK_VIEWPORT_WIDTH: usize = 30;

/// Progress notices shown with `--verbose`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliEvent {
    EntryQueued { title: String },
    Listed { count: usize },
}

#[derive(Default)]
pub struct OutputHandler {
    verbose: bool,
}

impl OutputHandler {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    pub fn emit_result(&self, content: &str) {
        println!("{}", content);
    }

    pub fn emit_event(&self, event: CliEvent) {
        if !self.verbose {
            return;
        }
        eprintln!("{}", describe(&event));
    }

    /// Width available for tables.
    pub fn viewport_width(&self) -> usize {
        if !io::stdout().is_terminal() {
            return FALLBACK_VIEWPORT_WIDTH;
        }
        match crossterm::terminal::size() {
            Ok((cols, _)) if cols > 0 => usize::from(cols),
            _ => FALLBACK_VIEWPORT_WIDTH,
        }
    }
}

fn describe(event: &CliEvent) -> String {
    match event {
        CliEvent::EntryQueued { title } if title.is_empty() => "[Entry queued]".to_string(),
        CliEvent::EntryQueued { title } => format!("[Entry queued: {}]", title),
        CliEvent::Listed { count: 1 } => "[1 entry]".to_string(),
        CliEvent::Listed { count } => format!("[{} entries]", count),
    }
}

/// Lay out `entries` as a zero-indexed table fitted to `viewport_width`.
/// The result has no trailing newline.
pub fn entry_table(
    entries: &[Entry],
    formatter: &impl EntryFormatting,
    show_ids: bool,
    viewport_width: usize,
) -> String {
    let mut columns = Vec::new();
    if show_ids {
        columns.push(
            Column::new("Id", Adjustability::Fixed, Wrap::TruncateInsideColumn).min_width(36),
        );
    }
    columns.push(
        Column::new("Title", Adjustability::Resistance(1), Wrap::WrapInsideColumn).min_width(10),
    );
    columns.push(
        Column::new("Edited", Adjustability::Resistance(0), Wrap::TruncateInsideColumn)
            .min_width(10)
            .max_width(16),
    );

    let mut table = PlainTextTable::new(
        columns,
        TableOptions {
            index_start: Some(0),
            margin: 1,
            show_headers: true,
            capitalize_headers: true,
        },
    );
    table.layout_for_viewport(viewport_width);

    let rows: Vec<Vec<String>> = entries
        .iter()
        .map(|entry| {
            let mut row = Vec::with_capacity(3);
            if show_ids {
                row.push(formatter.format_id(entry.id()));
            }
            row.push(formatter.format_title(entry.title()));
            row.push(formatter.format_date(entry.date_edited()));
            row
        })
        .collect();

    let mut rendered = table.render(&rows);
    rendered.truncate(rendered.trim_end_matches('\n').len());
    rendered
}
