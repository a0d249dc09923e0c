use chrono::{DateTime, Local, Utc};
use journal_core::{EntryFormatting, EntryId};

const UNTITLED: &str = "[Untitled]";

/// Short, local-time formatting for terminal listings.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalFormatter;

impl EntryFormatting for TerminalFormatter {
    fn format_id(&self, id: EntryId) -> String {
        id.hyphenated()
            .encode_upper(&mut uuid::Uuid::encode_buffer())
            .to_string()
    }

    fn format_date(&self, date: DateTime<Utc>) -> String {
        date.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
    }

    fn format_title(&self, title: &str) -> String {
        if title.trim().is_empty() {
            UNTITLED.to_string()
        } else {
            title.to_string()
        }
    }
}
