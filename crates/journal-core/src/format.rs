//! Display formatting for entries.

use chrono::{DateTime, Utc};

use crate::entry::EntryId;

/// Turns entry fields into display strings. Frontends supply their own.
pub trait EntryFormatting {
    fn format_id(&self, id: EntryId) -> String;

    fn format_date(&self, date: DateTime<Utc>) -> String;

    fn format_title(&self, title: &str) -> String;
}
