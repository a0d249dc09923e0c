//! Journal entry record.
//!
//! An `Entry` is created by the store, edited through [`Entry::update`], and
//! renamed only when persistence reports a filename collision.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Identifier for an entry. 128 random bits.
pub type EntryId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Entry {
    id: EntryId,
    title: String,
    content: String,
    date_created: DateTime<Utc>,
    date_edited: DateTime<Utc>,
}

impl Entry {
    /// Create a new entry with a fresh id. Both timestamps are set to now.
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            content: content.into(),
            date_created: now,
            date_edited: now,
        }
    }

    /// Rebuild an entry from stored fields.
    ///
    /// Used by the codec and by tests; an edit date earlier than the creation
    /// date is clamped up to the creation date.
    pub fn from_parts(
        id: EntryId,
        title: String,
        content: String,
        date_created: DateTime<Utc>,
        date_edited: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title,
            content,
            date_created,
            date_edited: date_edited.max(date_created),
        }
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn date_created(&self) -> DateTime<Utc> {
        self.date_created
    }

    pub fn date_edited(&self) -> DateTime<Utc> {
        self.date_edited
    }

    /// Edit an entry, refreshing the edit date.
    ///
    /// `None` leaves a field untouched. When neither field is supplied the
    /// entry is not modified at all.
    pub fn update(&mut self, title: Option<String>, content: Option<String>) {
        if title.is_none() && content.is_none() {
            return;
        }
        if let Some(title) = title {
            self.title = title;
        }
        if let Some(content) = content {
            self.content = content;
        }
        self.date_edited = Utc::now().max(self.date_created);
    }

    /// Replace the id after a storage naming collision. Dates are unchanged.
    pub fn reassign_id(&mut self, new_id: EntryId) {
        self.id = new_id;
    }
}
