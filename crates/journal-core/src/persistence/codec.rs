//! Versioned on-disk encoding for entries.
//!
//! Every file in the library holds an envelope:
//!
//! ```json
//! {"versionSentinel": 2, "data": "<base64 payload>"}
//! ```
//!
//! The payload layout depends on the schema version. Decoding always starts
//! at the latest schema and walks back through older ones until one parses,
//! then migrates the record forward. New schemas are appended; old variants
//! are never removed.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use uuid::Uuid;

use crate::entry::Entry;

/// Seconds between the Unix epoch and 2001-01-01T00:00:00Z, the reference
/// date used by schema 1 timestamps.
const REFERENCE_DATE_UNIX_OFFSET: f64 = 978_307_200.0;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("file is not a save envelope: {0}")]
    Envelope(#[source] serde_json::Error),
    #[error("parsing failed at {0}")]
    Parse(&'static str),
    #[error("failed to encode entry: {0}")]
    Encode(#[source] serde_json::Error),
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    #[serde(rename = "versionSentinel")]
    version_sentinel: u32,
    #[serde(with = "base64_bytes")]
    data: Vec<u8>,
}

mod base64_bytes {
    use super::*;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

/// Payload schemas, oldest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    /// Camel-case fields, timestamps as seconds since 2001-01-01.
    V1,
    /// RFC 3339 timestamps.
    V2,
}

impl Schema {
    pub const LATEST: Schema = Schema::V2;

    pub fn version(self) -> u32 {
        match self {
            Schema::V1 => 1,
            Schema::V2 => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Schema::V1 => "EntryV1",
            Schema::V2 => "EntryV2",
        }
    }

    fn predecessor(self) -> Option<Schema> {
        match self {
            Schema::V1 => None,
            Schema::V2 => Some(Schema::V1),
        }
    }

    /// Parse the payload as this schema and migrate it to the latest shape.
    fn decode_native(self, payload: &[u8]) -> Option<EntryV2> {
        match self {
            Schema::V1 => serde_json::from_slice::<EntryV1>(payload)
                .ok()
                .and_then(EntryV1::migrate),
            Schema::V2 => serde_json::from_slice::<EntryV2>(payload).ok(),
        }
    }

    /// Try this schema, else delegate to the predecessor.
    fn decode(self, payload: &[u8]) -> Result<EntryV2, CodecError> {
        if let Some(record) = self.decode_native(payload) {
            return Ok(record);
        }
        match self.predecessor() {
            Some(previous) => previous.decode(payload),
            None => Err(CodecError::Parse(self.name())),
        }
    }
}

#[derive(Deserialize)]
struct EntryV1 {
    id: Uuid,
    title: String,
    content: String,
    #[serde(rename = "dateCreated")]
    date_created: f64,
    #[serde(rename = "dateEdited")]
    date_edited: f64,
}

impl EntryV1 {
    fn migrate(self) -> Option<EntryV2> {
        Some(EntryV2 {
            id: self.id,
            title: self.title,
            content: self.content,
            created_at: reference_seconds_to_utc(self.date_created)?,
            edited_at: reference_seconds_to_utc(self.date_edited)?,
        })
    }
}

#[derive(Serialize, Deserialize)]
struct EntryV2 {
    id: Uuid,
    title: String,
    content: String,
    created_at: DateTime<Utc>,
    edited_at: DateTime<Utc>,
}

impl From<&Entry> for EntryV2 {
    fn from(entry: &Entry) -> Self {
        Self {
            id: entry.id(),
            title: entry.title().to_string(),
            content: entry.content().to_string(),
            created_at: entry.date_created(),
            edited_at: entry.date_edited(),
        }
    }
}

impl From<EntryV2> for Entry {
    fn from(record: EntryV2) -> Self {
        Entry::from_parts(
            record.id,
            record.title,
            record.content,
            record.created_at,
            record.edited_at,
        )
    }
}

fn reference_seconds_to_utc(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    let unix = seconds + REFERENCE_DATE_UNIX_OFFSET;
    let whole = unix.floor();
    let nanos = ((unix - whole) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(whole as i64, nanos)
}

/// Wrap an entry in the latest envelope and serialize it.
pub fn encode(entry: &Entry) -> Result<Vec<u8>, CodecError> {
    let data = serde_json::to_vec(&EntryV2::from(entry)).map_err(CodecError::Encode)?;
    let envelope = Envelope {
        version_sentinel: Schema::LATEST.version(),
        data,
    };
    serde_json::to_vec(&envelope).map_err(CodecError::Encode)
}

/// Decode an envelope produced by any known schema version.
pub fn decode(bytes: &[u8]) -> Result<Entry, CodecError> {
    let envelope: Envelope = serde_json::from_slice(bytes).map_err(CodecError::Envelope)?;
    if envelope.version_sentinel != Schema::LATEST.version() {
        log::debug!(
            "decoding legacy envelope version {}",
            envelope.version_sentinel
        );
    }
    Schema::LATEST.decode(&envelope.data).map(Entry::from)
}
