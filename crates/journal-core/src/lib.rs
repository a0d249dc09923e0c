//! journal-core: entry store and local persistence for the journal
//!
//! Entries live in a [`ConcurrentJournalStore`] and are mirrored to disk, one
//! file per entry, by a [`LocalPersistenceManager`] that batches writes.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use journal_core::{AppConfig, JournalApp, JournalConfig, SystemLogger};
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let config = AppConfig::development(JournalConfig::load(None)?);
//!     let app = JournalApp::load(config, Arc::new(SystemLogger::default()))?;
//!     app.start().await.map_err(std::io::Error::other)?;
//!
//!     app.store().add_entry("Hello", "First entry");
//!     for entry in app.store().list_entries().await {
//!         println!("{}", entry.title());
//!     }
//!     app.exit().await.map_err(std::io::Error::other)
//! }
//! ```

mod app;
pub mod config;
pub mod entry;
pub mod format;
pub mod logging;
pub mod persistence;
pub mod safe_io;
pub mod store;

pub use app::JournalApp;
pub use config::{AppConfig, JournalConfig, LibraryLocation, LoadingMode};
pub use entry::{Entry, EntryId};
pub use format::EntryFormatting;
pub use logging::{Logger, Priority, SystemLogger};
pub use persistence::{LocalPersistenceManager, PersistenceError, Persisting};
pub use store::{ConcurrentJournalStore, StoreError};
