//! Local persistence: one file per entry inside a library directory.
//!
//! The store talks to persistence only through [`Persisting`]. Renames forced
//! by storage naming collisions flow back through [`ConflictHandler`].
//!
//! # Dyn-compatibility
//!
//! `load_library` returns a boxed future instead of `impl Future` so the store
//! can hold a `Weak<dyn Persisting>`.

mod bundle;
mod codec;
mod debounce;
mod error;
mod local;
mod location;

#[cfg(test)]
pub(crate) mod testing;

use std::future::Future;
use std::pin::Pin;
use std::sync::Weak;

use crate::entry::{Entry, EntryId};

pub use bundle::{Bundle, DirectoryBundle};
pub use codec::{CodecError, Schema, decode, encode};
pub use error::PersistenceError;
pub use local::{LocalPersistenceManager, ManagerState};

/// Boxed, Send future returned by async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Entries read from the library.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibraryLoadable {
    pub entries: Vec<Entry>,
}

/// An entry renamed by persistence after a naming collision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryIdChange {
    pub old_id: EntryId,
    pub new_id: EntryId,
}

/// Receives id changes made while saving. Called from the persistence worker;
/// implementations must not block on persistence.
pub trait ConflictHandler: Send + Sync {
    fn entry_ids_did_change_from_conflict(&self, changes: Vec<EntryIdChange>);
}

/// Persistence collaborator of the entry store.
pub trait Persisting: Send + Sync {
    /// Replace the collision handler. Only the latest registration is kept.
    fn set_conflict_handler(&self, handler: Weak<dyn ConflictHandler>);

    /// Read the library. Fails only when the directory itself is unusable;
    /// unreadable files are logged and skipped.
    fn load_library(&self) -> BoxFuture<'_, Result<LibraryLoadable, PersistenceError>>;

    /// Queue entries for writing. Never blocks on disk and never fails;
    /// problems are logged.
    fn save(&self, entries: Vec<Entry>);

    /// Flush pending changes to disk. Blocks until the flush is done.
    fn terminate(&self) -> Result<(), PersistenceError>;
}

/// File name for an entry: its id as an upper-case hyphenated UUID.
pub fn file_name_for(id: EntryId) -> String {
    id.hyphenated()
        .encode_upper(&mut uuid::Uuid::encode_buffer())
        .to_string()
}
