//! Test doubles for the persistence layer.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::{fs, io};

use super::{
    BoxFuture, Bundle, ConflictHandler, DirectoryBundle, EntryIdChange, LibraryLoadable,
    PersistenceError, Persisting,
};
use crate::entry::Entry;

#[derive(Default)]
pub struct SpyCounters {
    pub writes: AtomicUsize,
    pub forced_collisions: AtomicUsize,
    /// Requested names that were stored elsewhere.
    pub collided: Mutex<Vec<String>>,
}

impl SpyCounters {
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn force_collisions(&self, count: usize) {
        self.forced_collisions.store(count, Ordering::SeqCst);
    }

    pub fn collided(&self) -> Vec<String> {
        self.collided.lock().unwrap().clone()
    }
}

/// Directory bundle that counts physical writes and can be told to store
/// the next additions under a name other than the requested one.
pub struct SpyBundle {
    inner: DirectoryBundle,
    counters: Arc<SpyCounters>,
}

impl SpyBundle {
    pub fn open(root: &Path) -> (Self, Arc<SpyCounters>) {
        fs::create_dir_all(root).unwrap();
        let counters = Arc::new(SpyCounters::default());
        let bundle = Self {
            inner: DirectoryBundle::open(root, true).unwrap(),
            counters: Arc::clone(&counters),
        };
        (bundle, counters)
    }
}

impl Bundle for SpyBundle {
    fn file_names(&self) -> Vec<String> {
        self.inner.file_names()
    }

    fn contains(&self, name: &str) -> bool {
        self.inner.contains(name)
    }

    fn regular_file_contents(&self, name: &str) -> Option<Vec<u8>> {
        self.inner.regular_file_contents(name)
    }

    fn remove_file(&mut self, name: &str) {
        self.inner.remove_file(name)
    }

    fn add_regular_file(&mut self, contents: Vec<u8>, preferred_name: &str) -> String {
        let collide = self
            .counters
            .forced_collisions
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if collide {
            self.counters
                .collided
                .lock()
                .unwrap()
                .push(preferred_name.to_string());
            self.inner
                .add_regular_file(contents, &format!("collided-{}", preferred_name))
        } else {
            self.inner.add_regular_file(contents, preferred_name)
        }
    }

    fn matches_contents(&self, dir: &Path) -> bool {
        self.inner.matches_contents(dir)
    }

    fn write(&mut self, dir: &Path) -> io::Result<()> {
        self.counters.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.write(dir)
    }
}

/// Collects every id change reported by persistence.
#[derive(Default)]
pub struct RecordingHandler {
    pub changes: Mutex<Vec<EntryIdChange>>,
}

impl RecordingHandler {
    pub fn changes(&self) -> Vec<EntryIdChange> {
        self.changes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ConflictHandler for RecordingHandler {
    fn entry_ids_did_change_from_conflict(&self, changes: Vec<EntryIdChange>) {
        self.changes.lock().unwrap().extend(changes);
    }
}

/// In-memory persistence for store tests.
#[derive(Default)]
pub struct FakePersistence {
    pub library: Mutex<Vec<Entry>>,
    pub saved: Mutex<Vec<Entry>>,
    pub handler: Mutex<Option<Weak<dyn ConflictHandler>>>,
    pub terminations: AtomicUsize,
    pub fail_load: bool,
}

impl FakePersistence {
    pub fn with_library(entries: Vec<Entry>) -> Self {
        Self {
            library: Mutex::new(entries),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_load: true,
            ..Self::default()
        }
    }

    pub fn saved(&self) -> Vec<Entry> {
        self.saved.lock().unwrap().clone()
    }

    /// Report id changes as if a save had collided.
    pub fn report_conflict(&self, changes: Vec<EntryIdChange>) {
        let handler = self.handler.lock().unwrap().clone();
        if let Some(handler) = handler.and_then(|h| h.upgrade()) {
            handler.entry_ids_did_change_from_conflict(changes);
        }
    }
}

impl Persisting for FakePersistence {
    fn set_conflict_handler(&self, handler: Weak<dyn ConflictHandler>) {
        *self.handler.lock().unwrap() = Some(handler);
    }

    fn load_library(&self) -> BoxFuture<'_, Result<LibraryLoadable, PersistenceError>> {
        Box::pin(async move {
            if self.fail_load {
                return Err(PersistenceError::DirectoryNotReachable(None));
            }
            Ok(LibraryLoadable {
                entries: self.library.lock().unwrap().clone(),
            })
        })
    }

    fn save(&self, entries: Vec<Entry>) {
        self.saved.lock().unwrap().extend(entries);
    }

    fn terminate(&self) -> Result<(), PersistenceError> {
        self.terminations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
