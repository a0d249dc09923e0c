//! Concurrent entry store.
//!
//! The map of entries sits behind a Tokio `RwLock`. Reads take the read lock
//! directly; writes go through an unbounded queue drained by one writer
//! task, so they apply one at a time in enqueue order. Every write gets a
//! ticket when enqueued and the writer publishes how many tickets it has
//! applied; a read first waits for all tickets issued before it, so it sees
//! every write enqueued before the read started.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use thiserror::Error;
use tokio::sync::{RwLock, mpsc, watch};
use uuid::Uuid;

use crate::entry::{Entry, EntryId};
use crate::logging::Logger;
use crate::persistence::{ConflictHandler, EntryIdChange, PersistenceError, Persisting};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Persistence service unavailable.")]
    PersistenceUnavailable,
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorePhase {
    Empty,
    Loading,
    Ready,
}

type EntryMap = HashMap<EntryId, Entry>;

enum WriteOp {
    /// Replace the whole map with freshly loaded entries.
    Replace(Vec<Entry>),
    Add(Entry),
    Update {
        id: EntryId,
        title: Option<String>,
        content: Option<String>,
    },
    ResolveConflicts(Vec<EntryIdChange>),
}

struct WriteQueue {
    sender: mpsc::UnboundedSender<WriteOp>,
    issued: u64,
}

pub struct ConcurrentJournalStore {
    entries: Arc<RwLock<EntryMap>>,
    queue: Mutex<WriteQueue>,
    applied: watch::Receiver<u64>,
    phase: Mutex<StorePhase>,
    persistence: Weak<dyn Persisting>,
    logger: Arc<dyn Logger>,
}

impl ConcurrentJournalStore {
    /// Create a store and register it as `persistence`'s conflict handler.
    ///
    /// Spawns the writer task, so this must be called inside a Tokio runtime.
    pub fn new(persistence: Weak<dyn Persisting>, logger: Arc<dyn Logger>) -> Arc<Self> {
        let entries = Arc::new(RwLock::new(EntryMap::new()));
        let (sender, receiver) = mpsc::unbounded_channel();
        let (applied_tx, applied) = watch::channel(0);

        tokio::spawn(apply_writes(Writer {
            entries: Arc::clone(&entries),
            persistence: persistence.clone(),
            logger: Arc::clone(&logger),
            queue: receiver,
            applied: applied_tx,
        }));

        let store = Arc::new(Self {
            entries,
            queue: Mutex::new(WriteQueue { sender, issued: 0 }),
            applied,
            phase: Mutex::new(StorePhase::Empty),
            persistence,
            logger,
        });
        if let Some(persistence) = store.persistence.upgrade() {
            persistence.set_conflict_handler(Arc::downgrade(&store) as Weak<dyn ConflictHandler>);
        }
        store
    }

    pub fn phase(&self) -> StorePhase {
        *self.lock_phase()
    }

    fn lock_phase(&self) -> MutexGuard<'_, StorePhase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Load the library and replace the store's contents with it.
    ///
    /// On duplicate ids the entry loaded last wins.
    pub async fn start(&self) -> Result<(), StoreError> {
        let persistence = self
            .persistence
            .upgrade()
            .ok_or(StoreError::PersistenceUnavailable)?;

        *self.lock_phase() = StorePhase::Loading;
        let loaded = match persistence.load_library().await {
            Ok(loaded) => loaded,
            Err(e) => {
                *self.lock_phase() = StorePhase::Empty;
                return Err(e.into());
            }
        };

        let count = loaded.entries.len();
        self.enqueue(WriteOp::Replace(loaded.entries));
        self.settle().await;
        self.logger
            .event(&format!("JournalStore received {} entries", count));
        *self.lock_phase() = StorePhase::Ready;
        Ok(())
    }

    pub async fn get_entry(&self, id: EntryId) -> Option<Entry> {
        self.settle().await;
        self.entries.read().await.get(&id).cloned()
    }

    /// Snapshot of every entry, most recently edited first.
    pub async fn list_entries(&self) -> Vec<Entry> {
        self.settle().await;
        let mut entries: Vec<Entry> = self.entries.read().await.values().cloned().collect();
        entries.sort_by(|a, b| {
            b.date_edited()
                .cmp(&a.date_edited())
                .then_with(|| b.date_created().cmp(&a.date_created()))
                .then_with(|| a.id().cmp(&b.id()))
        });
        self.logger
            .event(&format!("JournalStore served entry list of {}", entries.len()));
        entries
    }

    /// Queue a new entry. Returns immediately; the entry is visible to any
    /// read issued after this call.
    pub fn add_entry(&self, title: impl Into<String>, content: impl Into<String>) {
        self.enqueue(WriteOp::Add(Entry::new(title, content)));
    }

    /// Queue an edit of an existing entry. `None` leaves a field unchanged.
    pub fn update_entry(&self, id: EntryId, title: Option<String>, content: Option<String>) {
        self.enqueue(WriteOp::Update { id, title, content });
    }

    /// Wait for queued writes to drain, then flush persistence.
    pub async fn app_will_terminate(&self) -> Result<(), StoreError> {
        self.settle().await;
        let persistence = self
            .persistence
            .upgrade()
            .ok_or(StoreError::PersistenceUnavailable)?;
        tokio::task::spawn_blocking(move || persistence.terminate())
            .await
            .map_err(|_| StoreError::PersistenceUnavailable)??;
        // Renames reported while flushing are queued behind the flush.
        self.settle().await;
        Ok(())
    }

    fn enqueue(&self, op: WriteOp) {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        if queue.sender.send(op).is_ok() {
            queue.issued += 1;
        }
    }

    /// Wait until every write enqueued so far has been applied.
    async fn settle(&self) {
        let ticket = self
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .issued;
        let mut applied = self.applied.clone();
        // An error means the writer is gone and nothing more will apply.
        let _ = applied.wait_for(|done| *done >= ticket).await;
    }
}

impl ConflictHandler for ConcurrentJournalStore {
    fn entry_ids_did_change_from_conflict(&self, changes: Vec<EntryIdChange>) {
        self.enqueue(WriteOp::ResolveConflicts(changes));
    }
}

struct Writer {
    entries: Arc<RwLock<EntryMap>>,
    persistence: Weak<dyn Persisting>,
    logger: Arc<dyn Logger>,
    queue: mpsc::UnboundedReceiver<WriteOp>,
    applied: watch::Sender<u64>,
}

impl Writer {
    fn forward(&self, entry: Entry) {
        match self.persistence.upgrade() {
            Some(persistence) => persistence.save(vec![entry]),
            None => self.logger.error(&StoreError::PersistenceUnavailable),
        }
    }

    fn apply(&self, map: &mut EntryMap, op: WriteOp) {
        match op {
            WriteOp::Replace(entries) => {
                map.clear();
                map.extend(entries.into_iter().map(|entry| (entry.id(), entry)));
            }
            WriteOp::Add(mut entry) => {
                while map.contains_key(&entry.id()) {
                    entry.reassign_id(Uuid::new_v4());
                }
                let title = entry.title().to_string();
                map.insert(entry.id(), entry.clone());
                self.forward(entry);
                self.logger
                    .event(&format!("JournalStore saved entry {}", title));
            }
            WriteOp::Update { id, title, content } => {
                if title.is_none() && content.is_none() {
                    return;
                }
                let Some(entry) = map.get_mut(&id) else {
                    self.logger
                        .event(&format!("JournalStore found no entry {} to update", id));
                    return;
                };
                entry.update(title, content);
                let entry = entry.clone();
                self.logger
                    .event(&format!("JournalStore updated entry {}", entry.title()));
                self.forward(entry);
            }
            WriteOp::ResolveConflicts(changes) => {
                for change in changes {
                    match map.remove(&change.old_id) {
                        Some(mut entry) => {
                            entry.reassign_id(change.new_id);
                            map.insert(change.new_id, entry);
                        }
                        None => self.logger.event("JournalStore handled ID conflict"),
                    }
                }
            }
        }
    }
}

async fn apply_writes(mut writer: Writer) {
    while let Some(op) = writer.queue.recv().await {
        {
            let entries = Arc::clone(&writer.entries);
            let mut map = entries.write().await;
            writer.apply(&mut map, op);
        }
        writer.applied.send_modify(|done| *done += 1);
    }
}
