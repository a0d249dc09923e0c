//! Directory-backed persistence manager.
//!
//! All bundle state and disk I/O live on one worker thread fed by a job
//! queue. `save` only mutates the in-memory bundle and marks it dirty; the
//! debounce scheduler later asks the worker to flush. `terminate` flushes
//! synchronously and is the only call that reports a write failure.

use std::io;
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::thread;
use std::time::Duration;

use tokio::sync::oneshot;
use uuid::Uuid;

use super::bundle::{Bundle, DirectoryBundle};
use super::codec::{decode, encode};
use super::debounce::{DirtySignal, WriteScheduler};
use super::error::PersistenceError;
use super::{BoxFuture, ConflictHandler, EntryIdChange, LibraryLoadable, Persisting, file_name_for};
use crate::config::{AppConfig, LoadingMode};
use crate::entry::Entry;
use crate::logging::Logger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    Uninitialized,
    BundleLoaded,
    /// Saved in memory, waiting for the debounced write.
    WritePending,
    Writing,
    /// Memory and disk agree.
    Idle,
    Terminated,
}

type FlushReply = mpsc::Sender<Result<(), PersistenceError>>;

enum Job {
    Load(oneshot::Sender<Result<LibraryLoadable, PersistenceError>>),
    Save(Vec<Entry>),
    /// `None` for debounced flushes, whose errors are only logged.
    Flush(Option<FlushReply>),
    SetConflictHandler(Weak<dyn ConflictHandler>),
    Shutdown,
}

pub struct LocalPersistenceManager {
    jobs: mpsc::Sender<Job>,
    worker: Option<thread::JoinHandle<()>>,
    scheduler: WriteScheduler,
    state: Arc<Mutex<ManagerState>>,
    logger: Arc<dyn Logger>,
    minimum_load_latency: Duration,
}

impl LocalPersistenceManager {
    pub fn new(config: &AppConfig, logger: Arc<dyn Logger>) -> io::Result<Self> {
        Self::spawn(config, logger, None)
    }

    /// Use `bundle` instead of reading the library directory on load.
    pub fn with_bundle(
        config: &AppConfig,
        logger: Arc<dyn Logger>,
        bundle: Box<dyn Bundle>,
    ) -> io::Result<Self> {
        Self::spawn(config, logger, Some(bundle))
    }

    fn spawn(
        config: &AppConfig,
        logger: Arc<dyn Logger>,
        bundle: Option<Box<dyn Bundle>>,
    ) -> io::Result<Self> {
        let (jobs, queue) = mpsc::channel();

        let fire_jobs = jobs.clone();
        let scheduler = WriteScheduler::spawn(
            config.journal.debounce_window(),
            config.journal.max_staleness(),
            move || {
                let _ = fire_jobs.send(Job::Flush(None));
            },
        )?;

        let state = Arc::new(Mutex::new(ManagerState::Uninitialized));
        let mut worker = Worker {
            config: config.clone(),
            logger: Arc::clone(&logger),
            bundle,
            handler: None,
            state: Arc::clone(&state),
            dirty: scheduler.signal(),
        };
        let handle = thread::Builder::new()
            .name("journal-persistence".to_string())
            .spawn(move || worker.run(queue))?;

        Ok(Self {
            jobs,
            worker: Some(handle),
            scheduler,
            state,
            logger,
            minimum_load_latency: config.journal.minimum_load_latency(),
        })
    }

    pub fn state(&self) -> ManagerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn send(&self, job: Job) -> Result<(), PersistenceError> {
        self.jobs
            .send(job)
            .map_err(|_| PersistenceError::PersistenceServiceUnavailable)
    }
}

impl Persisting for LocalPersistenceManager {
    fn set_conflict_handler(&self, handler: Weak<dyn ConflictHandler>) {
        if let Err(e) = self.send(Job::SetConflictHandler(handler)) {
            self.logger.error(&e);
        }
    }

    fn load_library(&self) -> BoxFuture<'_, Result<LibraryLoadable, PersistenceError>> {
        Box::pin(async move {
            let started = tokio::time::Instant::now();
            let (reply, result) = oneshot::channel();
            self.send(Job::Load(reply))?;
            let loaded = result
                .await
                .map_err(|_| PersistenceError::PersistenceServiceUnavailable)?;
            tokio::time::sleep_until(started + self.minimum_load_latency).await;
            loaded
        })
    }

    fn save(&self, entries: Vec<Entry>) {
        if entries.is_empty() {
            return;
        }
        if let Err(e) = self.send(Job::Save(entries)) {
            self.logger.error(&e);
        }
    }

    fn terminate(&self) -> Result<(), PersistenceError> {
        self.scheduler.clear();
        let (reply, result) = mpsc::channel();
        self.send(Job::Flush(Some(reply)))?;
        result
            .recv()
            .map_err(|_| PersistenceError::PersistenceServiceUnavailable)??;

        self.logger.event("Persistence finished saving files.");
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = ManagerState::Terminated;
        Ok(())
    }
}

impl Drop for LocalPersistenceManager {
    fn drop(&mut self) {
        let _ = self.jobs.send(Job::Shutdown);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

struct Worker {
    config: AppConfig,
    logger: Arc<dyn Logger>,
    bundle: Option<Box<dyn Bundle>>,
    handler: Option<Weak<dyn ConflictHandler>>,
    state: Arc<Mutex<ManagerState>>,
    dirty: DirtySignal,
}

impl Worker {
    fn run(&mut self, queue: mpsc::Receiver<Job>) {
        while let Ok(job) = queue.recv() {
            match job {
                Job::Load(reply) => {
                    let _ = reply.send(self.load());
                }
                Job::Save(entries) => self.save(entries),
                Job::Flush(Some(reply)) => {
                    let _ = reply.send(self.flush());
                }
                Job::Flush(None) => {
                    if let Err(e) = self.flush() {
                        self.logger.error(&e);
                    }
                }
                Job::SetConflictHandler(handler) => self.handler = Some(handler),
                Job::Shutdown => break,
            }
        }
    }

    fn set_state(&self, state: ManagerState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn state(&self) -> ManagerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn load(&mut self) -> Result<LibraryLoadable, PersistenceError> {
        let dir = self.config.journal.location.ensure_library_dir()?;
        let read_contents = self.config.loading_mode == LoadingMode::Immediate;

        if self.bundle.is_none() {
            let bundle = DirectoryBundle::open(&dir, read_contents).map_err(|source| {
                PersistenceError::DirectoryContentsReadError {
                    path: dir.clone(),
                    source,
                }
            })?;
            self.bundle = Some(Box::new(bundle));
        }
        self.set_state(ManagerState::BundleLoaded);

        let Some(bundle) = self.bundle.as_ref() else {
            return Err(PersistenceError::PersistenceServiceUnavailable);
        };
        if !read_contents {
            return Ok(LibraryLoadable::default());
        }

        let mut entries = Vec::new();
        for name in bundle.file_names() {
            let Some(bytes) = bundle.regular_file_contents(&name) else {
                self.logger
                    .error(&PersistenceError::UnexpectedItemInUserDirectory(name));
                continue;
            };
            match decode(&bytes) {
                Ok(entry) => entries.push(entry),
                Err(source) => self
                    .logger
                    .error(&PersistenceError::UnableToParse { file: name, source }),
            }
        }
        Ok(LibraryLoadable { entries })
    }

    fn save(&mut self, entries: Vec<Entry>) {
        let Some(bundle) = self.bundle.as_mut() else {
            self.logger
                .error(&PersistenceError::PersistenceServiceUnavailable);
            return;
        };

        let count = entries.len();
        let changes: Vec<EntryIdChange> = entries
            .into_iter()
            .filter_map(|entry| store_entry(bundle.as_mut(), entry, self.logger.as_ref()))
            .collect();

        self.logger
            .event(&format!("Persistence scheduled to save {} entries", count));
        self.set_state(ManagerState::WritePending);
        self.dirty.mark();

        if changes.is_empty() {
            return;
        }
        match self.handler.as_ref().and_then(Weak::upgrade) {
            Some(handler) => handler.entry_ids_did_change_from_conflict(changes),
            None => self
                .logger
                .error(&PersistenceError::PersistenceServiceUnavailable),
        }
    }

    fn flush(&mut self) -> Result<(), PersistenceError> {
        if self.bundle.is_none() {
            return Ok(());
        }
        let dir = self.config.journal.location.ensure_library_dir()?;

        let unchanged = self
            .bundle
            .as_ref()
            .is_some_and(|bundle| bundle.matches_contents(&dir));
        if unchanged {
            if self.state() == ManagerState::WritePending {
                self.set_state(ManagerState::Idle);
            }
            return Ok(());
        }

        self.set_state(ManagerState::Writing);
        let written = match self.bundle.as_mut() {
            Some(bundle) => bundle.write(&dir),
            None => Ok(()),
        };
        match written {
            Ok(()) => {
                self.set_state(ManagerState::Idle);
                Ok(())
            }
            Err(source) => {
                self.set_state(ManagerState::WritePending);
                Err(PersistenceError::WriteFailed { path: dir, source })
            }
        }
    }
}

/// Put one entry into the bundle under its id's file name.
///
/// Returns the id change when the bundle stored the first attempt under a
/// different name and the entry had to be renamed.
fn store_entry(
    bundle: &mut dyn Bundle,
    mut entry: Entry,
    logger: &dyn Logger,
) -> Option<EntryIdChange> {
    let expected = file_name_for(entry.id());
    let contents = encode_or_log(&entry, &expected, logger)?;
    bundle.remove_file(&expected);
    let stored_as = bundle.add_regular_file(contents, &expected);
    if stored_as == expected {
        return None;
    }

    bundle.remove_file(&stored_as);
    let old_id = entry.id();
    let new_id = Uuid::new_v4();
    entry.reassign_id(new_id);

    let renamed = file_name_for(new_id);
    let contents = encode_or_log(&entry, &renamed, logger)?;
    let stored_as = bundle.add_regular_file(contents, &renamed);
    if stored_as != renamed {
        bundle.remove_file(&stored_as);
        logger.error(&PersistenceError::NamingCollision(renamed));
        return None;
    }
    Some(EntryIdChange { old_id, new_id })
}

fn encode_or_log(entry: &Entry, name: &str, logger: &dyn Logger) -> Option<Vec<u8>> {
    match encode(entry) {
        Ok(contents) => Some(contents),
        Err(source) => {
            logger.error(&PersistenceError::Encode {
                id: name.to_string(),
                source,
            });
            None
        }
    }
}
