use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::AppConfig;
use crate::logging::{Logger, Priority};
use crate::persistence::{LocalPersistenceManager, Persisting};
use crate::store::{ConcurrentJournalStore, StoreError};

/// High-level facade wiring the store to local persistence.
///
/// Owns the persistence manager; the store only holds a weak reference to
/// it, so dropping the app tears both down.
pub struct JournalApp {
    config: AppConfig,
    logger: Arc<dyn Logger>,
    persistence: Arc<LocalPersistenceManager>,
    store: Arc<ConcurrentJournalStore>,
    started: AtomicBool,
}

impl JournalApp {
    /// Build the app. Must be called inside a Tokio runtime.
    pub fn load(config: AppConfig, logger: Arc<dyn Logger>) -> io::Result<Self> {
        let persistence = Arc::new(LocalPersistenceManager::new(&config, Arc::clone(&logger))?);
        let shared: Arc<dyn Persisting> = persistence.clone();
        let store = ConcurrentJournalStore::new(Arc::downgrade(&shared), Arc::clone(&logger));
        Ok(Self {
            config,
            logger,
            persistence,
            store,
            started: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<ConcurrentJournalStore> {
        &self.store
    }

    pub fn persistence(&self) -> &LocalPersistenceManager {
        &self.persistence
    }

    /// Load the library into the store. Only the first call does anything.
    pub async fn start(&self) -> Result<(), StoreError> {
        if self.started.swap(true, Ordering::SeqCst) {
            self.logger
                .log_event("Attempted to load app more than once.", Priority::Debugging);
            return Ok(());
        }
        self.store.start().await
    }

    /// Drain pending writes and flush them to disk.
    pub async fn exit(&self) -> Result<(), StoreError> {
        let result = self.store.app_will_terminate().await;
        if let Err(e) = &result {
            self.logger.log_error(e, Priority::SystemFault);
        }
        result
    }
}
