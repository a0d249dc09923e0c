//! Logging sink used by the store and persistence layers.
//!
//! Components never write to stderr directly; they report events and errors
//! to a [`Logger`] with a [`Priority`]. [`SystemLogger`] forwards everything
//! to the `log` facade and can keep a session history for diagnostics.

use chrono::{DateTime, Utc};
use std::error::Error;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    Informational,
    Debugging,
    CriticalError,
    SystemFault,
}

impl Priority {
    fn level(self) -> log::Level {
        match self {
            Priority::Informational => log::Level::Info,
            Priority::Debugging => log::Level::Debug,
            Priority::CriticalError | Priority::SystemFault => log::Level::Error,
        }
    }
}

/// Sink for diagnostic events. Implementations must not block or panic.
pub trait Logger: Send + Sync {
    fn log_event(&self, message: &str, priority: Priority);

    fn log_error(&self, error: &dyn Error, priority: Priority);

    /// Informational event.
    fn event(&self, message: &str) {
        self.log_event(message, Priority::Informational);
    }

    /// Error at critical priority.
    fn error(&self, error: &dyn Error) {
        self.log_error(error, Priority::CriticalError);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedEvent {
    pub priority: Priority,
    pub message: String,
    pub time: DateTime<Utc>,
}

impl LoggedEvent {
    fn new(priority: Priority, message: String) -> Self {
        Self {
            priority,
            message,
            time: Utc::now(),
        }
    }
}

/// Logger backed by the `log` crate.
///
/// With recording enabled, each event is also kept in memory so a session's
/// history can be inspected (debug builds of the CLI, and tests).
pub struct SystemLogger {
    label: String,
    recording: bool,
    events: Mutex<Vec<LoggedEvent>>,
    errors: Mutex<Vec<LoggedEvent>>,
}

impl SystemLogger {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            recording: cfg!(debug_assertions),
            events: Mutex::new(Vec::new()),
            errors: Mutex::new(Vec::new()),
        }
    }

    /// A logger that always keeps the session history.
    pub fn recording(label: impl Into<String>) -> Self {
        Self {
            recording: true,
            ..Self::new(label)
        }
    }

    pub fn session_events(&self) -> Vec<LoggedEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn session_errors(&self) -> Vec<LoggedEvent> {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Messages of recorded events, in order.
    pub fn event_messages(&self) -> Vec<String> {
        self.session_events()
            .into_iter()
            .map(|e| e.message)
            .collect()
    }

    /// Messages of recorded errors, in order.
    pub fn error_messages(&self) -> Vec<String> {
        self.session_errors()
            .into_iter()
            .map(|e| e.message)
            .collect()
    }
}

impl Default for SystemLogger {
    fn default() -> Self {
        Self::new("journal")
    }
}

impl Logger for SystemLogger {
    fn log_event(&self, message: &str, priority: Priority) {
        log::log!(target: &self.label, priority.level(), "{}", message);
        if self.recording {
            self.events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(LoggedEvent::new(priority, message.to_string()));
        }
    }

    fn log_error(&self, error: &dyn Error, priority: Priority) {
        log::log!(target: &self.label, priority.level(), "{}", error);
        if self.recording {
            self.errors
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(LoggedEvent::new(priority, error.to_string()));
        }
    }
}
