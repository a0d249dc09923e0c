//! Debounced write-back trigger.
//!
//! A watcher thread sleeps on a condition variable until a [`DirtySignal`]
//! is marked, then waits for the signal to stay quiet for the debounce
//! window before firing. Continuous marking cannot postpone the fire past
//! the maximum staleness measured from the first unflushed mark.

use std::io;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct SignalState {
    latest: Option<Instant>,
    first_pending: Option<Instant>,
    stopped: bool,
}

struct Shared {
    state: Mutex<SignalState>,
    cvar: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SignalState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Single-slot dirty flag shared with a [`WriteScheduler`].
#[derive(Clone)]
pub struct DirtySignal {
    shared: Arc<Shared>,
}

impl DirtySignal {
    /// Record a dirty event, re-arming the debounce window.
    pub fn mark(&self) {
        let now = Instant::now();
        {
            let mut state = self.shared.lock();
            state.latest = Some(now);
            state.first_pending.get_or_insert(now);
        }
        self.shared.cvar.notify_one();
    }
}

/// Owns the watcher thread. Dropping it stops the watcher without firing.
pub struct WriteScheduler {
    signal: DirtySignal,
    watcher: Option<thread::JoinHandle<()>>,
}

impl WriteScheduler {
    pub fn spawn<F>(window: Duration, max_staleness: Duration, on_fire: F) -> io::Result<Self>
    where
        F: Fn() + Send + 'static,
    {
        let shared = Arc::new(Shared {
            state: Mutex::new(SignalState::default()),
            cvar: Condvar::new(),
        });
        let watcher_shared = Arc::clone(&shared);
        let max_staleness = max_staleness.max(window);

        let watcher = thread::Builder::new()
            .name("journal-write-back".to_string())
            .spawn(move || watch(&watcher_shared, window, max_staleness, on_fire))?;

        Ok(Self {
            signal: DirtySignal { shared },
            watcher: Some(watcher),
        })
    }

    pub fn signal(&self) -> DirtySignal {
        self.signal.clone()
    }

    /// Forget any pending mark, e.g. after a synchronous flush.
    pub fn clear(&self) {
        let mut state = self.signal.shared.lock();
        state.latest = None;
        state.first_pending = None;
    }
}

fn watch<F: Fn()>(shared: &Shared, window: Duration, max_staleness: Duration, on_fire: F) {
    let mut state = shared.lock();
    loop {
        if state.stopped {
            return;
        }
        let (Some(latest), Some(first)) = (state.latest, state.first_pending) else {
            state = shared.cvar.wait(state).unwrap_or_else(PoisonError::into_inner);
            continue;
        };

        let deadline = (latest + window).min(first + max_staleness);
        let now = Instant::now();
        if now < deadline {
            state = shared
                .cvar
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
            continue;
        }

        state.latest = None;
        state.first_pending = None;
        drop(state);
        on_fire();
        state = shared.lock();
    }
}

impl Drop for WriteScheduler {
    fn drop(&mut self) {
        {
            let mut state = self.signal.shared.lock();
            state.stopped = true;
        }
        self.signal.shared.cvar.notify_one();

        if let Some(handle) = self.watcher.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_scheduler(window_ms: u64, staleness_ms: u64) -> (WriteScheduler, Arc<AtomicUsize>) {
        let fires = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fires);
        let scheduler = WriteScheduler::spawn(
            Duration::from_millis(window_ms),
            Duration::from_millis(staleness_ms),
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        )
        .unwrap();
        (scheduler, fires)
    }

    #[test]
    fn burst_of_marks_fires_once() {
        let (scheduler, fires) = counting_scheduler(100, 10_000);
        let signal = scheduler.signal();
        for _ in 0..5 {
            signal.mark();
            thread::sleep(Duration::from_millis(5));
        }
        thread::sleep(Duration::from_millis(400));
        assert_eq!(fires.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn spaced_marks_fire_each_time() {
        let (scheduler, fires) = counting_scheduler(30, 10_000);
        let signal = scheduler.signal();
        for _ in 0..3 {
            signal.mark();
            thread::sleep(Duration::from_millis(200));
        }
        assert_eq!(fires.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn staleness_bounds_continuous_marking() {
        let (scheduler, fires) = counting_scheduler(100, 150);
        let signal = scheduler.signal();
        let started = Instant::now();
        while started.elapsed() < Duration::from_millis(500) {
            signal.mark();
            thread::sleep(Duration::from_millis(10));
        }
        assert!(fires.load(Ordering::SeqCst) >= 2);
    }

    #[test]
    fn drop_does_not_fire_pending_mark() {
        let (scheduler, fires) = counting_scheduler(10_000, 10_000);
        scheduler.signal().mark();
        drop(scheduler);
        assert_eq!(fires.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn clear_cancels_pending_mark() {
        let (scheduler, fires) = counting_scheduler(50, 10_000);
        scheduler.signal().mark();
        scheduler.clear();
        thread::sleep(Duration::from_millis(200));
        assert_eq!(fires.load(Ordering::SeqCst), 0);
    }
}
