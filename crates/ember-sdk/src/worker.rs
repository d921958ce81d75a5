//! Background worker loop
//!
//! A [`BackgroundLoop`] owns at most one native thread that calls a tick
//! closure at a fixed interval. The thread never touches the engine; ticks
//! that need script code go through a [`Dispatcher`](crate::Dispatcher).
//!
//! Instead of sleeping blindly, the worker waits on a condvar with a
//! deadline, so `stop` wakes it immediately.

use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::{AddonError, AddonResult};

/// Lifecycle state of a [`BackgroundLoop`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Never started
    Idle,
    /// Worker thread is live
    Running,
    /// Stopped; may be started again
    Stopped,
}

struct Shared {
    /// Set while the worker should keep ticking
    active: Mutex<bool>,
    /// Wakes the worker early on stop
    wake: Condvar,
}

struct Worker {
    handle: JoinHandle<()>,
    thread: ThreadId,
}

/// Periodic native worker thread
pub struct BackgroundLoop {
    name: String,
    shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
    state: Mutex<LoopState>,
}

impl BackgroundLoop {
    /// Create an idle loop; `name` becomes the thread name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shared: Arc::new(Shared {
                active: Mutex::new(false),
                wake: Condvar::new(),
            }),
            worker: Mutex::new(None),
            state: Mutex::new(LoopState::Idle),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> LoopState {
        *self.state.lock()
    }

    /// Check whether the worker is live
    pub fn is_running(&self) -> bool {
        self.state() == LoopState::Running
    }

    /// Spawn the worker, calling `tick` every `interval`.
    ///
    /// Returns `Ok(false)` without spawning when already running.
    pub fn start<F>(&self, interval: Duration, mut tick: F) -> AddonResult<bool>
    where
        F: FnMut() + Send + 'static,
    {
        let mut state = self.state.lock();
        if *state == LoopState::Running {
            return Ok(false);
        }

        // A previous worker has already been told to exit.
        if let Some(old) = self.worker.lock().take() {
            if old.thread != thread::current().id() && old.handle.join().is_err() {
                log::warn!("{}: previous worker thread panicked", self.name);
            }
        }

        *self.shared.active.lock() = true;
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new().name(self.name.clone()).spawn(move || {
            let mut deadline = Instant::now() + interval;
            loop {
                {
                    let mut active = shared.active.lock();
                    while *active {
                        if shared.wake.wait_until(&mut active, deadline).timed_out() {
                            break;
                        }
                    }
                    if !*active {
                        break;
                    }
                }
                tick();
                // Late ticks are not made up in a burst.
                deadline = (deadline + interval).max(Instant::now());
            }
        });

        match spawned {
            Ok(handle) => {
                let thread = handle.thread().id();
                *self.worker.lock() = Some(Worker { handle, thread });
                *state = LoopState::Running;
                log::debug!("{}: worker started ({:?} interval)", self.name, interval);
                Ok(true)
            }
            Err(e) => {
                *self.shared.active.lock() = false;
                Err(AddonError::Failed(format!(
                    "failed to spawn {} worker: {e}",
                    self.name
                )))
            }
        }
    }

    /// Stop the worker and wait for it to exit.
    ///
    /// Returns `false` when nothing was running. When called from the worker
    /// itself (inside `tick`) the thread is told to exit but not joined.
    pub fn stop(&self) -> bool {
        let mut state = self.state.lock();
        if *state != LoopState::Running {
            return false;
        }
        {
            let mut active = self.shared.active.lock();
            *active = false;
            self.shared.wake.notify_all();
        }
        *state = LoopState::Stopped;
        drop(state);

        let mut worker = self.worker.lock();
        if let Some(w) = worker.take() {
            if w.thread == thread::current().id() {
                // Joined by the next start, or detached on drop.
                *worker = Some(w);
            } else if w.handle.join().is_err() {
                log::warn!("{}: worker thread panicked", self.name);
            }
        }
        log::debug!("{}: worker stopped", self.name);
        true
    }
}

impl Drop for BackgroundLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for BackgroundLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundLoop")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}
