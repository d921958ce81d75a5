//! Owner-thread run loop
//!
//! Any thread may post work through a [`Port`]; only the thread that owns
//! the engine drains it. Messages from one sender keep their order (the
//! channel is FIFO). Closing the loop refuses further posts and drops what is
//! still queued without running it.

use std::ffi::c_void;
use std::os::raw::c_int;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TrySendError};
use ember_sdk::{DispatchFn, OwnerThread, Scheduler, Task};
use parking_lot::RwLock;

/// Raw `(callback, payload)` pair posted through the ABI handle
struct RawMessage {
    callback: DispatchFn,
    release: Option<DispatchFn>,
    payload: *mut c_void,
}

// SAFETY: the payload is handed to one of the callbacks on the owning thread;
// the poster gave up ownership when the post was accepted.
unsafe impl Send for RawMessage {}

enum Message {
    Task(Task),
    Raw(RawMessage),
}

impl Message {
    fn run(self) {
        match self {
            Message::Task(task) => task(),
            // SAFETY: the poster promised `callback` accepts `payload`.
            Message::Raw(raw) => unsafe { (raw.callback)(raw.payload) },
        }
    }

    /// Drop without running; raw payloads go to their release callback.
    fn discard(self) {
        match self {
            Message::Task(task) => drop(task),
            Message::Raw(raw) => {
                if let Some(release) = raw.release {
                    // SAFETY: the poster promised `release` accepts `payload`.
                    unsafe { release(raw.payload) }
                }
            }
        }
    }
}

/// Sending side of the run loop; safe to share across threads
pub struct Port {
    sender: Sender<Message>,
    /// `false` once the loop is closed; writers hold the lock while closing
    open: RwLock<bool>,
}

impl Port {
    /// Check whether posts are still accepted
    pub fn is_open(&self) -> bool {
        *self.open.read()
    }

    /// Queue `message`, handing it back when refused
    fn send(&self, message: Message) -> Result<(), Message> {
        let open = self.open.read();
        if !*open {
            return Err(message);
        }
        match self.sender.try_send(message) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(message)) => {
                log::warn!("run loop queue is full; dropping message");
                Err(message)
            }
            Err(TrySendError::Disconnected(message)) => Err(message),
        }
    }
}

impl Scheduler for Port {
    fn post(&self, task: Task) -> bool {
        self.send(Message::Task(task)).is_ok()
    }
}

unsafe extern "C" fn post_raw(
    data: *const c_void,
    callback: DispatchFn,
    release: Option<DispatchFn>,
    payload: *mut c_void,
) -> c_int {
    let port = &*(data as *const Port);
    let message = Message::Raw(RawMessage {
        callback,
        release,
        payload,
    });
    // A refused message is forgotten, leaving the payload with the caller.
    port.send(message).is_ok() as c_int
}

/// Message queue drained on the owning thread
pub struct RunLoop {
    port: Arc<Port>,
    receiver: Receiver<Message>,
    owner: Box<OwnerThread>,
}

impl RunLoop {
    /// Create a run loop; `capacity` bounds the queue
    pub fn new(capacity: Option<usize>) -> Self {
        let (sender, receiver) = match capacity {
            Some(cap) => channel::bounded(cap),
            None => channel::unbounded(),
        };
        let port = Arc::new(Port {
            sender,
            open: RwLock::new(true),
        });
        let owner = Box::new(OwnerThread {
            data: Arc::as_ptr(&port) as *const c_void,
            post: post_raw,
        });
        Self {
            port,
            receiver,
            owner,
        }
    }

    /// Shareable sending side
    pub fn port(&self) -> Arc<Port> {
        Arc::clone(&self.port)
    }

    /// The ABI handle given to addons at init; valid while the loop lives
    pub fn owner_thread(&self) -> *const OwnerThread {
        &*self.owner
    }

    /// Number of queued messages
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Run the messages queued right now; later arrivals wait for the next
    /// call. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let queued = self.receiver.len();
        let mut ran = 0;
        for _ in 0..queued {
            match self.receiver.try_recv() {
                Ok(message) => {
                    message.run();
                    ran += 1;
                }
                Err(_) => break,
            }
        }
        ran
    }

    /// Run messages as they arrive until `timeout` elapses
    pub fn run_for(&self, timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        let mut ran = 0;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.receiver.recv_timeout(remaining) {
                Ok(message) => {
                    message.run();
                    ran += 1;
                }
                Err(_) => return ran,
            }
        }
    }

    /// Run messages until `done` returns `true` or `timeout` elapses.
    ///
    /// Returns the final value of `done`.
    pub fn run_until(&self, timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if done() {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.receiver.recv_timeout(remaining) {
                Ok(message) => message.run(),
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return done();
                }
            }
        }
    }

    /// Refuse further posts and drop queued messages unrun. Idempotent.
    ///
    /// Raw messages posted with a release callback are handed to it.
    pub fn close(&self) -> usize {
        *self.port.open.write() = false;
        let mut dropped = 0;
        while let Ok(message) = self.receiver.try_recv() {
            message.discard();
            dropped += 1;
        }
        if dropped > 0 {
            log::debug!("run loop closed; dropped {dropped} queued message(s)");
        }
        dropped
    }
}

impl Drop for RunLoop {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_fifo_from_one_thread() {
        let run_loop = RunLoop::new(None);
        let port = run_loop.port();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let s = seen.clone();
        thread::spawn(move || {
            for i in 0..100 {
                let s = s.clone();
                assert!(port.post(Box::new(move || s.lock().push(i))));
            }
        })
        .join()
        .unwrap();
        assert_eq!(run_loop.run_pending(), 100);
        assert_eq!(*seen.lock(), (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_run_pending_skips_late_arrivals() {
        let run_loop = RunLoop::new(None);
        let port = run_loop.port();
        let p = port.clone();
        port.post(Box::new(move || {
            p.post(Box::new(|| {}));
        }));
        assert_eq!(run_loop.run_pending(), 1);
        assert_eq!(run_loop.pending(), 1);
        assert_eq!(run_loop.run_pending(), 1);
    }

    #[test]
    fn test_close_drops_and_refuses() {
        let run_loop = RunLoop::new(None);
        let port = run_loop.port();
        let ran = Arc::new(AtomicUsize::new(0));
        let r = ran.clone();
        port.post(Box::new(move || {
            r.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(run_loop.close(), 1);
        assert!(!port.is_open());
        assert!(!port.post(Box::new(|| {})));
        assert_eq!(run_loop.run_pending(), 0);
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_bounded_queue_refuses_when_full() {
        let run_loop = RunLoop::new(Some(1));
        let port = run_loop.port();
        assert!(port.post(Box::new(|| {})));
        assert!(!port.post(Box::new(|| {})));
        assert_eq!(run_loop.run_pending(), 1);
    }

    #[test]
    fn test_raw_post_through_owner_thread() {
        static SUM: AtomicUsize = AtomicUsize::new(0);
        unsafe extern "C" fn add(payload: *mut c_void) {
            let n = Box::from_raw(payload as *mut usize);
            SUM.fetch_add(*n, Ordering::SeqCst);
        }

        let run_loop = RunLoop::new(None);
        let owner = unsafe { &*run_loop.owner_thread() };
        let payload = Box::into_raw(Box::new(5usize)) as *mut c_void;
        assert_eq!(unsafe { (owner.post)(owner.data, add, None, payload) }, 1);
        run_loop.run_pending();
        assert_eq!(SUM.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_close_releases_raw_payloads() {
        static RELEASED: AtomicUsize = AtomicUsize::new(0);
        unsafe extern "C" fn run(_payload: *mut c_void) {
            panic!("must not run");
        }
        unsafe extern "C" fn release(payload: *mut c_void) {
            let n = Box::from_raw(payload as *mut usize);
            RELEASED.fetch_add(*n, Ordering::SeqCst);
        }

        let run_loop = RunLoop::new(None);
        let owner = unsafe { &*run_loop.owner_thread() };
        let payload = Box::into_raw(Box::new(3usize)) as *mut c_void;
        assert_eq!(unsafe { (owner.post)(owner.data, run, Some(release), payload) }, 1);
        assert_eq!(run_loop.close(), 1);
        assert_eq!(RELEASED.load(Ordering::SeqCst), 3);

        // Refused after close: the payload stays with the poster.
        let payload = Box::into_raw(Box::new(4usize)) as *mut c_void;
        assert_eq!(unsafe { (owner.post)(owner.data, run, Some(release), payload) }, 0);
        assert_eq!(RELEASED.load(Ordering::SeqCst), 3);
        drop(unsafe { Box::from_raw(payload as *mut usize) });
    }

    #[test]
    fn test_run_until() {
        let run_loop = RunLoop::new(None);
        let port = run_loop.port();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            port.post(Box::new(move || {
                h.fetch_add(1, Ordering::SeqCst);
            }));
        });
        let h = hits.clone();
        assert!(run_loop.run_until(Duration::from_secs(5), || h.load(Ordering::SeqCst) == 1));
    }
}
