//! Cross-thread dispatch bridge
//!
//! The engine may only be entered from the thread that owns it. Worker
//! threads hand work to a [`Dispatcher`], which enqueues it on the owner's run
//! loop. The run loop later runs the work on the owning thread, where calling
//! into [`FunctionRef`](crate::FunctionRef)s is allowed.
//!
//! # Contract
//!
//! - dispatch never runs the work synchronously, not even on the owning thread
//! - work posted from one thread runs in posting order
//! - after [`Dispatcher::clear`] (or with no run loop) dispatch is a silent
//!   no-op and the payload is dropped without running

use std::ffi::c_void;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::abi::{DispatchFn, OwnerThread};

/// Unit of work executed on the owning thread.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Anything that can queue work for the owning thread.
pub trait Scheduler: Send + Sync {
    /// Enqueue `task`. Returns `false` when the queue no longer accepts work;
    /// the task has then been dropped unrun.
    fn post(&self, task: Task) -> bool;
}

/// Run-loop handle received at init.
#[derive(Debug, Clone, Copy)]
pub struct OwnerHandle(*const OwnerThread);

// SAFETY: the host guarantees `OwnerThread::post` may be called from any
// thread and that the handle stays valid until the addon is unloaded. Addons
// stop using it at unload through `Dispatcher::clear`.
unsafe impl Send for OwnerHandle {}
unsafe impl Sync for OwnerHandle {}

impl OwnerHandle {
    /// Wrap the raw pointer passed to init
    pub const fn from_raw(ptr: *const OwnerThread) -> Self {
        Self(ptr)
    }

    /// A handle with no run loop behind it
    pub const fn null() -> Self {
        Self(std::ptr::null())
    }

    /// Check for the missing run loop
    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }

    /// Raw pointer for passing back across the ABI
    pub fn as_ptr(&self) -> *const OwnerThread {
        self.0
    }

    /// Enqueue a raw `(callback, payload)` pair.
    ///
    /// `release` receives the payload instead of `callback` if the run loop
    /// discards the message unrun.
    ///
    /// # Safety
    /// `callback` and `release` must accept `payload` and take ownership of
    /// it.
    pub unsafe fn post_raw(
        &self,
        callback: DispatchFn,
        release: Option<DispatchFn>,
        payload: *mut c_void,
    ) -> bool {
        match self.0.as_ref() {
            Some(owner) => (owner.post)(owner.data, callback, release, payload) != 0,
            None => false,
        }
    }
}

impl Scheduler for OwnerHandle {
    fn post(&self, task: Task) -> bool {
        let payload = Box::into_raw(Box::new(task)) as *mut c_void;
        // SAFETY: exactly one of the two callbacks reclaims the box created
        // above.
        if unsafe { self.post_raw(run_boxed_task, Some(drop_boxed_task), payload) } {
            true
        } else {
            // Rejected: the callback will never run, reclaim the payload here.
            drop(unsafe { Box::from_raw(payload as *mut Task) });
            false
        }
    }
}

unsafe extern "C" fn run_boxed_task(payload: *mut c_void) {
    let task = Box::from_raw(payload as *mut Task);
    if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(move || task())) {
        log::error!("dispatched task panicked: {}", crate::native::panic_message(&panic));
    }
}

/// Discard path: the run loop closed with the task still queued.
unsafe extern "C" fn drop_boxed_task(payload: *mut c_void) {
    let task = Box::from_raw(payload as *mut Task);
    if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(move || drop(task))) {
        log::error!(
            "dropping a discarded task panicked: {}",
            crate::native::panic_message(&panic)
        );
    }
}

/// Raw payload pointer carried through a [`Task`].
struct RawPayload(*mut c_void);

// SAFETY: ownership of the payload moves to the dispatched callback.
unsafe impl Send for RawPayload {}

impl RawPayload {
    fn into_inner(self) -> *mut c_void {
        self.0
    }
}

enum Binding {
    Owner(OwnerHandle),
    Scheduler(Arc<dyn Scheduler>),
}

impl Binding {
    fn post(&self, task: Task) -> bool {
        match self {
            Binding::Owner(owner) => owner.post(task),
            Binding::Scheduler(scheduler) => scheduler.post(task),
        }
    }
}

/// Posts work onto the engine's owning thread.
///
/// Clones share one binding, so clearing any clone silences all of them.
/// Clearing waits for in-progress posts, so once [`Dispatcher::clear`]
/// returns no worker can reach the run loop through this dispatcher.
#[derive(Clone, Default)]
pub struct Dispatcher {
    binding: Arc<RwLock<Option<Binding>>>,
}

impl Dispatcher {
    /// Bind to the run loop received at init. A null handle yields an
    /// unbound dispatcher.
    pub fn new(owner: OwnerHandle) -> Self {
        let binding = (!owner.is_null()).then_some(Binding::Owner(owner));
        Self {
            binding: Arc::new(RwLock::new(binding)),
        }
    }

    /// Bind to an in-process scheduler
    pub fn with_scheduler(scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            binding: Arc::new(RwLock::new(Some(Binding::Scheduler(scheduler)))),
        }
    }

    /// A dispatcher that drops everything
    pub fn unbound() -> Self {
        Self::default()
    }

    /// Check whether a run loop is bound
    pub fn is_bound(&self) -> bool {
        self.binding.read().is_some()
    }

    /// Run `work` on the owning thread.
    ///
    /// Returns `false` when nothing is bound or the run loop refused the
    /// message; `work` is dropped unrun in that case.
    pub fn dispatch<F>(&self, work: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let binding = self.binding.read();
        match binding.as_ref() {
            Some(binding) => {
                let accepted = binding.post(Box::new(work));
                if !accepted {
                    log::debug!("run loop refused dispatched work; dropping it");
                }
                accepted
            }
            None => false,
        }
    }

    /// Run `callback(payload)` on the owning thread.
    ///
    /// Returns `false` when the message was not queued; the caller still owns
    /// `payload` in that case. An accepted message that the run loop discards
    /// unrun is not reclaimed, so callers needing that guarantee use
    /// [`dispatch`](Self::dispatch).
    ///
    /// # Safety
    /// `callback` must accept `payload` and take ownership of it.
    pub unsafe fn dispatch_raw(&self, callback: DispatchFn, payload: *mut c_void) -> bool {
        let binding = self.binding.read();
        match binding.as_ref() {
            Some(Binding::Owner(owner)) => owner.post_raw(callback, None, payload),
            Some(Binding::Scheduler(scheduler)) => {
                let payload = RawPayload(payload);
                // A refused Task is dropped, which leaves the raw payload
                // untouched and still owned by the caller.
                scheduler.post(Box::new(move || {
                    let payload = payload.into_inner();
                    callback(payload)
                }))
            }
            None => false,
        }
    }

    /// Unbind from the run loop. Idempotent.
    pub fn clear(&self) {
        if self.binding.write().take().is_some() {
            log::debug!("dispatcher cleared");
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("bound", &self.is_bound())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scheduler that queues work until `drain` is called.
    #[derive(Default)]
    struct QueueScheduler {
        queue: Mutex<Vec<Task>>,
        open: parking_lot::RwLock<bool>,
    }

    impl QueueScheduler {
        fn open() -> Arc<Self> {
            let s = Arc::new(Self::default());
            *s.open.write() = true;
            s
        }

        fn drain(&self) -> usize {
            let tasks: Vec<Task> = std::mem::take(&mut *self.queue.lock());
            let n = tasks.len();
            for task in tasks {
                task();
            }
            n
        }
    }

    impl Scheduler for QueueScheduler {
        fn post(&self, task: Task) -> bool {
            if !*self.open.read() {
                return false;
            }
            self.queue.lock().push(task);
            true
        }
    }

    #[test]
    fn test_dispatch_is_never_synchronous() {
        let scheduler = QueueScheduler::open();
        let dispatcher = Dispatcher::with_scheduler(scheduler.clone());
        let hits = Arc::new(AtomicUsize::new(0));

        let h = hits.clone();
        assert!(dispatcher.dispatch(move || {
            h.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        assert_eq!(scheduler.drain(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dispatch_preserves_order() {
        let scheduler = QueueScheduler::open();
        let dispatcher = Dispatcher::with_scheduler(scheduler.clone());
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..10 {
            let seen = seen.clone();
            dispatcher.dispatch(move || seen.lock().push(i));
        }
        scheduler.drain();
        assert_eq!(*seen.lock(), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_cleared_dispatcher_drops_work() {
        let scheduler = QueueScheduler::open();
        let dispatcher = Dispatcher::with_scheduler(scheduler.clone());
        let other = dispatcher.clone();
        dispatcher.clear();
        dispatcher.clear();

        let dropped = Arc::new(AtomicUsize::new(0));
        struct DropCounter(Arc<AtomicUsize>);
        impl Drop for DropCounter {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
        let guard = DropCounter(dropped.clone());
        assert!(!other.dispatch(move || drop(guard)));
        assert_eq!(dropped.load(Ordering::SeqCst), 1);
        assert!(!other.is_bound());
        assert_eq!(scheduler.drain(), 0);
    }

    #[test]
    fn test_null_owner_is_unbound() {
        let dispatcher = Dispatcher::new(OwnerHandle::null());
        assert!(!dispatcher.is_bound());
        assert!(!dispatcher.dispatch(|| panic!("must not run")));
    }

    #[test]
    fn test_raw_dispatch_through_scheduler() {
        static RAN: AtomicUsize = AtomicUsize::new(0);
        unsafe extern "C" fn callback(payload: *mut c_void) {
            let value = Box::from_raw(payload as *mut usize);
            RAN.fetch_add(*value, Ordering::SeqCst);
        }

        let scheduler = QueueScheduler::open();
        let dispatcher = Dispatcher::with_scheduler(scheduler.clone());
        let payload = Box::into_raw(Box::new(7usize)) as *mut c_void;
        assert!(unsafe { dispatcher.dispatch_raw(callback, payload) });
        scheduler.drain();
        assert_eq!(RAN.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn test_refused_raw_dispatch_leaves_payload_with_caller() {
        unsafe extern "C" fn callback(_payload: *mut c_void) {
            panic!("must not run");
        }

        let scheduler = Arc::new(QueueScheduler::default());
        let dispatcher = Dispatcher::with_scheduler(scheduler);
        let payload = Box::into_raw(Box::new(1u64)) as *mut c_void;
        assert!(!unsafe { dispatcher.dispatch_raw(callback, payload) });
        drop(unsafe { Box::from_raw(payload as *mut u64) });
    }
}
