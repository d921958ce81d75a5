//! Addon-wide state record
//!
//! Native functions are plain `extern "C"` fns, so state shared between them
//! lives in a `static`. [`AddonCell`] keeps all of it in one record behind one
//! mutex.
//!
//! Never call into script code while inside [`AddonCell::with`]: script code
//! may re-enter the addon and take the lock again. Clone what is needed out of
//! the cell, leave the closure, then make the call.

use parking_lot::Mutex;

/// Lazily installed, mutex-guarded addon state.
pub struct AddonCell<T> {
    slot: Mutex<Option<T>>,
}

impl<T> AddonCell<T> {
    /// An empty cell, usable in a `static`
    pub const fn new() -> Self {
        Self {
            slot: parking_lot::const_mutex(None),
        }
    }

    /// Install `value`, returning whatever was installed before
    pub fn install(&self, value: T) -> Option<T> {
        self.slot.lock().replace(value)
    }

    /// Remove and return the installed value
    pub fn take(&self) -> Option<T> {
        self.slot.lock().take()
    }

    /// Check whether a value is installed
    pub fn is_installed(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Run `f` on the installed value, if any
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.slot.lock().as_mut().map(f)
    }
}

impl<T> Default for AddonCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static COUNTER: AddonCell<u32> = AddonCell::new();

    #[test]
    fn test_cell_lifecycle() {
        assert!(COUNTER.with(|n| *n).is_none());
        assert_eq!(COUNTER.install(1), None);
        assert!(COUNTER.is_installed());
        assert_eq!(COUNTER.with(|n| {
            *n += 1;
            *n
        }), Some(2));
        assert_eq!(COUNTER.install(10), Some(2));
        assert_eq!(COUNTER.take(), Some(10));
        assert!(!COUNTER.is_installed());
    }
}
