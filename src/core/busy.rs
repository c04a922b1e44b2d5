//! Re-entrancy guard for user-triggered network actions.
//!
//! A [`BusyFlag`] stands in for a disabled button: while a guard is alive any
//! further attempt to acquire it fails immediately. Nothing is queued.

use std::sync::atomic::{AtomicBool, Ordering};

/// Set while an action is in flight.
#[derive(Debug, Default)]
pub struct BusyFlag {
    busy: AtomicBool,
}

impl BusyFlag {
    /// Creates an idle flag.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            busy: AtomicBool::new(false),
        }
    }

    /// Marks the flag busy, or returns `None` if it already is.
    ///
    /// The flag is cleared when the returned guard is dropped, whatever the
    /// outcome of the guarded action.
    #[must_use]
    pub fn try_acquire(&self) -> Option<BusyGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard { flag: self })
    }

    /// Whether an action currently holds the flag.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Clears its [`BusyFlag`] on drop.
#[derive(Debug)]
pub struct BusyGuard<'a> {
    flag: &'a BusyFlag,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.busy.store(false, Ordering::Release);
    }
}
