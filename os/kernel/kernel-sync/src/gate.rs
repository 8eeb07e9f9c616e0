use crate::KernelGuard;
use std::sync::{Condvar, PoisonError};
use std::time::Duration;

/// A parking spot for one thread, tied to a [`KernelLock`](crate::KernelLock).
///
/// The gate holds no state of its own. Whether a waiter may pass is decided by
/// a predicate over the locked value, so a wakeup that arrives before the
/// waiter parks is never lost.
#[derive(Debug, Default)]
pub struct Gate {
    cv: Condvar,
}

impl Gate {
    #[must_use]
    pub const fn new() -> Self {
        Self { cv: Condvar::new() }
    }

    /// Release `guard` and park while `blocked` holds, re-acquiring before
    /// every check.
    pub fn wait_while<'a, T>(
        &self,
        guard: KernelGuard<'a, T>,
        blocked: impl FnMut(&mut T) -> bool,
    ) -> KernelGuard<'a, T> {
        self.cv
            .wait_while(guard, blocked)
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// As [`wait_while`](Self::wait_while), giving up after `timeout`.
    ///
    /// The returned flag is `true` if the timeout elapsed with `blocked` still
    /// holding.
    pub fn wait_timeout_while<'a, T>(
        &self,
        guard: KernelGuard<'a, T>,
        timeout: Duration,
        blocked: impl FnMut(&mut T) -> bool,
    ) -> (KernelGuard<'a, T>, bool) {
        let (guard, result) = self
            .cv
            .wait_timeout_while(guard, timeout, blocked)
            .unwrap_or_else(PoisonError::into_inner);
        (guard, result.timed_out())
    }

    /// Wake every thread parked on this gate so it re-checks its predicate.
    #[inline]
    pub fn open(&self) {
        self.cv.notify_all();
    }
}
