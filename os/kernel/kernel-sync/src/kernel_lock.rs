use std::sync::{Mutex, MutexGuard, PoisonError};

pub type KernelGuard<'a, T> = MutexGuard<'a, T>;

/// A mutex that shrugs off poisoning.
#[derive(Debug, Default)]
pub struct KernelLock<T> {
    inner: Mutex<T>,
}

impl<T> KernelLock<T> {
    pub const fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
        }
    }

    /// Block until acquired, then return a guard.
    #[inline]
    pub fn lock(&self) -> KernelGuard<'_, T> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
