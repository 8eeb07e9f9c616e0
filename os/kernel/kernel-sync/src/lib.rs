//! # Kernel synchronization primitives
//!
//! The simulated kernel runs every process body on its own host thread and
//! serializes them through one [`KernelLock`]. A thread that is not allowed to
//! run parks on its own [`Gate`] until the scheduler opens it.
//!
//! Poisoning is ignored throughout: a process body that panics while holding
//! the lock must not take the rest of the machine down with it.

mod gate;
mod kernel_lock;

pub use gate::Gate;
pub use kernel_lock::{KernelGuard, KernelLock};
