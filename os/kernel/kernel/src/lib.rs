//! # Simulated kernel
//!
//! A single-machine kernel that runs user-supplied [`ProcessBody`]s on host
//! threads and schedules them one at a time.
//!
//! - [`Scheduler`]: three ready queues (realtime, interactive, background),
//!   probabilistic queue selection, demotion of processes that keep running
//!   for [`KernelConfig::demotion_threshold`] consecutive dispatches, a sleep
//!   queue and a message-wait set.
//! - Memory: every process owns an address space of 100 one-KiB pages backed
//!   by a shared 100-page physical pool (see [`kernel_vmem`]).
//! - Messaging: per-process FIFO mailboxes of [`KernelMessage`]s with
//!   blocking receive.
//! - Devices: a 10-slot device table behind a per-process handle table (see
//!   [`kernel_devices`]).
//!
//! ```no_run
//! use kernel::{Kernel, KernelConfig, from_fn};
//!
//! let kernel = Kernel::boot(KernelConfig::new());
//! let pid = kernel
//!     .spawn(from_fn("hello", |os| {
//!         let page = os.allocate_memory(1024).unwrap();
//!         os.write_byte(page, 42).unwrap();
//!         os.sleep(50);
//!     }))
//!     .unwrap();
//! assert!(kernel.wait_for_exit(pid, std::time::Duration::from_secs(1)));
//! ```

mod config;
mod error;
mod kernel;
mod message;
mod os;
mod process;
mod scheduler;

pub use config::KernelConfig;
pub use error::KernelError;
pub use kernel::Kernel;
pub use message::KernelMessage;
pub use os::{FnBody, Os, ProcessBody, from_fn};
pub use process::{HandleTable, MAX_HANDLES, Pid, Priority, ProcessDescriptor, ProcessState};
pub use scheduler::{DispatchOutcome, Scheduler, SchedulerStats, SleepQueue, select_queue};

pub use kernel_devices as devices;
pub use kernel_memory_addresses::VirtualAddress;
pub use kernel_vmem::{MemoryError, TlbMissPolicy};
