//! # Virtual Memory Support
//!
//! Paging for the simulated machine: a shared physical pool, one page table
//! per process, and a tiny per-process translation cache in front of it.
//!
//! ## What you get
//! - [`PhysicalMemory`]: the 100-page (100 KiB) physical pool with its
//!   allocation [`PageBitmap`] and backing bytes.
//! - [`PageTable`]: maps virtual pages `0..VIRTUAL_PAGES` to physical pages.
//! - [`TranslationCache`]: a 2-entry cache of `(virtual page, physical page)`
//!   pairs, flushed on every context switch.
//! - [`AddressSpace`]: the per-process pair of the two above.
//! - [`MemoryManager`]: first-fit contiguous allocation, freeing, and address
//!   translation with a configurable [`TlbMissPolicy`].
//!
//! ## Virtual address → physical address
//!
//! ```text
//! | 31 ‒ 10 | 9 ‒ 0  |
//! |  page   | offset |
//!
//!  VA ──► TranslationCache ──hit──► PA = ppage * 1024 + offset
//!              │
//!             miss
//!              ▼
//!        MemoryManager::resolve_miss ──► install entry, retry
//! ```
//!
//! The cache is not tagged with a process id. Whoever switches processes must
//! [`flush`](TranslationCache::flush) it.
//!
//! ## Allocation layout
//!
//! Allocations always start at virtual page 0 of the caller's address space.
//! A second allocation therefore replaces the first one's mappings. The
//! physical pages behind the replaced mappings can no longer be freed through
//! the page table; the [`AddressSpace`] still records them as owned, and
//! [`MemoryManager::release`] returns them when the process terminates.

mod address_space;
mod manager;
mod page_table;
mod physical;
mod translation_cache;

pub use address_space::AddressSpace;
pub use manager::{MemoryManager, TlbMissPolicy, validate_allocation, validate_free};
pub use page_table::{PageTable, PageTableEntry};
pub use physical::{PageBitmap, PhysicalMemory};
pub use translation_cache::{TlbEntry, TranslationCache};

pub use kernel_memory_addresses as addresses;

/// Number of pages in the shared physical pool.
pub const PHYSICAL_PAGES: usize = 100;

/// Number of virtual pages addressable by one process.
pub const VIRTUAL_PAGES: usize = 100;

/// Number of entries in the per-process translation cache.
pub const TLB_ENTRIES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MemoryError {
    #[error("size or address {0} is not a positive multiple of the page size")]
    Unaligned(u32),
    #[error("no run of {0} contiguous free pages")]
    OutOfMemory(usize),
    #[error("access to unmapped memory at {0}")]
    Unmapped(addresses::VirtualAddress),
}
