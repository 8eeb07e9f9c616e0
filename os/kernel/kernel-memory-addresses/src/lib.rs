//! # Virtual and Physical Memory Address Types
//!
//! Strongly typed wrappers for raw addresses and page numbers of the simulated
//! machine.
//!
//! ## Overview
//!
//! The simulated machine uses a single, fixed page size of [`PAGE_SIZE`]
//! (1 KiB). Addresses are 32-bit; a page is named by its **page number**
//! (`address / PAGE_SIZE`) rather than by its base address, since page tables,
//! the translation cache and the allocation bitmap are all indexed by number.
//!
//! | Concept | Description |
//! |----------|-------------|
//! | [`MemoryAddress`] | A raw address, either physical or virtual. |
//! | [`PageOffset`] | An offset within a page (`0..PAGE_SIZE`). |
//!
//! These are then wrapped to distinguish between virtual and physical spaces:
//!
//! | Wrapper | Meaning |
//! |----------|----------|
//! | [`VirtualAddress`] / [`VirtualPage`] | Refer to a process's (page-table translated) memory. |
//! | [`PhysicalAddress`] / [`PhysicalPage`] | Refer to the shared physical pool. |
//!
//! ## Typical Usage
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let va = VirtualAddress::new(3100);
//!
//! // Split it into a page and an in-page offset
//! let (page, off) = va.split();
//! assert_eq!(page.number(), 3);
//! assert_eq!(off.as_u32(), 28);
//!
//! // Join them back to the same address
//! assert_eq!(page.join(off), va);
//!
//! // Translating means joining the offset onto a different page
//! let pa = PhysicalPage::new(7).join(off);
//! assert_eq!(pa.as_u32(), 7 * 1024 + 28);
//! ```
//!
//! ## Design Notes
//!
//! - The types are `#[repr(transparent)]` and implement `Copy`, `Eq`, `Ord`, and
//!   `Hash`, making them suitable as map keys.
//! - All alignment and offset calculations are `const fn`.

#![cfg_attr(not(any(test, doctest)), no_std)]

mod memory_address;
mod page_offset;
mod physical_address;
mod physical_page;
mod virtual_address;
mod virtual_page;

pub use memory_address::MemoryAddress;
pub use page_offset::PageOffset;
pub use physical_address::PhysicalAddress;
pub use physical_page::PhysicalPage;
pub use virtual_address::VirtualAddress;
pub use virtual_page::VirtualPage;

/// Size of a page in bytes.
pub const PAGE_SIZE: u32 = 1024;

/// log2([`PAGE_SIZE`]), i.e., number of low bits used for the offset.
pub const PAGE_SHIFT: u32 = 10;

const _: () = assert!(1 << PAGE_SHIFT == PAGE_SIZE);

/// Returns `true` if `value` is a multiple of [`PAGE_SIZE`] (zero included).
#[inline]
#[must_use]
pub const fn is_page_multiple(value: u32) -> bool {
    value & (PAGE_SIZE - 1) == 0
}

/// Number of whole pages covered by `bytes` (rounded down).
#[inline]
#[must_use]
pub const fn pages_in(bytes: u32) -> u32 {
    bytes >> PAGE_SHIFT
}
