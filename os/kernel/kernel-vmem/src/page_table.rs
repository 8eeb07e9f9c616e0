//! # Per-process page table
//!
//! A flat table of [`VIRTUAL_PAGES`] entries, one per virtual page. There is
//! no hierarchy: the simulated address space is only 100 KiB.
//!
//! ## Invariants & Notes
//!
//! - A non-present entry carries no frame; [`PageTableEntry::frame`] is only
//!   meaningful when [`PageTableEntry::present`] is set.
//! - After modifying a mapping that may be cached, the caller must invalidate
//!   the matching [`TranslationCache`](crate::TranslationCache) entry.

use crate::VIRTUAL_PAGES;
use crate::addresses::{PhysicalPage, VirtualPage};
use bitfield_struct::bitfield;
use core::fmt;

/// A single page table entry in its raw bitfield form.
///
/// ### Bit layout
///
/// | Bits  | Name      | Meaning |
/// |-------|-----------|---------|
/// | 0     | `present` | Valid mapping if set |
/// | 1–15  | `frame`   | Physical page number |
#[bitfield(u16)]
#[derive(PartialEq, Eq)]
pub struct PageTableEntry {
    /// Present (bit 0).
    pub present: bool,

    /// Physical page number (bits 1–15).
    #[bits(15)]
    pub frame: u16,
}

impl PageTableEntry {
    /// A present entry mapping `page`.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn mapping(page: PhysicalPage) -> Self {
        Self::new()
            .with_present(true)
            .with_frame(page.number() as u16)
    }

    /// The mapped physical page, if present.
    #[inline]
    #[must_use]
    pub const fn physical_page(self) -> Option<PhysicalPage> {
        if self.present() {
            Some(PhysicalPage::new(self.frame() as u32))
        } else {
            None
        }
    }
}

/// The page table: [`VIRTUAL_PAGES`] entries indexed by virtual page number.
#[derive(Clone)]
pub struct PageTable {
    entries: [PageTableEntry; VIRTUAL_PAGES],
}

impl fmt::Debug for PageTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.mappings()).finish()
    }
}

impl Default for PageTable {
    fn default() -> Self {
        Self::new()
    }
}

impl PageTable {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: [PageTableEntry::new(); VIRTUAL_PAGES],
        }
    }

    /// Look up the physical page for `page`; `None` if unmapped or out of range.
    #[inline]
    #[must_use]
    pub fn lookup(&self, page: VirtualPage) -> Option<PhysicalPage> {
        self.entries.get(page.index())?.physical_page()
    }

    /// Map `page` to `frame`, returning the frame it previously mapped.
    ///
    /// Out-of-range pages are ignored.
    pub fn map(&mut self, page: VirtualPage, frame: PhysicalPage) -> Option<PhysicalPage> {
        let entry = self.entries.get_mut(page.index())?;
        let previous = entry.physical_page();
        *entry = PageTableEntry::mapping(frame);
        previous
    }

    /// Remove the mapping for `page`, returning the frame it mapped.
    pub fn unmap(&mut self, page: VirtualPage) -> Option<PhysicalPage> {
        let entry = self.entries.get_mut(page.index())?;
        let previous = entry.physical_page();
        *entry = PageTableEntry::new();
        previous
    }

    /// Iterate over all present mappings, lowest virtual page first.
    #[allow(clippy::cast_possible_truncation)]
    pub fn mappings(&self) -> impl Iterator<Item = (VirtualPage, PhysicalPage)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(n, e)| Some((VirtualPage::new(n as u32), e.physical_page()?)))
    }

    /// Drop all mappings, returning the frames that were mapped.
    pub fn clear(&mut self) -> Vec<PhysicalPage> {
        let frames = self.mappings().map(|(_, frame)| frame).collect();
        self.entries = [PageTableEntry::new(); VIRTUAL_PAGES];
        frames
    }

    #[must_use]
    pub fn mapped_count(&self) -> usize {
        self.entries.iter().filter(|e| e.present()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_roundtrips_frame() {
        let e = PageTableEntry::mapping(PhysicalPage::new(99));
        assert!(e.present());
        assert_eq!(e.physical_page(), Some(PhysicalPage::new(99)));
        assert_eq!(PageTableEntry::new().physical_page(), None);
    }

    #[test]
    fn map_unmap_and_out_of_range() {
        let mut pt = PageTable::new();
        assert_eq!(pt.map(VirtualPage::new(3), PhysicalPage::new(7)), None);
        assert_eq!(pt.lookup(VirtualPage::new(3)), Some(PhysicalPage::new(7)));
        assert_eq!(
            pt.map(VirtualPage::new(3), PhysicalPage::new(8)),
            Some(PhysicalPage::new(7))
        );
        assert_eq!(pt.unmap(VirtualPage::new(3)), Some(PhysicalPage::new(8)));
        assert_eq!(pt.lookup(VirtualPage::new(3)), None);

        assert_eq!(pt.map(VirtualPage::new(100), PhysicalPage::new(1)), None);
        assert_eq!(pt.lookup(VirtualPage::new(100)), None);
    }

    #[test]
    fn clear_returns_mapped_frames() {
        let mut pt = PageTable::new();
        pt.map(VirtualPage::new(0), PhysicalPage::new(4));
        pt.map(VirtualPage::new(9), PhysicalPage::new(2));
        assert_eq!(pt.mapped_count(), 2);
        assert_eq!(pt.clear(), vec![PhysicalPage::new(4), PhysicalPage::new(2)]);
        assert_eq!(pt.mapped_count(), 0);
    }
}
