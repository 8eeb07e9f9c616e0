//! The shared physical pool.

use crate::PHYSICAL_PAGES;
use crate::addresses::{PAGE_SIZE, PhysicalAddress, PhysicalPage};
use core::fmt;

const _: () = assert!(PHYSICAL_PAGES <= 128, "bitmap is backed by a u128");

/// Allocation bitmap of the physical pool; bit `n` set = page `n` allocated.
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct PageBitmap(u128);

impl PageBitmap {
    #[inline]
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[inline]
    #[must_use]
    pub const fn is_set(self, page: PhysicalPage) -> bool {
        self.0 & (1 << page.number()) != 0
    }

    #[inline]
    pub const fn set(&mut self, page: PhysicalPage) {
        self.0 |= 1 << page.number();
    }

    #[inline]
    pub const fn clear(&mut self, page: PhysicalPage) {
        self.0 &= !(1 << page.number());
    }

    /// Number of allocated pages.
    #[inline]
    #[must_use]
    pub const fn count(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Left-to-right scan for the first run of `len` clear bits.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn first_fit(self, len: usize) -> Option<PhysicalPage> {
        if len == 0 || len > PHYSICAL_PAGES {
            return None;
        }
        let mut run = 0;
        for n in 0..PHYSICAL_PAGES {
            if self.is_set(PhysicalPage::new(n as u32)) {
                run = 0;
                continue;
            }
            run += 1;
            if run == len {
                return Some(PhysicalPage::new((n + 1 - len) as u32));
            }
        }
        None
    }

    /// Iterate over the allocated pages, lowest first.
    #[allow(clippy::cast_possible_truncation)]
    pub fn allocated(self) -> impl Iterator<Item = PhysicalPage> {
        (0..PHYSICAL_PAGES as u32)
            .map(PhysicalPage::new)
            .filter(move |p| self.is_set(*p))
    }
}

impl fmt::Debug for PageBitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PageBitmap({:#0130b})", self.0)
    }
}

/// The physical pool: [`PHYSICAL_PAGES`] pages of [`PAGE_SIZE`] bytes.
///
/// Shared by all processes; nothing isolates one process's pages from another.
pub struct PhysicalMemory {
    bitmap: PageBitmap,
    bytes: Box<[u8]>,
}

impl Default for PhysicalMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicalMemory {
    #[must_use]
    pub fn new() -> Self {
        Self {
            bitmap: PageBitmap::empty(),
            bytes: vec![0; PHYSICAL_PAGES * PAGE_SIZE as usize].into_boxed_slice(),
        }
    }

    #[inline]
    #[must_use]
    pub const fn bitmap(&self) -> PageBitmap {
        self.bitmap
    }

    /// Claim the first run of `pages` contiguous free pages.
    ///
    /// Returns the first page of the run; the bitmap is unchanged on `None`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn claim_contiguous(&mut self, pages: usize) -> Option<PhysicalPage> {
        let first = self.bitmap.first_fit(pages)?;
        for n in 0..pages as u32 {
            self.bitmap.set(PhysicalPage::new(first.number() + n));
        }
        Some(first)
    }

    /// Return a page to the pool. Releasing a free page is a no-op.
    pub fn release(&mut self, page: PhysicalPage) {
        if page.index() < PHYSICAL_PAGES {
            self.bitmap.clear(page);
        }
    }

    #[inline]
    #[must_use]
    pub fn read(&self, pa: PhysicalAddress) -> u8 {
        self.bytes[pa.as_usize()]
    }

    #[inline]
    pub fn write(&mut self, pa: PhysicalAddress, value: u8) {
        self.bytes[pa.as_usize()] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_fit_skips_short_holes() {
        let mut bm = PageBitmap::empty();
        bm.set(PhysicalPage::new(1));
        bm.set(PhysicalPage::new(4));
        // holes: [0], [2,3], [5..]
        assert_eq!(bm.first_fit(1), Some(PhysicalPage::new(0)));
        assert_eq!(bm.first_fit(2), Some(PhysicalPage::new(2)));
        assert_eq!(bm.first_fit(3), Some(PhysicalPage::new(5)));
    }

    #[test]
    fn first_fit_rejects_oversized_runs() {
        let bm = PageBitmap::empty();
        assert_eq!(bm.first_fit(PHYSICAL_PAGES), Some(PhysicalPage::new(0)));
        assert_eq!(bm.first_fit(PHYSICAL_PAGES + 1), None);
        assert_eq!(bm.first_fit(0), None);
    }

    #[test]
    fn claim_marks_run_and_failure_leaves_bitmap() {
        let mut mem = PhysicalMemory::new();
        let first = mem.claim_contiguous(98).unwrap();
        assert_eq!(first, PhysicalPage::new(0));
        assert_eq!(mem.bitmap().count(), 98);

        let before = mem.bitmap();
        assert!(mem.claim_contiguous(3).is_none());
        assert_eq!(mem.bitmap(), before);
    }

    #[test]
    fn release_clears_bit() {
        let mut mem = PhysicalMemory::new();
        let p = mem.claim_contiguous(1).unwrap();
        assert!(mem.bitmap().is_set(p));
        mem.release(p);
        assert!(!mem.bitmap().is_set(p));
        mem.release(PhysicalPage::new(500));
    }

    #[test]
    fn bytes_are_addressable_across_the_pool() {
        let mut mem = PhysicalMemory::new();
        let last = PhysicalAddress::new(PHYSICAL_PAGES as u32 * PAGE_SIZE - 1);
        mem.write(last, 0xAB);
        assert_eq!(mem.read(last), 0xAB);
        assert_eq!(mem.read(PhysicalAddress::new(0)), 0);
    }
}
