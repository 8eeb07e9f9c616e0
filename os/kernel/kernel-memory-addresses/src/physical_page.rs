use crate::{PAGE_SHIFT, PageOffset, PhysicalAddress};
use core::fmt;

/// Physical memory page, named by its page number in the shared pool.
///
/// The page number doubles as the bit index in the allocation bitmap.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalPage(u32);

impl PhysicalPage {
    #[inline]
    #[must_use]
    pub const fn new(number: u32) -> Self {
        Self(number)
    }

    #[inline]
    #[must_use]
    pub const fn from_addr(p: PhysicalAddress) -> Self {
        p.page()
    }

    #[inline]
    #[must_use]
    pub const fn number(self) -> u32 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    #[must_use]
    pub const fn base(self) -> PhysicalAddress {
        PhysicalAddress::new(self.0 << PAGE_SHIFT)
    }

    #[inline]
    #[must_use]
    pub const fn join(self, off: PageOffset) -> PhysicalAddress {
        PhysicalAddress::new((self.0 << PAGE_SHIFT) | off.as_u32())
    }
}

impl fmt::Display for PhysicalPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ppage {}", self.0)
    }
}

impl fmt::Debug for PhysicalPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysicalPage({})", self.0)
    }
}
