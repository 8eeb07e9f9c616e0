use crate::{PAGE_SHIFT, PageOffset, VirtualAddress};
use core::fmt;

/// Virtual memory page, named by its page number.
///
/// ### Semantics
/// - `base()` returns the first address of the page as a [`VirtualAddress`].
/// - `join(off)` combines this page with a [`PageOffset`] to form a full
///   [`VirtualAddress`].
/// - `index()` is the page-table slot for this page.
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::*;
/// let va = VirtualAddress::new(5 * PAGE_SIZE + 17);
/// let vp = va.page();
/// assert_eq!(vp.index(), 5);
/// assert_eq!(vp.join(va.offset()), va);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VirtualPage(u32);

impl VirtualPage {
    #[inline]
    #[must_use]
    pub const fn new(number: u32) -> Self {
        Self(number)
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
    pub const fn base(self) -> VirtualAddress {
        VirtualAddress::new(self.0 << PAGE_SHIFT)
    }

    #[inline]
    #[must_use]
    pub const fn join(self, off: PageOffset) -> VirtualAddress {
        VirtualAddress::new((self.0 << PAGE_SHIFT) | off.as_u32())
    }

    /// The page `n` pages after this one.
    #[inline]
    #[must_use]
    pub const fn step(self, n: u32) -> Self {
        Self(self.0 + n)
    }
}

impl fmt::Display for VirtualPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vpage {}", self.0)
    }
}

impl fmt::Debug for VirtualPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VirtualPage({})", self.0)
    }
}

impl TryFrom<VirtualAddress> for VirtualPage {
    type Error = ();

    #[inline]
    fn try_from(va: VirtualAddress) -> Result<Self, ()> {
        if va.is_page_aligned() {
            Ok(va.page())
        } else {
            Err(())
        }
    }
}
