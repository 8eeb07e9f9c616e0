//! Minimal memory manager for the simulated machine.
//!
//! Owns the [`PhysicalMemory`] pool and operates on whichever
//! [`AddressSpace`] the caller hands in. Size and pointer arguments are
//! expected to have passed [`validate_allocation`] / [`validate_free`] first.

use crate::addresses::{
    PhysicalAddress, PhysicalPage, VirtualAddress, VirtualPage, is_page_multiple, pages_in,
};
use crate::{
    AddressSpace, MemoryError, PHYSICAL_PAGES, PageBitmap, PhysicalMemory, TlbEntry, VIRTUAL_PAGES,
};
use log::{debug, trace, warn};
use rand::Rng;
use rand::rngs::StdRng;

/// How a translation-cache miss is resolved.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum TlbMissPolicy {
    /// Install the process's own page-table mapping. Unmapped pages fault.
    #[default]
    TrueMapping,
    /// Install a randomly chosen physical page, ignoring the page table.
    RandomRemap,
}

/// Check an allocation size: a positive multiple of the page size.
///
/// # Errors
/// [`MemoryError::Unaligned`] otherwise.
pub const fn validate_allocation(size: u32) -> Result<(), MemoryError> {
    if size == 0 || !is_page_multiple(size) {
        return Err(MemoryError::Unaligned(size));
    }
    Ok(())
}

/// Check a free request: pointer and size both multiples of the page size.
///
/// # Errors
/// [`MemoryError::Unaligned`] naming the offending value.
pub const fn validate_free(pointer: VirtualAddress, size: u32) -> Result<(), MemoryError> {
    if !pointer.is_page_aligned() {
        return Err(MemoryError::Unaligned(pointer.as_u32()));
    }
    if !is_page_multiple(size) {
        return Err(MemoryError::Unaligned(size));
    }
    Ok(())
}

pub struct MemoryManager {
    physical: PhysicalMemory,
    policy: TlbMissPolicy,
    rng: StdRng,
}

impl MemoryManager {
    #[must_use]
    pub fn new(policy: TlbMissPolicy, rng: StdRng) -> Self {
        Self {
            physical: PhysicalMemory::new(),
            policy,
            rng,
        }
    }

    #[inline]
    #[must_use]
    pub const fn policy(&self) -> TlbMissPolicy {
        self.policy
    }

    #[inline]
    #[must_use]
    pub const fn bitmap(&self) -> PageBitmap {
        self.physical.bitmap()
    }

    #[inline]
    #[must_use]
    pub const fn allocated_pages(&self) -> usize {
        self.physical.bitmap().count()
    }

    /// First-fit allocation of `size` bytes, mapped at virtual page 0 onwards.
    ///
    /// # Errors
    /// [`MemoryError::OutOfMemory`] if no contiguous run is large enough; the
    /// bitmap is not modified in that case.
    #[allow(clippy::cast_possible_truncation)]
    pub fn allocate(
        &mut self,
        space: &mut AddressSpace,
        size: u32,
    ) -> Result<VirtualAddress, MemoryError> {
        debug_assert!(validate_allocation(size).is_ok());
        let pages = pages_in(size) as usize;
        if pages > VIRTUAL_PAGES {
            warn!("allocation of {pages} pages exceeds the virtual address space");
            return Err(MemoryError::OutOfMemory(pages));
        }

        let Some(first) = self.physical.claim_contiguous(pages) else {
            warn!(
                "no run of {pages} free pages ({} of {PHYSICAL_PAGES} in use)",
                self.allocated_pages()
            );
            return Err(MemoryError::OutOfMemory(pages));
        };

        for n in 0..pages as u32 {
            let vpage = VirtualPage::new(n);
            let frame = PhysicalPage::new(first.number() + n);
            if let Some(replaced) = space.page_table.map(vpage, frame) {
                trace!("{vpage} no longer maps {replaced}");
            }
            space.owned.set(frame);
            space.tlb.invalidate(vpage);
        }
        debug!("mapped {pages} pages at {first} to virtual page 0");
        Ok(VirtualAddress::zero())
    }

    /// Unmap `size` bytes starting at `pointer` and return their frames to the pool.
    ///
    /// No ownership check: whatever the addressed entries map is released.
    pub fn free(&mut self, space: &mut AddressSpace, pointer: VirtualAddress, size: u32) {
        debug_assert!(validate_free(pointer, size).is_ok());
        let first = pointer.page();
        for n in 0..pages_in(size) {
            let vpage = first.step(n);
            if vpage.index() >= VIRTUAL_PAGES {
                break;
            }
            if let Some(frame) = space.page_table.unmap(vpage) {
                space.owned.clear(frame);
                self.physical.release(frame);
            }
            space.tlb.invalidate(vpage);
        }
        debug!("freed {} pages from {pointer}", pages_in(size));
    }

    /// Drop every mapping of a terminating process.
    ///
    /// With `return_pages`, every frame the process was handed goes back to
    /// the pool, including frames whose mappings a later allocation replaced.
    pub fn release(&mut self, space: &mut AddressSpace, return_pages: bool) {
        let mapped = space.page_table.clear();
        let owned = std::mem::take(&mut space.owned);
        space.tlb.flush();
        if return_pages {
            for frame in owned.allocated() {
                self.physical.release(frame);
            }
        }
        debug!(
            "released address space ({} mapped, {} owned, returned: {return_pages})",
            mapped.len(),
            owned.count()
        );
    }

    /// Install a translation for `page` according to the miss policy.
    ///
    /// # Errors
    /// [`MemoryError::Unmapped`] under [`TlbMissPolicy::TrueMapping`] when the
    /// page table has no entry for `page`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn resolve_miss(
        &mut self,
        space: &mut AddressSpace,
        page: VirtualPage,
    ) -> Result<PhysicalPage, MemoryError> {
        let frame = match self.policy {
            TlbMissPolicy::TrueMapping => space
                .page_table
                .lookup(page)
                .ok_or(MemoryError::Unmapped(page.base()))?,
            TlbMissPolicy::RandomRemap => {
                PhysicalPage::new(self.rng.gen_range(0..PHYSICAL_PAGES as u32))
            }
        };
        trace!("tlb miss on {page}, installing {frame}");
        space.tlb.install(
            TlbEntry {
                virtual_page: page,
                physical_page: frame,
            },
            &mut self.rng,
        );
        Ok(frame)
    }

    /// Translate `va`: cache hit, or resolve the miss and retry.
    ///
    /// # Errors
    /// As [`resolve_miss`](Self::resolve_miss).
    pub fn translate(
        &mut self,
        space: &mut AddressSpace,
        va: VirtualAddress,
    ) -> Result<PhysicalAddress, MemoryError> {
        let (page, offset) = va.split();
        loop {
            if let Some(frame) = space.tlb.lookup(page) {
                return Ok(frame.join(offset));
            }
            self.resolve_miss(space, page)?;
        }
    }

    /// Read one byte through the translation cache.
    ///
    /// # Errors
    /// As [`translate`](Self::translate).
    pub fn read_byte(
        &mut self,
        space: &mut AddressSpace,
        va: VirtualAddress,
    ) -> Result<u8, MemoryError> {
        let pa = self.translate(space, va)?;
        Ok(self.physical.read(pa))
    }

    /// Write one byte through the translation cache.
    ///
    /// # Errors
    /// As [`translate`](Self::translate).
    pub fn write_byte(
        &mut self,
        space: &mut AddressSpace,
        va: VirtualAddress,
        value: u8,
    ) -> Result<(), MemoryError> {
        let pa = self.translate(space, va)?;
        self.physical.write(pa, value);
        Ok(())
    }
}
