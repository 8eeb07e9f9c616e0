use crate::{PageBitmap, PageTable, TranslationCache};

/// Per-process view of memory: its page table, its translation cache and the
/// physical pages it has been handed.
///
/// `owned` can hold frames the page table no longer maps: a later allocation
/// at virtual page 0 replaces earlier mappings without freeing them.
#[derive(Clone, Debug, Default)]
pub struct AddressSpace {
    pub page_table: PageTable,
    pub tlb: TranslationCache,
    pub owned: PageBitmap,
}

impl AddressSpace {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            page_table: PageTable::new(),
            tlb: TranslationCache::new(),
            owned: PageBitmap::empty(),
        }
    }
}
