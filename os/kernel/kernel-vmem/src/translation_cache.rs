use crate::TLB_ENTRIES;
use crate::addresses::{PhysicalPage, VirtualPage};
use rand::Rng;

/// One cached translation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TlbEntry {
    pub virtual_page: VirtualPage,
    pub physical_page: PhysicalPage,
}

/// A [`TLB_ENTRIES`]-entry translation cache.
///
/// Entries are not tagged with the owning process; flush on every switch.
#[derive(Clone, Debug, Default)]
pub struct TranslationCache {
    entries: [Option<TlbEntry>; TLB_ENTRIES],
}

impl TranslationCache {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: [None; TLB_ENTRIES],
        }
    }

    #[inline]
    #[must_use]
    pub fn lookup(&self, page: VirtualPage) -> Option<PhysicalPage> {
        self.entries
            .iter()
            .flatten()
            .find(|e| e.virtual_page == page)
            .map(|e| e.physical_page)
    }

    /// Install `entry`, replacing an existing entry for the same page, else a
    /// free slot, else a random victim.
    pub fn install<R: Rng + ?Sized>(&mut self, entry: TlbEntry, rng: &mut R) {
        let slot = self
            .entries
            .iter()
            .position(|e| e.is_some_and(|e| e.virtual_page == entry.virtual_page))
            .or_else(|| self.entries.iter().position(Option::is_none))
            .unwrap_or_else(|| rng.gen_range(0..TLB_ENTRIES));
        self.entries[slot] = Some(entry);
    }

    /// Drop the entry for `page`, if cached.
    pub fn invalidate(&mut self, page: VirtualPage) {
        for slot in &mut self.entries {
            if slot.is_some_and(|e| e.virtual_page == page) {
                *slot = None;
            }
        }
    }

    /// Drop all entries.
    pub fn flush(&mut self) {
        self.entries = [None; TLB_ENTRIES];
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.iter().flatten().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn entry(v: u32, p: u32) -> TlbEntry {
        TlbEntry {
            virtual_page: VirtualPage::new(v),
            physical_page: PhysicalPage::new(p),
        }
    }

    #[test]
    fn never_holds_more_than_two_entries() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut tlb = TranslationCache::new();
        for n in 0..10 {
            tlb.install(entry(n, n + 50), &mut rng);
            assert!(tlb.len() <= TLB_ENTRIES);
        }
        assert_eq!(tlb.len(), 2);
        assert_eq!(tlb.lookup(VirtualPage::new(9)), Some(PhysicalPage::new(59)));
    }

    #[test]
    fn reinstall_replaces_same_page() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut tlb = TranslationCache::new();
        tlb.install(entry(1, 10), &mut rng);
        tlb.install(entry(1, 11), &mut rng);
        assert_eq!(tlb.len(), 1);
        assert_eq!(tlb.lookup(VirtualPage::new(1)), Some(PhysicalPage::new(11)));
    }

    #[test]
    fn flush_and_invalidate() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut tlb = TranslationCache::new();
        tlb.install(entry(1, 10), &mut rng);
        tlb.install(entry(2, 20), &mut rng);
        tlb.invalidate(VirtualPage::new(1));
        assert_eq!(tlb.lookup(VirtualPage::new(1)), None);
        assert_eq!(tlb.len(), 1);
        tlb.flush();
        assert!(tlb.is_empty());
    }
}
