//! Page map of the R18/R21 containers.
//!
//! The page map lists every page of the file as `(id, size)` pairs. Page
//! addresses are not stored: each one is the running total of the sizes
//! before it, starting at the container's page base (0x100 for R18, 0x480
//! for R21). Entries with a negative id are free gaps left behind by
//! incremental saves.

use indexmap::IndexMap;

/// One page of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageEntry {
    pub id: i64,
    /// Absolute file offset of the page
    pub address: u64,
    /// Size of the page on disk, header and padding included
    pub size: u64,
}

impl PageEntry {
    /// First byte past the page.
    pub fn end(&self) -> u64 {
        self.address.saturating_add(self.size)
    }
}

/// A free page-map entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageGap {
    /// Negative id as stored
    pub id: i64,
    pub address: u64,
    pub size: u64,
    /// Tree links of the free list (R18 only)
    pub parent: i32,
    pub left: i32,
    pub right: i32,
}

/// Page id → page lookup, in file order.
#[derive(Debug, Clone, Default)]
pub struct PageMap {
    pages: IndexMap<i64, PageEntry>,
    gaps: Vec<PageGap>,
}

impl PageMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a page. Returns the entry already stored under the same id,
    /// if any; the first entry is kept.
    pub fn insert(&mut self, entry: PageEntry) -> Option<PageEntry> {
        match self.pages.get(&entry.id) {
            Some(existing) => Some(*existing),
            None => {
                self.pages.insert(entry.id, entry);
                None
            }
        }
    }

    pub fn push_gap(&mut self, gap: PageGap) {
        self.gaps.push(gap);
    }

    pub fn get(&self, id: i64) -> Option<&PageEntry> {
        self.pages.get(&id)
    }

    pub fn pages(&self) -> impl Iterator<Item = &PageEntry> {
        self.pages.values()
    }

    pub fn gaps(&self) -> &[PageGap] {
        &self.gaps
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}
