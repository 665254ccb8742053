//! Page Cache
//!
//! Holds resolved page content for one pagination session. Entries are
//! keyed by page number only and are never evicted; the whole cache is
//! dropped when the session resets.

use std::collections::HashMap;

use crate::PageNumber;

/// Session page cache
#[derive(Debug, Clone)]
pub struct PageCache<T> {
    entries: HashMap<PageNumber, T>,
}

impl<T> PageCache<T> {
    pub fn new() -> Self {
        Self { entries: HashMap::new() }
    }

    /// Get cached content for a page
    pub fn get(&self, page: PageNumber) -> Option<&T> {
        self.entries.get(&page)
    }

    /// Check if a page is cached
    pub fn contains(&self, page: PageNumber) -> bool {
        self.entries.contains_key(&page)
    }

    /// Store content for a page. The last writer wins; the replaced entry is returned.
    pub fn insert(&mut self, page: PageNumber, content: T) -> Option<T> {
        let replaced = self.entries.insert(page, content);
        if replaced.is_some() {
            tracing::trace!("Page {} cached again, replacing earlier entry", page);
        }
        replaced
    }

    /// Number of cached pages
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Cached page numbers in ascending order
    pub fn pages(&self) -> Vec<PageNumber> {
        let mut pages: Vec<_> = self.entries.keys().copied().collect();
        pages.sort();
        pages
    }
}

impl<T> Default for PageCache<T> {
    fn default() -> Self {
        Self::new()
    }
}
