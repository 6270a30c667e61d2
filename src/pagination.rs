//! Page arithmetic for listings.

use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde_json::{Map, Value};
use std::ops::RangeInclusive;

/// Immutable snapshot of a listing's page position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationInfo {
    /// Current page, 1-based.
    pub page: u32,
    /// Items per page.
    pub per_page: u32,
    /// Total items across all pages.
    pub total_items: u64,
}

impl PaginationInfo {
    /// Create a snapshot.
    pub fn new(page: u32, per_page: u32, total_items: u64) -> Self {
        Self {
            page,
            per_page,
            total_items,
        }
    }

    /// Number of pages; 1 when `per_page` is zero.
    pub fn total_pages(&self) -> u64 {
        if self.per_page == 0 {
            return 1;
        }
        self.total_items.div_ceil(u64::from(self.per_page))
    }

    /// Whether a page follows this one.
    pub fn has_next(&self) -> bool {
        u64::from(self.page) < self.total_pages()
    }

    /// Whether a page precedes this one.
    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    /// Row offset of the first item on this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.per_page)
    }

    /// Page numbers to link around the current page, `radius` on each side.
    ///
    /// Empty when there are no pages.
    pub fn page_window(&self, radius: u32) -> RangeInclusive<u64> {
        let page = u64::from(self.page);
        let start = page.saturating_sub(u64::from(radius)).max(1);
        let end = (page + u64::from(radius)).min(self.total_pages());
        start..=end
    }

    /// Plain key/value view for presentation layers.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("page".to_string(), Value::from(self.page));
        map.insert("per_page".to_string(), Value::from(self.per_page));
        map.insert("total_items".to_string(), Value::from(self.total_items));
        map.insert("total_pages".to_string(), Value::from(self.total_pages()));
        map.insert("has_next".to_string(), Value::from(self.has_next()));
        map.insert("has_prev".to_string(), Value::from(self.has_prev()));
        map
    }
}

impl Serialize for PaginationInfo {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("PaginationInfo", 6)?;
        state.serialize_field("page", &self.page)?;
        state.serialize_field("per_page", &self.per_page)?;
        state.serialize_field("total_items", &self.total_items)?;
        state.serialize_field("total_pages", &self.total_pages())?;
        state.serialize_field("has_next", &self.has_next())?;
        state.serialize_field("has_prev", &self.has_prev())?;
        state.end()
    }
}
