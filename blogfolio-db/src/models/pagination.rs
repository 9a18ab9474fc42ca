//! Page size and page result types

use serde::Serialize;

use crate::config::PageConfig;
use crate::query::Cursor;

/// Row limit for one page, clamped to `1..=max_limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimit(u32);

impl PageLimit {
    /// Clamp a requested limit against the configured bounds.
    ///
    /// - Absent limit falls back to `default_limit`
    /// - Zero is raised to 1
    /// - Anything above `max_limit` is lowered to `max_limit`
    pub fn new(requested: Option<u32>, config: &PageConfig) -> Self {
        let max = config.max_limit.max(1);
        Self(requested.unwrap_or(config.default_limit).clamp(1, max))
    }

    /// Get LIMIT value.
    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for PageLimit {
    fn default() -> Self {
        Self::new(None, &PageConfig::default())
    }
}

/// One page of rows in strategy order
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Rows for this page
    pub items: Vec<T>,
    /// Cursor naming the last row, present only when the page was full
    #[serde(serialize_with = "serialize_cursor")]
    pub next_cursor: Option<Cursor>,
}

impl<T> Page<T> {
    /// Check if another page may follow.
    pub fn has_next(&self) -> bool {
        self.next_cursor.is_some()
    }

    /// Opaque token for the next request, if any.
    pub fn next_token(&self) -> Option<String> {
        self.next_cursor.as_ref().map(Cursor::encode)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

fn serialize_cursor<S>(cursor: &Option<Cursor>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match cursor {
        Some(cursor) => serializer.serialize_some(&cursor.encode()),
        None => serializer.serialize_none(),
    }
}
