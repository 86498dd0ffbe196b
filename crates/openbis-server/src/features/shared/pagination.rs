//! Search result paging
//!
//! Searches filter and sort in memory, then cut the requested window out of
//! the full match list so `total_count` always reports every match.

use serde::{Deserialize, Serialize};

/// Requested result window
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Paging {
    /// Index of the first object to return. Defaults to 0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<usize>,

    /// Maximum number of objects to return. Defaults to all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

impl Paging {
    pub fn new(from: usize, count: usize) -> Self {
        Self {
            from: Some(from),
            count: Some(count),
        }
    }

    /// Cut the window out of `items`, returning it with the total size
    pub fn apply<T>(&self, items: Vec<T>) -> (Vec<T>, usize) {
        let total = items.len();
        let from = self.from.unwrap_or(0).min(total);
        let window = items
            .into_iter()
            .skip(from)
            .take(self.count.unwrap_or(usize::MAX))
            .collect();
        (window, total)
    }
}

/// Objects matching a search together with the number of all matches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult<T> {
    pub objects: Vec<T>,
    pub total_count: usize,
}

impl<T> SearchResult<T> {
    pub fn new(objects: Vec<T>, total_count: usize) -> Self {
        Self {
            objects,
            total_count,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paging_returns_everything() {
        let (window, total) = Paging::default().apply(vec![1, 2, 3]);
        assert_eq!(window, vec![1, 2, 3]);
        assert_eq!(total, 3);
    }

    #[test]
    fn test_window() {
        let (window, total) = Paging::new(1, 2).apply(vec![1, 2, 3, 4]);
        assert_eq!(window, vec![2, 3]);
        assert_eq!(total, 4);
    }

    #[test]
    fn test_window_past_the_end() {
        let (window, total) = Paging::new(10, 2).apply(vec![1, 2]);
        assert!(window.is_empty());
        assert_eq!(total, 2);
    }
}
