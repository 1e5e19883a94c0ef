use serde::{Deserialize, Serialize};

/// 1-based page selection, read from `?index=&size=`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Pagination {
    pub index: u64,
    pub size: u64,
}

const MAX_PAGE_SIZE: u64 = 100;
// bounds `offset()` so it fits an i64 OFFSET
const MAX_PAGE_INDEX: u64 = 1_000_000;

impl Default for Pagination {
    fn default() -> Self {
        Self { index: 1, size: 10 }
    }
}

impl Pagination {
    pub fn offset(&self) -> u64 {
        self.index.saturating_sub(1).saturating_mul(self.size)
    }

    pub fn limit(&self) -> u64 {
        self.size
    }

    /// Falls back to the first page for out-of-range input.
    pub fn check(&self) -> Self {
        if self.index < 1 || self.size < 1 {
            return Self::default();
        }
        Self {
            index: self.index.min(MAX_PAGE_INDEX),
            size: self.size.min(MAX_PAGE_SIZE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_and_offsets() {
        let page = Pagination { index: 3, size: 20 }.check();
        assert_eq!(page.offset(), 40);
        assert_eq!(page.limit(), 20);

        assert_eq!(Pagination { index: 0, size: 5 }.check(), Pagination::default());
        assert_eq!(Pagination { index: 1, size: 5000 }.check().limit(), MAX_PAGE_SIZE);
    }

    #[test]
    fn test_huge_index_does_not_overflow() {
        let page = Pagination { index: u64::MAX, size: 100 }.check();
        assert_eq!(page.index, MAX_PAGE_INDEX);
        assert_eq!(page.offset(), (MAX_PAGE_INDEX - 1) * 100);
        assert!(page.offset() <= i64::MAX as u64);

        // unchecked input saturates instead of wrapping
        assert_eq!(Pagination { index: u64::MAX, size: u64::MAX }.offset(), u64::MAX);
    }
}
