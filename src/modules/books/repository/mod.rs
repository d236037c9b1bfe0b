//! Persistence gateway for books.

use async_trait::async_trait;

use super::models::Book;

mod memory;
mod sqlite;
#[cfg(test)]
mod tests;

pub use memory::InMemoryBookRepository;
pub use sqlite::SqliteBookRepository;

/// Default page size when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Ordering applied by [`BookRepository::query`]. Ties are always broken by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Id,
    Title,
    Author,
}

impl SortKey {
    /// `title` and `author` (any case) select those columns; anything else
    /// orders by id.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("title") => SortKey::Title,
            Some(v) if v.eq_ignore_ascii_case("author") => SortKey::Author,
            _ => SortKey::Id,
        }
    }
}

/// A normalized search/sort/page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookFilter {
    pub search: Option<String>,
    pub sort: SortKey,
    /// 1-based page number, never zero
    pub page: u32,
    /// Never zero
    pub page_size: u32,
}

impl BookFilter {
    /// Build a filter, treating blank searches as absent and clamping
    /// non-positive paging values to 1.
    pub fn new(
        search: Option<&str>,
        sort_by: Option<&str>,
        page: Option<i64>,
        page_size: Option<i64>,
    ) -> Self {
        Self {
            search: search
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            sort: SortKey::parse(sort_by),
            page: clamp_positive(page.unwrap_or(1)),
            page_size: clamp_positive(page_size.unwrap_or(i64::from(DEFAULT_PAGE_SIZE))),
        }
    }

    /// Number of records skipped before the page starts.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }
}

impl Default for BookFilter {
    fn default() -> Self {
        Self::new(None, None, None, None)
    }
}

fn clamp_positive(value: i64) -> u32 {
    value.clamp(1, i64::from(u32::MAX)) as u32
}

/// Storage operations the books module needs. Absence is reported through
/// `Option`/`bool`; errors are reserved for store failures.
#[async_trait]
pub trait BookRepository: Send + Sync {
    /// All books, ordered by id.
    async fn list(&self) -> anyhow::Result<Vec<Book>>;

    async fn get_by_id(&self, id: &str) -> anyhow::Result<Option<Book>>;

    /// Store a new book under a freshly generated id.
    async fn create(&self, title: &str, author: &str) -> anyhow::Result<Book>;

    /// Replace title and author; `false` if no book has `id`.
    async fn update(&self, id: &str, title: &str, author: &str) -> anyhow::Result<bool>;

    /// `false` if no book has `id`.
    async fn delete(&self, id: &str) -> anyhow::Result<bool>;

    /// One page of the filtered, sorted result set.
    async fn query(&self, filter: &BookFilter) -> anyhow::Result<Vec<Book>>;

    /// Size of the result set matching `search`, across all pages.
    async fn count(&self, search: Option<&str>) -> anyhow::Result<u64>;
}

pub(crate) fn new_book_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

#[cfg(test)]
mod filter_tests {
    use super::*;

    #[test]
    fn defaults_are_first_page_of_ten() {
        let filter = BookFilter::default();
        assert_eq!(filter.page, 1);
        assert_eq!(filter.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(filter.sort, SortKey::Id);
        assert_eq!(filter.offset(), 0);
    }

    #[test]
    fn non_positive_paging_is_clamped_to_one() {
        let filter = BookFilter::new(None, None, Some(0), Some(-3));
        assert_eq!(filter.page, 1);
        assert_eq!(filter.page_size, 1);
    }

    #[test]
    fn offset_skips_previous_pages() {
        let filter = BookFilter::new(None, None, Some(3), Some(20));
        assert_eq!(filter.offset(), 40);
    }

    #[test]
    fn blank_search_is_ignored() {
        assert_eq!(BookFilter::new(Some("  "), None, None, None).search, None);
        assert_eq!(
            BookFilter::new(Some(" Orwell "), None, None, None).search.as_deref(),
            Some("Orwell")
        );
    }

    #[test]
    fn unknown_sort_keys_fall_back_to_id() {
        assert_eq!(SortKey::parse(Some("Title")), SortKey::Title);
        assert_eq!(SortKey::parse(Some("author")), SortKey::Author);
        assert_eq!(SortKey::parse(Some("price")), SortKey::Id);
        assert_eq!(SortKey::parse(None), SortKey::Id);
    }
}
