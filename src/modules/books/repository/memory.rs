use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{new_book_id, BookFilter, BookRepository, SortKey};
use crate::modules::books::models::Book;

/// Process-local backing used by tests and documentation tooling.
#[derive(Debug, Default)]
pub struct InMemoryBookRepository {
    books: RwLock<BTreeMap<String, Book>>,
}

impl InMemoryBookRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

/// ASCII case-insensitive substring test, matching SQLite's `lower()`.
fn contains_ignore_ascii_case(haystack: &str, needle: &str) -> bool {
    haystack
        .to_ascii_lowercase()
        .contains(&needle.to_ascii_lowercase())
}

fn matches(book: &Book, search: Option<&str>) -> bool {
    match search {
        None => true,
        Some(needle) => {
            contains_ignore_ascii_case(&book.title, needle)
                || contains_ignore_ascii_case(&book.author, needle)
        }
    }
}

#[async_trait]
impl BookRepository for InMemoryBookRepository {
    async fn list(&self) -> anyhow::Result<Vec<Book>> {
        Ok(self.books.read().await.values().cloned().collect())
    }

    async fn get_by_id(&self, id: &str) -> anyhow::Result<Option<Book>> {
        Ok(self.books.read().await.get(id).cloned())
    }

    async fn create(&self, title: &str, author: &str) -> anyhow::Result<Book> {
        let book = Book {
            id: new_book_id(),
            title: title.to_string(),
            author: author.to_string(),
        };
        self.books
            .write()
            .await
            .insert(book.id.clone(), book.clone());
        Ok(book)
    }

    async fn update(&self, id: &str, title: &str, author: &str) -> anyhow::Result<bool> {
        let mut books = self.books.write().await;
        match books.get_mut(id) {
            Some(book) => {
                book.title = title.to_string();
                book.author = author.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: &str) -> anyhow::Result<bool> {
        Ok(self.books.write().await.remove(id).is_some())
    }

    async fn query(&self, filter: &BookFilter) -> anyhow::Result<Vec<Book>> {
        let books = self.books.read().await;
        // Map iteration is already id-ordered, so a stable sort keeps ties by id.
        let mut selected: Vec<&Book> = books
            .values()
            .filter(|book| matches(book, filter.search.as_deref()))
            .collect();
        match filter.sort {
            SortKey::Id => {}
            SortKey::Title => selected.sort_by(|a, b| a.title.cmp(&b.title)),
            SortKey::Author => selected.sort_by(|a, b| a.author.cmp(&b.author)),
        }

        Ok(selected
            .into_iter()
            .skip(usize::try_from(filter.offset()).unwrap_or(usize::MAX))
            .take(filter.page_size as usize)
            .cloned()
            .collect())
    }

    async fn count(&self, search: Option<&str>) -> anyhow::Result<u64> {
        let books = self.books.read().await;
        Ok(books.values().filter(|book| matches(book, search)).count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::books::repository::tests::generate_repository_tests;

    generate_repository_tests!(InMemoryBookRepository::new());
}
