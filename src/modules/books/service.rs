use std::sync::Arc;

use bookstore_http::AppError;

use super::models::{Book, BookQuery};
use super::repository::{BookFilter, BookRepository};

/// Orchestrates book operations on top of a [`BookRepository`], turning
/// absence into `404` errors.
#[derive(Clone)]
pub struct BookService {
    repo: Arc<dyn BookRepository>,
}

impl BookService {
    pub fn new(repo: Arc<dyn BookRepository>) -> Self {
        Self { repo }
    }

    pub async fn list(&self) -> Result<Vec<Book>, AppError> {
        Ok(self.repo.list().await?)
    }

    pub async fn get(&self, id: &str) -> Result<Book, AppError> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| not_found(id))
    }

    pub async fn create(&self, title: &str, author: &str) -> Result<Book, AppError> {
        let book = self.repo.create(title, author).await?;
        tracing::info!(book_id = %book.id, "book created");
        Ok(book)
    }

    pub async fn update(&self, id: &str, title: &str, author: &str) -> Result<(), AppError> {
        if !self.repo.update(id, title, author).await? {
            return Err(not_found(id));
        }
        tracing::info!(book_id = %id, "book updated");
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<(), AppError> {
        if !self.repo.delete(id).await? {
            return Err(not_found(id));
        }
        tracing::info!(book_id = %id, "book deleted");
        Ok(())
    }

    /// One page of matching books plus the size of the whole matching set.
    pub async fn query(&self, query: &BookQuery) -> Result<(Vec<Book>, u64), AppError> {
        let filter = BookFilter::new(
            query.search.as_deref(),
            query.sort_by.as_deref(),
            query.page,
            query.page_size,
        );
        let books = self.repo.query(&filter).await?;
        let total = self.repo.count(filter.search.as_deref()).await?;
        Ok((books, total))
    }
}

fn not_found(id: &str) -> AppError {
    AppError::not_found(format!("book '{}' not found", id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::books::repository::InMemoryBookRepository;
    use axum::http::StatusCode;

    fn service() -> BookService {
        BookService::new(Arc::new(InMemoryBookRepository::new()))
    }

    #[tokio::test]
    async fn missing_books_are_not_found() {
        let service = service();
        assert_eq!(service.get("nope").await.unwrap_err().status(), StatusCode::NOT_FOUND);
        assert_eq!(
            service.update("nope", "t", "a").await.unwrap_err().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(service.delete("nope").await.unwrap_err().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn query_reports_total_across_pages() {
        let service = service();
        for i in 0..7 {
            service.create(&format!("Book {}", i), "Anon").await.unwrap();
        }
        let query = BookQuery {
            page: Some(2),
            page_size: Some(5),
            ..Default::default()
        };
        let (books, total) = service.query(&query).await.unwrap();
        assert_eq!(books.len(), 2);
        assert_eq!(total, 7);
    }
}
