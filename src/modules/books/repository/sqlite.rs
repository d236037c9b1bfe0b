use anyhow::Context;
use async_trait::async_trait;
use sqlx::SqlitePool;

use super::{new_book_id, BookFilter, BookRepository, SortKey};
use crate::modules::books::models::Book;

/// Matches when `search` is NULL or is contained in title or author. SQLite's
/// `lower()` only folds ASCII letters.
const SEARCH_CLAUSE: &str = "(?1 IS NULL \
     OR instr(lower(title), lower(?1)) > 0 \
     OR instr(lower(author), lower(?1)) > 0)";

/// Books stored in the relational `books` table.
#[derive(Debug, Clone)]
pub struct SqliteBookRepository {
    pool: SqlitePool,
}

impl SqliteBookRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn order_by(sort: SortKey) -> &'static str {
    match sort {
        SortKey::Id => "id ASC",
        SortKey::Title => "title ASC, id ASC",
        SortKey::Author => "author ASC, id ASC",
    }
}

#[async_trait]
impl BookRepository for SqliteBookRepository {
    async fn list(&self) -> anyhow::Result<Vec<Book>> {
        sqlx::query_as::<_, Book>("SELECT id, title, author FROM books ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .context("failed to list books")
    }

    async fn get_by_id(&self, id: &str) -> anyhow::Result<Option<Book>> {
        sqlx::query_as::<_, Book>("SELECT id, title, author FROM books WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("failed to load book {}", id))
    }

    async fn create(&self, title: &str, author: &str) -> anyhow::Result<Book> {
        let book = Book {
            id: new_book_id(),
            title: title.to_string(),
            author: author.to_string(),
        };
        sqlx::query("INSERT INTO books (id, title, author) VALUES (?, ?, ?)")
            .bind(&book.id)
            .bind(&book.title)
            .bind(&book.author)
            .execute(&self.pool)
            .await
            .context("failed to insert book")?;
        Ok(book)
    }

    async fn update(&self, id: &str, title: &str, author: &str) -> anyhow::Result<bool> {
        let done = sqlx::query("UPDATE books SET title = ?, author = ? WHERE id = ?")
            .bind(title)
            .bind(author)
            .bind(id)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to update book {}", id))?;
        Ok(done.rows_affected() == 1)
    }

    async fn delete(&self, id: &str) -> anyhow::Result<bool> {
        let done = sqlx::query("DELETE FROM books WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to delete book {}", id))?;
        Ok(done.rows_affected() == 1)
    }

    async fn query(&self, filter: &BookFilter) -> anyhow::Result<Vec<Book>> {
        let sql = format!(
            "SELECT id, title, author FROM books WHERE {} ORDER BY {} LIMIT ?2 OFFSET ?3",
            SEARCH_CLAUSE,
            order_by(filter.sort)
        );
        // Offsets past i64::MAX select nothing either way.
        let offset = i64::try_from(filter.offset()).unwrap_or(i64::MAX);
        sqlx::query_as::<_, Book>(&sql)
            .bind(filter.search.as_deref())
            .bind(i64::from(filter.page_size))
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .context("failed to query books")
    }

    async fn count(&self, search: Option<&str>) -> anyhow::Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM books WHERE {}", SEARCH_CLAUSE);
        let (count,): (i64,) = sqlx::query_as(&sql)
            .bind(search)
            .fetch_one(&self.pool)
            .await
            .context("failed to count books")?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}
