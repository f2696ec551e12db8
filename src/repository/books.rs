//! Books repository for database operations

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use super::{map_unique_violation, BooksStore};
use crate::{
    error::{AppError, AppResult},
    models::{
        book::{format_book_code, NewBook},
        Book,
    },
};

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BooksStore for BooksRepository {
    async fn create(&self, book: NewBook) -> AppResult<Book> {
        let mut tx = self.pool.begin().await?;

        // Row lock on the prefix serializes concurrent creations
        let seq: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO book_id_sequences (prefix, last_value)
            VALUES ($1, 1)
            ON CONFLICT (prefix) DO UPDATE SET last_value = book_id_sequences.last_value + 1
            RETURNING last_value
            "#,
        )
        .bind(&book.prefix)
        .fetch_one(&mut *tx)
        .await?;

        let now = Utc::now();
        let created = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (
                id, book_id, title, author, publisher, isbn, section, genre, language,
                publication_year, cover_image, description, status, total_copies,
                available_copies, rack, shelf, tags, rating_average, rating_count,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, 0, 0, $19, $19)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(format_book_code(&book.prefix, seq))
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.publisher)
        .bind(&book.isbn)
        .bind(&book.section)
        .bind(&book.genre)
        .bind(&book.language)
        .bind(book.publication_year)
        .bind(&book.cover_image)
        .bind(&book.description)
        .bind(book.status)
        .bind(book.total_copies)
        .bind(book.available_copies)
        .bind(&book.rack)
        .bind(&book.shelf)
        .bind(&book.tags)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_unique_violation(e, "Book identifier"))?;

        tx.commit().await?;
        Ok(created)
    }

    async fn get(&self, id: Uuid) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Book not found".to_string()))
    }

    async fn find_by_code(&self, book_id: &str) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE book_id = $1")
            .bind(book_id.trim().to_uppercase())
            .fetch_optional(&self.pool)
            .await?;
        Ok(book)
    }

    async fn list(&self, limit: i64, offset: i64) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(
            "SELECT * FROM books ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(books)
    }

    async fn list_all(&self) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>("SELECT * FROM books ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;
        Ok(books)
    }

    async fn search(&self, query: &str, limit: i64) -> AppResult<Vec<Book>> {
        let pattern = format!(
            "%{}%",
            query
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_")
        );
        let books = sqlx::query_as::<_, Book>(
            r#"
            SELECT * FROM books
            WHERE title ILIKE $1 OR author ILIKE $1 OR isbn ILIKE $1 OR publisher ILIKE $1
            ORDER BY title
            LIMIT $2
            "#,
        )
        .bind(pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(books)
    }

    async fn save(&self, book: &Book) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(
            r#"
            UPDATE books SET
                title = $2, author = $3, publisher = $4, isbn = $5, genre = $6,
                language = $7, publication_year = $8, cover_image = $9, description = $10,
                status = $11, total_copies = $12, available_copies = $13, rack = $14,
                shelf = $15, tags = $16, updated_at = $17
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(book.id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.publisher)
        .bind(&book.isbn)
        .bind(&book.genre)
        .bind(&book.language)
        .bind(book.publication_year)
        .bind(&book.cover_image)
        .bind(&book.description)
        .bind(book.status)
        .bind(book.total_copies)
        .bind(book.available_copies)
        .bind(&book.rack)
        .bind(&book.shelf)
        .bind(&book.tags)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Book not found".to_string()))
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Book not found".to_string()));
        }
        Ok(())
    }
}
