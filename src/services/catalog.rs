//! Catalog service for book management

use uuid::Uuid;

use crate::{
    config::BorrowingConfig,
    error::{AppError, AppResult},
    models::{
        book::{CreateBook, UpdateBook},
        Book, Pagination,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
    policy: BorrowingConfig,
}

impl CatalogService {
    pub fn new(repository: Repository, policy: BorrowingConfig) -> Self {
        Self { repository, policy }
    }

    /// Create a book; its identifier is drawn from the section's sequence
    pub async fn create_book(&self, request: CreateBook) -> AppResult<Book> {
        let new_book = request.into_new_book()?;
        let book = self.repository.books.create(new_book).await?;
        tracing::info!(book_id = %book.book_id, "Book created");
        Ok(book)
    }

    /// Resolve a book by internal UUID or by its generated identifier
    pub async fn get_book(&self, key: &str) -> AppResult<Book> {
        match Uuid::parse_str(key) {
            Ok(id) => self.repository.books.get(id).await,
            Err(_) => self
                .repository
                .books
                .find_by_code(key)
                .await?
                .ok_or_else(|| AppError::NotFound("Book not found".to_string())),
        }
    }

    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Book> {
        self.repository.books.get(id).await
    }

    pub async fn list_books(&self, pagination: &Pagination) -> AppResult<Vec<Book>> {
        let (limit, offset) = self
            .policy
            .page_window(pagination.page, pagination.per_page);
        self.repository.books.list(limit, offset).await
    }

    pub async fn search(&self, query: &str, limit: i64) -> AppResult<Vec<Book>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        self.repository.books.search(query, limit).await
    }

    pub async fn update_book(&self, key: &str, update: UpdateBook) -> AppResult<Book> {
        update.check()?;
        let mut book = self.get_book(key).await?;
        update.apply(&mut book)?;
        let saved = self.repository.books.save(&book).await?;
        tracing::info!(book_id = %saved.book_id, "Book updated");
        Ok(saved)
    }

    pub async fn delete_book(&self, key: &str) -> AppResult<Book> {
        let book = self.get_book(key).await?;
        self.repository.books.delete(book.id).await?;
        tracing::info!(book_id = %book.book_id, "Book deleted");
        Ok(book)
    }
}
