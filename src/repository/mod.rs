//! Repository layer for data store operations
//!
//! Every store is a trait so the services run unchanged against PostgreSQL
//! or the in-memory backend.

pub mod books;
pub mod borrows;
pub mod fines;
pub mod memory;
pub mod scans;
pub mod sections;
pub mod students;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        book::NewBook,
        borrow::{CreditDebit, NewBorrowRequest, TransitionEffects},
        scan::NewScan,
        student::{NewStudent, UpdateStudent},
        Book, BorrowRequest, BorrowRequestDetails, BorrowStatus, Fine, FineDetails, Scan,
        ScanDetails, Section, Student,
    },
};

#[async_trait]
pub trait StudentsStore: Send + Sync {
    /// Insert a student. Duplicate PRN, email or RFID is a `Conflict`.
    async fn create(&self, student: NewStudent) -> AppResult<Student>;
    async fn get(&self, id: Uuid) -> AppResult<Student>;
    async fn find_by_prn(&self, prn: &str) -> AppResult<Option<Student>>;
    /// Match against either the hex or the decimal form
    async fn find_by_rfid(&self, rfid: &str) -> AppResult<Option<Student>>;
    async fn list(&self, limit: i64, offset: i64) -> AppResult<Vec<Student>>;
    async fn update(&self, id: Uuid, update: &UpdateStudent) -> AppResult<Student>;
    async fn delete(&self, id: Uuid) -> AppResult<()>;
}

#[async_trait]
pub trait BooksStore: Send + Sync {
    /// Insert a book, drawing the next identifier for its prefix in the same unit of work
    async fn create(&self, book: NewBook) -> AppResult<Book>;
    async fn get(&self, id: Uuid) -> AppResult<Book>;
    async fn find_by_code(&self, book_id: &str) -> AppResult<Option<Book>>;
    /// Newest first
    async fn list(&self, limit: i64, offset: i64) -> AppResult<Vec<Book>>;
    async fn list_all(&self) -> AppResult<Vec<Book>>;
    /// Case-insensitive substring search over title, author, ISBN and publisher
    async fn search(&self, query: &str, limit: i64) -> AppResult<Vec<Book>>;
    /// Persist the mutable fields of `book`
    async fn save(&self, book: &Book) -> AppResult<Book>;
    async fn delete(&self, id: Uuid) -> AppResult<()>;
}

/// Borrow request listing filter
#[derive(Debug, Clone, Copy, Default)]
pub struct BorrowFilter {
    pub status: Option<BorrowStatus>,
    pub student_id: Option<Uuid>,
}

#[async_trait]
pub trait BorrowsStore: Send + Sync {
    /// Insert a request and debit the student in one unit of work.
    /// Returns `None` without writing anything when the student's version moved.
    async fn create(
        &self,
        request: NewBorrowRequest,
        debit: CreditDebit,
    ) -> AppResult<Option<BorrowRequest>>;
    async fn get(&self, id: Uuid) -> AppResult<BorrowRequest>;
    async fn get_details(&self, id: Uuid) -> AppResult<BorrowRequestDetails>;
    /// Newest first
    async fn list(
        &self,
        filter: BorrowFilter,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<BorrowRequestDetails>>;
    /// Most recent request linking the pair
    async fn find_by_pair(&self, student_id: Uuid, book_id: Uuid)
        -> AppResult<Option<BorrowRequest>>;
    /// Move a Pending request to `to`, stamping `at` and applying `effects` atomically.
    /// Any other current status is an `InvalidTransition`.
    async fn transition(
        &self,
        id: Uuid,
        to: BorrowStatus,
        at: DateTime<Utc>,
        effects: TransitionEffects,
    ) -> AppResult<BorrowRequest>;
    /// Stamp the return date of an Approved, unreturned request and apply `effects`
    async fn mark_returned(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
        effects: TransitionEffects,
    ) -> AppResult<BorrowRequest>;
    /// Unreturned requests whose expected return date is before `now`
    async fn overdue(&self, now: DateTime<Utc>, approved_only: bool)
        -> AppResult<Vec<BorrowRequest>>;
    /// Number of Approved requests per book
    async fn approved_counts(&self) -> AppResult<Vec<(Uuid, i64)>>;
}

#[async_trait]
pub trait FinesStore: Send + Sync {
    /// Create or refresh the fine of a borrow request. A paid fine is returned untouched.
    async fn upsert(&self, borrow_request_id: Uuid, amount: i64, reason: &str) -> AppResult<Fine>;
    async fn get(&self, id: Uuid) -> AppResult<Fine>;
    async fn list(&self, paid: Option<bool>, limit: i64, offset: i64)
        -> AppResult<Vec<FineDetails>>;
    async fn list_for_student(&self, student_id: Uuid) -> AppResult<Vec<FineDetails>>;
    async fn unpaid(&self) -> AppResult<Vec<FineDetails>>;
    /// Already paid is a `Conflict`
    async fn mark_paid(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<Fine>;
    async fn delete(&self, id: Uuid) -> AppResult<()>;
}

#[async_trait]
pub trait ScansStore: Send + Sync {
    async fn append(&self, scan: NewScan) -> AppResult<Scan>;
    async fn latest(&self) -> AppResult<Option<ScanDetails>>;
    /// Latest scan of a student within `[from, to)`
    async fn latest_for_student(
        &self,
        student_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Option<Scan>>;
}

#[async_trait]
pub trait SectionsStore: Send + Sync {
    /// Upsert the section and add one visit
    async fn increment_visits(&self, section_name: &str) -> AppResult<Section>;
    /// Upsert the section and add one bought book
    async fn increment_books_bought(&self, section_name: &str) -> AppResult<Section>;
    async fn list(&self) -> AppResult<Vec<Section>>;
}

/// Main repository struct holding the store implementations
#[derive(Clone)]
pub struct Repository {
    pub pool: Option<Pool<Postgres>>,
    pub students: Arc<dyn StudentsStore>,
    pub books: Arc<dyn BooksStore>,
    pub borrows: Arc<dyn BorrowsStore>,
    pub fines: Arc<dyn FinesStore>,
    pub scans: Arc<dyn ScansStore>,
    pub sections: Arc<dyn SectionsStore>,
}

impl Repository {
    /// Create a repository backed by the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            students: Arc::new(students::StudentsRepository::new(pool.clone())),
            books: Arc::new(books::BooksRepository::new(pool.clone())),
            borrows: Arc::new(borrows::BorrowsRepository::new(pool.clone())),
            fines: Arc::new(fines::FinesRepository::new(pool.clone())),
            scans: Arc::new(scans::ScansRepository::new(pool.clone())),
            sections: Arc::new(sections::SectionsRepository::new(pool.clone())),
            pool: Some(pool),
        }
    }

    /// Create a repository whose stores share one in-memory state
    pub fn in_memory() -> Self {
        let store = Arc::new(memory::MemoryStore::default());
        Self {
            pool: None,
            students: store.clone(),
            books: store.clone(),
            borrows: store.clone(),
            fines: store.clone(),
            scans: store.clone(),
            sections: store,
        }
    }

    /// Check that the backing store answers
    pub async fn ping(&self) -> AppResult<()> {
        if let Some(pool) = &self.pool {
            sqlx::query("SELECT 1").execute(pool).await?;
        }
        Ok(())
    }
}

/// Map unique-constraint violations to a `Conflict` naming what collided
pub(crate) fn map_unique_violation(err: sqlx::Error, what: &str) -> crate::error::AppError {
    match &err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
            crate::error::AppError::Conflict(format!("{} already exists", what))
        }
        _ => err.into(),
    }
}
