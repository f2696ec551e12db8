//! Borrow requests repository for database operations

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Transaction};
use uuid::Uuid;

use super::{BorrowFilter, BorrowsStore};
use crate::{
    error::{AppError, AppResult},
    models::{
        book::BookShort,
        borrow::{CreditDebit, NewBorrowRequest, TransitionEffects},
        student::{StudentRow, StudentShort},
        Book, BorrowRequest, BorrowRequestDetails, BorrowStatus, Student,
    },
};

#[derive(Clone)]
pub struct BorrowsRepository {
    pool: Pool<Postgres>,
}

impl BorrowsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn lock_request(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> AppResult<BorrowRequest> {
        sqlx::query_as::<_, BorrowRequest>("SELECT * FROM borrow_requests WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Borrow request not found".to_string()))
    }

    async fn apply_effects(
        tx: &mut Transaction<'_, Postgres>,
        request: &BorrowRequest,
        effects: TransitionEffects,
    ) -> AppResult<()> {
        if effects.copies_delta != 0 {
            let updated = sqlx::query(
                r#"
                UPDATE books
                SET available_copies = LEAST(total_copies, available_copies + $2),
                    updated_at = NOW()
                WHERE id = $1 AND available_copies + $2 >= 0
                "#,
            )
            .bind(request.book_id)
            .bind(effects.copies_delta)
            .execute(&mut **tx)
            .await?;

            if updated.rows_affected() == 0 {
                return Err(AppError::BusinessRule(
                    "No copies of this book are available".to_string(),
                ));
            }
        }

        if let Some(cap) = effects.credit_refund_cap {
            sqlx::query(
                r#"
                UPDATE students
                SET credits = LEAST($2, credits + 1), version = version + 1, updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(request.student_id)
            .bind(cap)
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }

    async fn hydrate(&self, requests: Vec<BorrowRequest>) -> AppResult<Vec<BorrowRequestDetails>> {
        let student_ids: Vec<Uuid> = requests.iter().map(|r| r.student_id).collect();
        let book_ids: Vec<Uuid> = requests.iter().map(|r| r.book_id).collect();
        let (students, books) = load_parties(&self.pool, &student_ids, &book_ids).await?;

        Ok(requests
            .into_iter()
            .map(|request| BorrowRequestDetails {
                student: students.get(&request.student_id).cloned(),
                book: books.get(&request.book_id).cloned(),
                request,
            })
            .collect())
    }
}

/// Fetch the short forms of the given students and books
pub(crate) async fn load_parties(
    pool: &Pool<Postgres>,
    student_ids: &[Uuid],
    book_ids: &[Uuid],
) -> AppResult<(HashMap<Uuid, StudentShort>, HashMap<Uuid, BookShort>)> {
    let students = sqlx::query_as::<_, StudentRow>("SELECT * FROM students WHERE id = ANY($1)")
        .bind(student_ids)
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(Student::from)
        .map(|s| (s.id, StudentShort::from(&s)))
        .collect();

    let books = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = ANY($1)")
        .bind(book_ids)
        .fetch_all(pool)
        .await?
        .iter()
        .map(|b| (b.id, BookShort::from(b)))
        .collect();

    Ok((students, books))
}

#[async_trait]
impl BorrowsStore for BorrowsRepository {
    async fn create(
        &self,
        request: NewBorrowRequest,
        debit: CreditDebit,
    ) -> AppResult<Option<BorrowRequest>> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let debited = sqlx::query(
            r#"
            UPDATE students
            SET credits = $2, version = version + 1, updated_at = $4
            WHERE id = $1 AND version = $3
            "#,
        )
        .bind(request.student_id)
        .bind(debit.credits_after)
        .bind(debit.expected_version)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if debited.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let created = sqlx::query_as::<_, BorrowRequest>(
            r#"
            INSERT INTO borrow_requests (
                id, student_id, book_id, status, borrowed_date, expected_return_date,
                long_term, remarks, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.student_id)
        .bind(request.book_id)
        .bind(BorrowStatus::Pending)
        .bind(request.borrowed_date)
        .bind(request.expected_return_date)
        .bind(request.long_term)
        .bind(&request.remarks)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(created))
    }

    async fn get(&self, id: Uuid) -> AppResult<BorrowRequest> {
        sqlx::query_as::<_, BorrowRequest>("SELECT * FROM borrow_requests WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Borrow request not found".to_string()))
    }

    async fn get_details(&self, id: Uuid) -> AppResult<BorrowRequestDetails> {
        let request = self.get(id).await?;
        self.hydrate(vec![request])
            .await?
            .pop()
            .ok_or_else(|| AppError::NotFound("Borrow request not found".to_string()))
    }

    async fn list(
        &self,
        filter: BorrowFilter,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<BorrowRequestDetails>> {
        let requests = sqlx::query_as::<_, BorrowRequest>(
            r#"
            SELECT * FROM borrow_requests
            WHERE ($1::TEXT IS NULL OR status = $1)
              AND ($2::UUID IS NULL OR student_id = $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(filter.status)
        .bind(filter.student_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        self.hydrate(requests).await
    }

    async fn find_by_pair(
        &self,
        student_id: Uuid,
        book_id: Uuid,
    ) -> AppResult<Option<BorrowRequest>> {
        let request = sqlx::query_as::<_, BorrowRequest>(
            r#"
            SELECT * FROM borrow_requests
            WHERE student_id = $1 AND book_id = $2
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(student_id)
        .bind(book_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(request)
    }

    async fn transition(
        &self,
        id: Uuid,
        to: BorrowStatus,
        at: DateTime<Utc>,
        effects: TransitionEffects,
    ) -> AppResult<BorrowRequest> {
        let mut tx = self.pool.begin().await?;
        let current = Self::lock_request(&mut tx, id).await?;

        if current.status != BorrowStatus::Pending {
            return Err(AppError::InvalidTransition(format!(
                "Borrow request is already {}",
                current.status
            )));
        }

        Self::apply_effects(&mut tx, &current, effects).await?;

        let (approved_at, rejected_at) = match to {
            BorrowStatus::Approved => (Some(at), None),
            BorrowStatus::Rejected => (None, Some(at)),
            BorrowStatus::Pending => {
                return Err(AppError::InvalidTransition(
                    "Borrow request cannot return to Pending".to_string(),
                ))
            }
        };

        let updated = sqlx::query_as::<_, BorrowRequest>(
            r#"
            UPDATE borrow_requests
            SET status = $2, approved_at = $3, rejected_at = $4, updated_at = $5
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(to)
        .bind(approved_at)
        .bind(rejected_at)
        .bind(at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    async fn mark_returned(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
        effects: TransitionEffects,
    ) -> AppResult<BorrowRequest> {
        let mut tx = self.pool.begin().await?;
        let current = Self::lock_request(&mut tx, id).await?;

        if current.status != BorrowStatus::Approved {
            return Err(AppError::InvalidTransition(format!(
                "Only approved requests can be returned, this one is {}",
                current.status
            )));
        }
        if current.is_returned() {
            return Err(AppError::InvalidTransition(
                "Book has already been returned".to_string(),
            ));
        }

        Self::apply_effects(&mut tx, &current, effects).await?;

        let updated = sqlx::query_as::<_, BorrowRequest>(
            "UPDATE borrow_requests SET return_date = $2, updated_at = $2 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    async fn overdue(
        &self,
        now: DateTime<Utc>,
        approved_only: bool,
    ) -> AppResult<Vec<BorrowRequest>> {
        let requests = sqlx::query_as::<_, BorrowRequest>(
            r#"
            SELECT * FROM borrow_requests
            WHERE return_date IS NULL
              AND expected_return_date IS NOT NULL
              AND expected_return_date < $1
              AND (NOT $2 OR status = 'Approved')
            ORDER BY expected_return_date
            "#,
        )
        .bind(now)
        .bind(approved_only)
        .fetch_all(&self.pool)
        .await?;
        Ok(requests)
    }

    async fn approved_counts(&self) -> AppResult<Vec<(Uuid, i64)>> {
        let counts = sqlx::query_as::<_, (Uuid, i64)>(
            r#"
            SELECT book_id, COUNT(*) FROM borrow_requests
            WHERE status = 'Approved'
            GROUP BY book_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(counts)
    }
}
