//! Fines repository for database operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use super::{borrows::load_parties, FinesStore};
use crate::{
    error::{AppError, AppResult},
    models::{Fine, FineDetails},
};

#[derive(Clone)]
pub struct FinesRepository {
    pool: Pool<Postgres>,
}

impl FinesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Attach the student and book of each fine's borrow request
    async fn hydrate(&self, fines: Vec<Fine>) -> AppResult<Vec<FineDetails>> {
        let request_ids: Vec<Uuid> = fines.iter().map(|f| f.borrow_request_id).collect();
        let links = sqlx::query(
            "SELECT id, student_id, book_id FROM borrow_requests WHERE id = ANY($1)",
        )
        .bind(&request_ids)
        .fetch_all(&self.pool)
        .await?;

        let links: std::collections::HashMap<Uuid, (Uuid, Uuid)> = links
            .iter()
            .map(|row| (row.get("id"), (row.get("student_id"), row.get("book_id"))))
            .collect();

        let student_ids: Vec<Uuid> = links.values().map(|(s, _)| *s).collect();
        let book_ids: Vec<Uuid> = links.values().map(|(_, b)| *b).collect();
        let (students, books) = load_parties(&self.pool, &student_ids, &book_ids).await?;

        Ok(fines
            .into_iter()
            .map(|fine| {
                let link = links.get(&fine.borrow_request_id);
                FineDetails {
                    student: link.and_then(|(s, _)| students.get(s).cloned()),
                    book: link.and_then(|(_, b)| books.get(b).cloned()),
                    fine,
                }
            })
            .collect())
    }
}

#[async_trait]
impl FinesStore for FinesRepository {
    async fn upsert(&self, borrow_request_id: Uuid, amount: i64, reason: &str) -> AppResult<Fine> {
        let now = Utc::now();
        let upserted = sqlx::query_as::<_, Fine>(
            r#"
            INSERT INTO fines (id, borrow_request_id, amount, reason, paid, created_at, updated_at)
            VALUES ($1, $2, $3, $4, FALSE, $5, $5)
            ON CONFLICT (borrow_request_id) DO UPDATE
                SET amount = EXCLUDED.amount, reason = EXCLUDED.reason, updated_at = EXCLUDED.updated_at
                WHERE fines.paid = FALSE
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(borrow_request_id)
        .bind(amount)
        .bind(reason)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        match upserted {
            Some(fine) => Ok(fine),
            // Conflict on a paid fine: nothing was written
            None => sqlx::query_as::<_, Fine>("SELECT * FROM fines WHERE borrow_request_id = $1")
                .bind(borrow_request_id)
                .fetch_one(&self.pool)
                .await
                .map_err(Into::into),
        }
    }

    async fn get(&self, id: Uuid) -> AppResult<Fine> {
        sqlx::query_as::<_, Fine>("SELECT * FROM fines WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Fine not found".to_string()))
    }

    async fn list(
        &self,
        paid: Option<bool>,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<FineDetails>> {
        let fines = sqlx::query_as::<_, Fine>(
            r#"
            SELECT * FROM fines
            WHERE ($1::BOOLEAN IS NULL OR paid = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(paid)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        self.hydrate(fines).await
    }

    async fn list_for_student(&self, student_id: Uuid) -> AppResult<Vec<FineDetails>> {
        let fines = sqlx::query_as::<_, Fine>(
            r#"
            SELECT f.* FROM fines f
            JOIN borrow_requests r ON r.id = f.borrow_request_id
            WHERE r.student_id = $1
            ORDER BY f.created_at DESC
            "#,
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;

        self.hydrate(fines).await
    }

    async fn unpaid(&self) -> AppResult<Vec<FineDetails>> {
        let fines = sqlx::query_as::<_, Fine>(
            "SELECT * FROM fines WHERE paid = FALSE ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;

        self.hydrate(fines).await
    }

    async fn mark_paid(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<Fine> {
        let paid = sqlx::query_as::<_, Fine>(
            r#"
            UPDATE fines SET paid = TRUE, paid_at = $2, updated_at = $2
            WHERE id = $1 AND paid = FALSE
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;

        match paid {
            Some(fine) => Ok(fine),
            None => {
                // Distinguish a missing fine from one that was already settled
                self.get(id).await?;
                Err(AppError::Conflict("Fine is already paid".to_string()))
            }
        }
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM fines WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Fine not found".to_string()));
        }
        Ok(())
    }
}
