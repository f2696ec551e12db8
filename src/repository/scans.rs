//! Scans repository for database operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use super::ScansStore;
use crate::{
    error::AppResult,
    models::{
        scan::NewScan,
        student::StudentRow,
        Scan, ScanDetails, Student,
    },
};

#[derive(Clone)]
pub struct ScansRepository {
    pool: Pool<Postgres>,
}

impl ScansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScansStore for ScansRepository {
    async fn append(&self, scan: NewScan) -> AppResult<Scan> {
        let created = sqlx::query_as::<_, Scan>(
            r#"
            INSERT INTO scans (id, student_id, scan_type, scanned_at, device_id, rfid_hex, rfid_decimal)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(scan.student_id)
        .bind(scan.scan_type)
        .bind(scan.scanned_at)
        .bind(&scan.device_id)
        .bind(&scan.rfid_hex)
        .bind(&scan.rfid_decimal)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn latest(&self) -> AppResult<Option<ScanDetails>> {
        let Some(scan) = sqlx::query_as::<_, Scan>(
            "SELECT * FROM scans ORDER BY scanned_at DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let student = sqlx::query_as::<_, StudentRow>("SELECT * FROM students WHERE id = $1")
            .bind(scan.student_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(student.map(|row| ScanDetails {
            scan,
            student: Student::from(row),
        }))
    }

    async fn latest_for_student(
        &self,
        student_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Option<Scan>> {
        let scan = sqlx::query_as::<_, Scan>(
            r#"
            SELECT * FROM scans
            WHERE student_id = $1 AND scanned_at >= $2 AND scanned_at < $3
            ORDER BY scanned_at DESC
            LIMIT 1
            "#,
        )
        .bind(student_id)
        .bind(from)
        .bind(to)
        .fetch_optional(&self.pool)
        .await?;
        Ok(scan)
    }
}
