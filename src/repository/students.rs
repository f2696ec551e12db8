//! Students repository for database operations

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use super::StudentsStore;
use crate::{
    error::{AppError, AppResult},
    models::{
        student::{NewStudent, StudentRow, UpdateStudent},
        Student,
    },
};

#[derive(Clone)]
pub struct StudentsRepository {
    pool: Pool<Postgres>,
}

impl StudentsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

/// Name the colliding field from the violated unique constraint
fn duplicate_student(err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some("23505") {
            let field = match db.constraint() {
                Some(c) if c.contains("prn") => "PRN number",
                Some(c) if c.contains("email") => "Email",
                Some(c) if c.contains("rfid") => "RFID",
                _ => "Student",
            };
            return AppError::Conflict(format!("{} already registered", field));
        }
    }
    err.into()
}

#[async_trait]
impl StudentsStore for StudentsRepository {
    async fn create(&self, student: NewStudent) -> AppResult<Student> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, StudentRow>(
            r#"
            INSERT INTO students (
                id, prn_number, name, class, section, roll_no, gender, contact_number,
                email, photo, rfid_hex, rfid_decimal, is_active, credits, version,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, TRUE, $13, 0, $14, $14)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&student.prn_number)
        .bind(&student.name)
        .bind(&student.class)
        .bind(&student.section)
        .bind(student.roll_no)
        .bind(student.gender)
        .bind(&student.contact_number)
        .bind(&student.email)
        .bind(&student.photo)
        .bind(&student.rfid.hex)
        .bind(&student.rfid.decimal)
        .bind(student.credits)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(duplicate_student)?;

        Ok(row.into())
    }

    async fn get(&self, id: Uuid) -> AppResult<Student> {
        sqlx::query_as::<_, StudentRow>("SELECT * FROM students WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Student::from)
            .ok_or_else(|| AppError::NotFound("Student not found".to_string()))
    }

    async fn find_by_prn(&self, prn: &str) -> AppResult<Option<Student>> {
        let row = sqlx::query_as::<_, StudentRow>("SELECT * FROM students WHERE prn_number = $1")
            .bind(prn.trim().to_uppercase())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Student::from))
    }

    async fn find_by_rfid(&self, rfid: &str) -> AppResult<Option<Student>> {
        let row = sqlx::query_as::<_, StudentRow>(
            "SELECT * FROM students WHERE rfid_hex = $1 OR rfid_decimal = $1 LIMIT 1",
        )
        .bind(rfid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Student::from))
    }

    async fn list(&self, limit: i64, offset: i64) -> AppResult<Vec<Student>> {
        let rows = sqlx::query_as::<_, StudentRow>(
            "SELECT * FROM students ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Student::from).collect())
    }

    async fn update(&self, id: Uuid, update: &UpdateStudent) -> AppResult<Student> {
        sqlx::query_as::<_, StudentRow>(
            r#"
            UPDATE students SET
                name = COALESCE($2, name),
                class = COALESCE($3, class),
                section = COALESCE($4, section),
                roll_no = COALESCE($5, roll_no),
                gender = COALESCE($6, gender),
                contact_number = COALESCE($7, contact_number),
                email = COALESCE($8, email),
                photo = COALESCE($9, photo),
                is_active = COALESCE($10, is_active),
                updated_at = $11
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&update.name)
        .bind(&update.class)
        .bind(&update.section)
        .bind(update.roll_no)
        .bind(update.gender)
        .bind(&update.contact_number)
        .bind(&update.email)
        .bind(&update.photo)
        .bind(update.is_active)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(duplicate_student)?
        .map(Student::from)
        .ok_or_else(|| AppError::NotFound("Student not found".to_string()))
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM students WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Student not found".to_string()));
        }
        Ok(())
    }
}
