//! Student enrollment and lookup service

use uuid::Uuid;

use crate::{
    config::BorrowingConfig,
    error::{AppError, AppResult},
    models::{
        student::{CreateStudent, Rfid, UpdateStudent, VerifyStudent},
        Pagination, Student,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct StudentsService {
    repository: Repository,
    policy: BorrowingConfig,
}

impl StudentsService {
    pub fn new(repository: Repository, policy: BorrowingConfig) -> Self {
        Self { repository, policy }
    }

    /// Enroll a student with a full credit balance
    pub async fn create(&self, request: CreateStudent) -> AppResult<Student> {
        let new_student = request.into_new_student(self.policy.max_credits)?;
        let student = self.repository.students.create(new_student).await?;
        tracing::info!(student_id = %student.id, prn = %student.prn_number, "Student enrolled");
        Ok(student)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Student> {
        self.repository.students.get(id).await
    }

    pub async fn list(&self, pagination: &Pagination) -> AppResult<Vec<Student>> {
        let (limit, offset) = self
            .policy
            .page_window(pagination.page, pagination.per_page);
        self.repository.students.list(limit, offset).await
    }

    /// Look a student up by PRN (`id`) or by either form of the RFID
    pub async fn verify(&self, request: &VerifyStudent) -> AppResult<Student> {
        let found = if let Some(prn) = request.id.as_deref().filter(|s| !s.trim().is_empty()) {
            self.repository.students.find_by_prn(prn).await?
        } else if let Some(rfid) = request.rfid.as_deref().filter(|s| !s.trim().is_empty()) {
            self.find_by_rfid(rfid).await?
        } else {
            return Err(AppError::Validation(
                "Either id (PRN) or rfid is required".to_string(),
            ));
        };

        found.ok_or_else(|| AppError::NotFound("Student not found".to_string()))
    }

    /// Normalize a raw card read and match it against hex or decimal
    pub async fn find_by_rfid(&self, raw: &str) -> AppResult<Option<Student>> {
        let normalized = Rfid::normalize_hex(raw);
        if normalized.is_empty() {
            return Ok(None);
        }
        self.repository.students.find_by_rfid(&normalized).await
    }

    pub async fn update(&self, id: Uuid, mut update: UpdateStudent) -> AppResult<Student> {
        update.check()?;
        let student = self.repository.students.update(id, &update).await?;
        tracing::info!(student_id = %id, "Student updated");
        Ok(student)
    }

    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.repository.students.delete(id).await?;
        tracing::info!(student_id = %id, "Student deleted");
        Ok(())
    }
}
