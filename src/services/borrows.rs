//! Borrow request lifecycle service
//!
//! `Pending --approve--> Approved`, `Pending --reject--> Rejected`. Both targets
//! are terminal; a returned loan keeps `Approved` and gains a `return_date`.

use chrono::Utc;
use uuid::Uuid;

use crate::{
    config::BorrowingConfig,
    error::{AppError, AppResult},
    models::{
        borrow::{
            BorrowQuery, CreateBorrowRequest, CreditDebit, NewBorrowRequest, TransitionEffects,
            VerifyOutcome,
        },
        BorrowRequest, BorrowRequestDetails, BorrowStatus, Student,
    },
    repository::{BorrowFilter, Repository},
};

#[derive(Clone)]
pub struct BorrowsService {
    repository: Repository,
    policy: BorrowingConfig,
}

impl BorrowsService {
    pub fn new(repository: Repository, policy: BorrowingConfig) -> Self {
        Self { repository, policy }
    }

    /// Create a Pending request and debit one credit from the student.
    ///
    /// Nothing is written when validation fails. The debit is a compare-and-swap
    /// on the student's version, retried a bounded number of times.
    pub async fn create_request(&self, request: CreateBorrowRequest) -> AppResult<BorrowRequest> {
        if !request.long_term && request.expected_return_date.is_none() {
            return Err(AppError::Validation(
                "Expected return date is required for short-term borrows".to_string(),
            ));
        }

        // Existence check; the returned book itself is not needed
        self.repository.books.get(request.book_id).await?;

        let new_request = NewBorrowRequest {
            student_id: request.student_id,
            book_id: request.book_id,
            long_term: request.long_term,
            expected_return_date: request.expected_return_date,
            remarks: request.remarks.unwrap_or_default(),
            borrowed_date: Utc::now(),
        };

        let attempts = self.policy.max_update_retries.max(1);
        for attempt in 1..=attempts {
            let student = self.repository.students.get(request.student_id).await?;
            if student.credits <= 0 && !self.policy.allow_negative_credits {
                return Err(AppError::BusinessRule(
                    "Student has no borrow credits left".to_string(),
                ));
            }

            let debit = CreditDebit {
                expected_version: student.version,
                credits_after: student.credits - 1,
            };

            if let Some(created) = self
                .repository
                .borrows
                .create(new_request.clone(), debit)
                .await?
            {
                tracing::info!(
                    request_id = %created.id,
                    student_id = %created.student_id,
                    credits = debit.credits_after,
                    "Borrow request created"
                );
                return Ok(created);
            }

            tracing::warn!(
                student_id = %request.student_id,
                attempt,
                "Student credits changed concurrently, retrying"
            );
        }

        Err(AppError::Conflict(
            "Student record was modified concurrently, please retry".to_string(),
        ))
    }

    /// Approve a Pending request
    pub async fn approve(&self, id: Uuid) -> AppResult<BorrowRequestDetails> {
        let effects = TransitionEffects {
            copies_delta: if self.policy.decrement_copies_on_approval { -1 } else { 0 },
            credit_refund_cap: None,
        };
        self.transition(id, BorrowStatus::Approved, effects).await
    }

    /// Reject a Pending request
    pub async fn reject(&self, id: Uuid) -> AppResult<BorrowRequestDetails> {
        let effects = TransitionEffects {
            copies_delta: 0,
            credit_refund_cap: self
                .policy
                .restore_credit_on_reject
                .then_some(self.policy.max_credits),
        };
        self.transition(id, BorrowStatus::Rejected, effects).await
    }

    async fn transition(
        &self,
        id: Uuid,
        to: BorrowStatus,
        effects: TransitionEffects,
    ) -> AppResult<BorrowRequestDetails> {
        let updated = self
            .repository
            .borrows
            .transition(id, to, Utc::now(), effects)
            .await?;
        tracing::info!(request_id = %id, status = %updated.status, "Borrow request transitioned");
        self.repository.borrows.get_details(id).await
    }

    /// Record that the book of an Approved request came back
    pub async fn mark_returned(&self, id: Uuid) -> AppResult<BorrowRequestDetails> {
        let effects = TransitionEffects {
            copies_delta: if self.policy.decrement_copies_on_approval { 1 } else { 0 },
            credit_refund_cap: self
                .policy
                .restore_credit_on_return
                .then_some(self.policy.max_credits),
        };
        self.repository
            .borrows
            .mark_returned(id, Utc::now(), effects)
            .await?;
        tracing::info!(request_id = %id, "Borrowed book returned");
        self.repository.borrows.get_details(id).await
    }

    /// Approval state of the latest request linking a student and a book
    pub async fn verify(&self, student_id: Uuid, book_id: Uuid) -> AppResult<VerifyOutcome> {
        // Name the missing side before looking for the pair
        self.repository.students.get(student_id).await?;
        self.repository.books.get(book_id).await?;

        let request = self
            .repository
            .borrows
            .find_by_pair(student_id, book_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound("No borrow request found for this student and book".to_string())
            })?;
        Ok(VerifyOutcome::from_request(request))
    }

    pub async fn get(&self, id: Uuid) -> AppResult<BorrowRequestDetails> {
        self.repository.borrows.get_details(id).await
    }

    /// Filtered listing, newest first
    pub async fn list(&self, query: &BorrowQuery) -> AppResult<Vec<BorrowRequestDetails>> {
        let (limit, offset) = self.policy.page_window(query.page, query.per_page);
        let filter = BorrowFilter {
            status: query.status,
            student_id: query.student_id,
        };
        self.repository.borrows.list(filter, limit, offset).await
    }

    /// Every request, newest first
    pub async fn list_all(&self) -> AppResult<Vec<BorrowRequestDetails>> {
        self.collect(BorrowFilter::default()).await
    }

    /// A student's profile and all of their requests, newest first
    pub async fn list_for_student(
        &self,
        student_id: Uuid,
    ) -> AppResult<(Student, Vec<BorrowRequestDetails>)> {
        let student = self.repository.students.get(student_id).await?;
        let requests = self
            .collect(BorrowFilter {
                status: None,
                student_id: Some(student_id),
            })
            .await?;
        Ok((student, requests))
    }

    /// Read the store page by page until a short page ends the listing
    async fn collect(&self, filter: BorrowFilter) -> AppResult<Vec<BorrowRequestDetails>> {
        let limit = self.policy.max_page_size.max(1);
        let mut all = Vec::new();
        loop {
            let batch = self
                .repository
                .borrows
                .list(filter, limit, all.len() as i64)
                .await?;
            let done = (batch.len() as i64) < limit;
            all.extend(batch);
            if done {
                return Ok(all);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        book::CreateBook,
        student::{CreateStudent, RfidInput},
        Gender,
    };
    use chrono::Duration;

    struct Fixture {
        service: BorrowsService,
        repository: Repository,
        student: Student,
        book_id: Uuid,
    }

    async fn fixture(policy: BorrowingConfig) -> Fixture {
        let repository = Repository::in_memory();
        let student = repository
            .students
            .create(
                CreateStudent {
                    prn_number: "UG21CS001".into(),
                    name: "Asha Patil".into(),
                    class: "TY".into(),
                    section: "A".into(),
                    roll_no: None,
                    gender: Gender::Female,
                    contact_number: "9876543210".into(),
                    email: "asha@example.com".into(),
                    photo: None,
                    rfid: RfidInput {
                        hex: Some("1A2B3C4D".into()),
                        decimal: None,
                    },
                }
                .into_new_student(policy.max_credits)
                .unwrap(),
            )
            .await
            .unwrap();
        let book = repository
            .books
            .create(
                CreateBook {
                    title: "A History of India".into(),
                    author: "Romila Thapar".into(),
                    publisher: None,
                    isbn: "9780140138351".into(),
                    section: "History".into(),
                    genre: None,
                    language: None,
                    publication_year: None,
                    cover_image: None,
                    description: None,
                    status: None,
                    total_copies: Some(1),
                    available_copies: None,
                    rack: None,
                    shelf: None,
                    tags: vec![],
                }
                .into_new_book()
                .unwrap(),
            )
            .await
            .unwrap();

        Fixture {
            service: BorrowsService::new(repository.clone(), policy),
            repository,
            student,
            book_id: book.id,
        }
    }

    fn short_term(f: &Fixture) -> CreateBorrowRequest {
        CreateBorrowRequest {
            student_id: f.student.id,
            book_id: f.book_id,
            long_term: false,
            expected_return_date: Some(Utc::now() + Duration::days(1)),
            remarks: None,
        }
    }

    #[tokio::test]
    async fn missing_return_date_writes_nothing() {
        let f = fixture(BorrowingConfig::default()).await;
        let mut request = short_term(&f);
        request.expected_return_date = None;

        let err = f.service.create_request(request).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let student = f.repository.students.get(f.student.id).await.unwrap();
        assert_eq!(student.credits, 6);
        assert!(f.service.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn credits_floor_at_zero_by_default() {
        let f = fixture(BorrowingConfig {
            max_credits: 1,
            ..BorrowingConfig::default()
        })
        .await;

        f.service.create_request(short_term(&f)).await.unwrap();
        let err = f.service.create_request(short_term(&f)).await.unwrap_err();
        assert!(matches!(err, AppError::BusinessRule(_)));
    }

    #[tokio::test]
    async fn negative_credits_when_allowed() {
        let f = fixture(BorrowingConfig {
            max_credits: 1,
            allow_negative_credits: true,
            ..BorrowingConfig::default()
        })
        .await;

        f.service.create_request(short_term(&f)).await.unwrap();
        f.service.create_request(short_term(&f)).await.unwrap();
        let student = f.repository.students.get(f.student.id).await.unwrap();
        assert_eq!(student.credits, -1);
    }

    #[tokio::test]
    async fn second_approval_is_rejected() {
        let f = fixture(BorrowingConfig::default()).await;
        let created = f.service.create_request(short_term(&f)).await.unwrap();

        let approved = f.service.approve(created.id).await.unwrap();
        let stamped = approved.request.approved_at;
        assert!(stamped.is_some());

        let err = f.service.approve(created.id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
        let err = f.service.reject(created.id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));

        let current = f.service.get(created.id).await.unwrap();
        assert_eq!(current.request.approved_at, stamped);
    }

    #[tokio::test]
    async fn copies_follow_approval_and_return_when_enabled() {
        let f = fixture(BorrowingConfig {
            decrement_copies_on_approval: true,
            restore_credit_on_return: true,
            ..BorrowingConfig::default()
        })
        .await;
        let created = f.service.create_request(short_term(&f)).await.unwrap();

        f.service.approve(created.id).await.unwrap();
        let book = f.repository.books.get(f.book_id).await.unwrap();
        assert_eq!(book.available_copies, 0);

        let second = f.service.create_request(short_term(&f)).await.unwrap();
        let err = f.service.approve(second.id).await.unwrap_err();
        assert!(matches!(err, AppError::BusinessRule(_)));

        let returned = f.service.mark_returned(created.id).await.unwrap();
        assert!(returned.request.return_date.is_some());
        assert_eq!(returned.request.status, BorrowStatus::Approved);

        let book = f.repository.books.get(f.book_id).await.unwrap();
        assert_eq!(book.available_copies, 1);
        let student = f.repository.students.get(f.student.id).await.unwrap();
        assert_eq!(student.credits, 5);

        let err = f.service.mark_returned(created.id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn default_policy_leaves_counters_alone() {
        let f = fixture(BorrowingConfig::default()).await;
        let first = f.service.create_request(short_term(&f)).await.unwrap();
        let second = f.service.create_request(short_term(&f)).await.unwrap();

        f.service.approve(first.id).await.unwrap();
        f.service.reject(second.id).await.unwrap();

        let book = f.repository.books.get(f.book_id).await.unwrap();
        assert_eq!(book.available_copies, 1);
        let student = f.repository.students.get(f.student.id).await.unwrap();
        assert_eq!(student.credits, 4);
    }

    #[tokio::test]
    async fn refund_on_reject_is_capped() {
        let f = fixture(BorrowingConfig {
            restore_credit_on_reject: true,
            ..BorrowingConfig::default()
        })
        .await;
        let created = f.service.create_request(short_term(&f)).await.unwrap();
        f.service.reject(created.id).await.unwrap();

        let student = f.repository.students.get(f.student.id).await.unwrap();
        assert_eq!(student.credits, 6);
    }

    #[tokio::test]
    async fn full_listings_span_several_pages() {
        let f = fixture(BorrowingConfig {
            max_page_size: 2,
            ..BorrowingConfig::default()
        })
        .await;
        let mut ids = Vec::new();
        for _ in 0..5 {
            ids.push(f.service.create_request(short_term(&f)).await.unwrap().id);
        }

        let all = f.service.list_all().await.unwrap();
        assert_eq!(all.len(), 5);
        let listed: Vec<Uuid> = all.iter().map(|d| d.request.id).collect();
        ids.reverse();
        assert_eq!(listed, ids);

        let (_, mine) = f.service.list_for_student(f.student.id).await.unwrap();
        assert_eq!(mine.len(), 5);
    }

    #[tokio::test]
    async fn verify_names_the_missing_record() {
        let f = fixture(BorrowingConfig::default()).await;

        let err = f.service.verify(Uuid::new_v4(), f.book_id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref m) if m == "Student not found"));
        let err = f.service.verify(f.student.id, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref m) if m == "Book not found"));
    }

    #[tokio::test]
    async fn verify_reports_approval() {
        let f = fixture(BorrowingConfig::default()).await;
        let err = f.service.verify(f.student.id, f.book_id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let created = f.service.create_request(short_term(&f)).await.unwrap();
        assert!(!f.service.verify(f.student.id, f.book_id).await.unwrap().success);

        f.service.approve(created.id).await.unwrap();
        assert!(f.service.verify(f.student.id, f.book_id).await.unwrap().success);
    }
}
