//! Fine accrual and fine management
//!
//! The sweep is idempotent: fines are keyed by borrow request, so running it
//! again recomputes the same (or a larger) amount instead of charging twice.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use utoipa::ToSchema;
use uuid::Uuid;

use super::notifications::Notifier;
use crate::{
    config::{BorrowingConfig, FinesConfig},
    error::AppResult,
    models::{
        fine::{fine_reason, overdue_days, FineQuery},
        BorrowRequest, Fine, FineDetails,
    },
    repository::Repository,
};

/// Outcome counters of one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct SweepReport {
    /// Overdue, unreturned requests examined
    pub overdue: usize,
    /// Fines created or refreshed
    pub fined: usize,
    /// Records whose processing failed and was skipped
    pub failed: usize,
    /// Reminders handed to the notifier without error
    pub notified: usize,
}

#[derive(Clone)]
pub struct FinesService {
    repository: Repository,
    config: FinesConfig,
    paging: BorrowingConfig,
    notifier: Arc<dyn Notifier>,
}

impl FinesService {
    pub fn new(
        repository: Repository,
        config: FinesConfig,
        paging: BorrowingConfig,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            repository,
            config,
            paging,
            notifier,
        }
    }

    /// Compute fines for every overdue unreturned request as of `now`,
    /// then hand all unpaid fines to the notifier.
    pub async fn sweep(&self, now: DateTime<Utc>) -> AppResult<SweepReport> {
        let overdue = self
            .repository
            .borrows
            .overdue(now, self.config.approved_only)
            .await?;

        let mut report = SweepReport {
            overdue: overdue.len(),
            ..SweepReport::default()
        };

        for request in &overdue {
            match self.accrue(request, now).await {
                Ok(Some(fine)) => {
                    tracing::debug!(request_id = %request.id, amount = fine.amount, "Fine accrued");
                    report.fined += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(request_id = %request.id, error = %e, "Skipping fine accrual");
                    report.failed += 1;
                }
            }
        }

        for fine in self.repository.fines.unpaid().await? {
            match self.notifier.fine_reminder(&fine).await {
                Ok(()) => report.notified += 1,
                Err(e) => {
                    tracing::warn!(fine_id = %fine.fine.id, error = %e, "Fine reminder not delivered")
                }
            }
        }

        tracing::info!(
            overdue = report.overdue,
            fined = report.fined,
            failed = report.failed,
            notified = report.notified,
            "Fine sweep completed"
        );
        Ok(report)
    }

    async fn accrue(&self, request: &BorrowRequest, now: DateTime<Utc>) -> AppResult<Option<Fine>> {
        let Some(expected) = request.expected_return_date else {
            return Ok(None);
        };
        let days = overdue_days(expected, now);
        if days == 0 {
            return Ok(None);
        }

        let fine = self
            .repository
            .fines
            .upsert(request.id, days * self.config.fine_per_day, &fine_reason(days))
            .await?;
        Ok(Some(fine))
    }

    /// Run a sweep now (unless disabled) and then on every interval tick.
    /// The first sweep never delays the caller.
    pub fn spawn_scheduler(self) -> JoinHandle<()> {
        let period = Duration::from_secs(self.config.sweep_interval_hours.max(1) * 3600);
        let run_on_startup = self.config.run_on_startup;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately
            ticker.tick().await;
            if run_on_startup {
                self.run_logged().await;
            }
            loop {
                ticker.tick().await;
                self.run_logged().await;
            }
        })
    }

    async fn run_logged(&self) {
        if let Err(e) = self.sweep(Utc::now()).await {
            tracing::error!(error = %e, "Fine sweep failed");
        }
    }

    pub async fn list(&self, query: &FineQuery) -> AppResult<Vec<FineDetails>> {
        let (limit, offset) = self.paging.page_window(query.page, query.per_page);
        self.repository.fines.list(query.paid, limit, offset).await
    }

    pub async fn list_for_student(&self, student_id: Uuid) -> AppResult<Vec<FineDetails>> {
        self.repository.students.get(student_id).await?;
        self.repository.fines.list_for_student(student_id).await
    }

    pub async fn mark_paid(&self, id: Uuid) -> AppResult<Fine> {
        let fine = self.repository.fines.mark_paid(id, Utc::now()).await?;
        tracing::info!(fine_id = %id, amount = fine.amount, "Fine paid");
        Ok(fine)
    }

    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.repository.fines.delete(id).await?;
        tracing::info!(fine_id = %id, "Fine deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::AppError,
        models::{
            book::CreateBook,
            borrow::{CreditDebit, NewBorrowRequest},
            student::{CreateStudent, RfidInput},
            Gender,
        },
        services::notifications::MockNotifier,
    };
    use crate::repository::FinesStore;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;

    /// Fines store whose upsert fails for one borrow request
    struct BrokenFor {
        inner: Arc<dyn FinesStore>,
        request_id: Uuid,
    }

    #[async_trait]
    impl FinesStore for BrokenFor {
        async fn upsert(&self, borrow_request_id: Uuid, amount: i64, reason: &str) -> AppResult<Fine> {
            if borrow_request_id == self.request_id {
                return Err(AppError::Internal("connection reset".into()));
            }
            self.inner.upsert(borrow_request_id, amount, reason).await
        }

        async fn get(&self, id: Uuid) -> AppResult<Fine> {
            self.inner.get(id).await
        }

        async fn list(
            &self,
            paid: Option<bool>,
            limit: i64,
            offset: i64,
        ) -> AppResult<Vec<FineDetails>> {
            self.inner.list(paid, limit, offset).await
        }

        async fn list_for_student(&self, student_id: Uuid) -> AppResult<Vec<FineDetails>> {
            self.inner.list_for_student(student_id).await
        }

        async fn unpaid(&self) -> AppResult<Vec<FineDetails>> {
            self.inner.unpaid().await
        }

        async fn mark_paid(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<Fine> {
            self.inner.mark_paid(id, at).await
        }

        async fn delete(&self, id: Uuid) -> AppResult<()> {
            self.inner.delete(id).await
        }
    }

    async fn another_request(repository: &Repository, like: &BorrowRequest) -> BorrowRequest {
        let student = repository.students.get(like.student_id).await.unwrap();
        repository
            .borrows
            .create(
                NewBorrowRequest {
                    student_id: like.student_id,
                    book_id: like.book_id,
                    long_term: false,
                    expected_return_date: like.expected_return_date,
                    remarks: String::new(),
                    borrowed_date: like.borrowed_date,
                },
                CreditDebit {
                    expected_version: student.version,
                    credits_after: student.credits - 1,
                },
            )
            .await
            .unwrap()
            .unwrap()
    }

    async fn overdue_request(repository: &Repository, expected: DateTime<Utc>) -> BorrowRequest {
        let student = repository
            .students
            .create(
                CreateStudent {
                    prn_number: "UG21CS002".into(),
                    name: "Rohan Desai".into(),
                    class: "SY".into(),
                    section: "B".into(),
                    roll_no: Some(4),
                    gender: Gender::Male,
                    contact_number: "9123456780".into(),
                    email: "rohan@example.com".into(),
                    photo: None,
                    rfid: RfidInput {
                        hex: None,
                        decimal: Some("3735928559".into()),
                    },
                }
                .into_new_student(6)
                .unwrap(),
            )
            .await
            .unwrap();
        let book = repository
            .books
            .create(
                CreateBook {
                    title: "Clean Code".into(),
                    author: "Robert C. Martin".into(),
                    publisher: Some("Prentice Hall".into()),
                    isbn: "9780132350884".into(),
                    section: "Computer Science".into(),
                    genre: None,
                    language: None,
                    publication_year: Some(2008),
                    cover_image: None,
                    description: None,
                    status: None,
                    total_copies: Some(2),
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

        repository
            .borrows
            .create(
                NewBorrowRequest {
                    student_id: student.id,
                    book_id: book.id,
                    long_term: false,
                    expected_return_date: Some(expected),
                    remarks: String::new(),
                    borrowed_date: expected - ChronoDuration::days(7),
                },
                CreditDebit {
                    expected_version: student.version,
                    credits_after: student.credits - 1,
                },
            )
            .await
            .unwrap()
            .unwrap()
    }

    fn quiet_notifier() -> Arc<dyn Notifier> {
        let mut mock = MockNotifier::new();
        mock.expect_fine_reminder().returning(|_| Ok(()));
        Arc::new(mock)
    }

    fn service(repository: &Repository, notifier: Arc<dyn Notifier>) -> FinesService {
        FinesService::new(
            repository.clone(),
            FinesConfig::default(),
            BorrowingConfig::default(),
            notifier,
        )
    }

    #[tokio::test]
    async fn three_days_late_costs_fifteen() {
        let repository = Repository::in_memory();
        let now = Utc::now();
        let request = overdue_request(&repository, now - ChronoDuration::days(3)).await;
        let fines = service(&repository, quiet_notifier());

        let report = fines.sweep(now).await.unwrap();
        assert_eq!(report.overdue, 1);
        assert_eq!(report.fined, 1);

        let listed = fines.list(&FineQuery::default()).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].fine.borrow_request_id, request.id);
        assert_eq!(listed[0].fine.amount, 15);
        assert_eq!(listed[0].fine.reason, "Overdue by 3 day(s)");
    }

    #[tokio::test]
    async fn sweeping_twice_keeps_one_fine() {
        let repository = Repository::in_memory();
        let now = Utc::now();
        overdue_request(&repository, now - ChronoDuration::days(3)).await;
        let fines = service(&repository, quiet_notifier());

        fines.sweep(now).await.unwrap();
        fines.sweep(now).await.unwrap();

        let listed = fines.list(&FineQuery::default()).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].fine.amount, 15);
    }

    #[tokio::test]
    async fn returned_loans_stop_accruing() {
        let repository = Repository::in_memory();
        let request = overdue_request(&repository, Utc::now() - ChronoDuration::days(2)).await;
        repository
            .borrows
            .transition(
                request.id,
                crate::models::BorrowStatus::Approved,
                Utc::now(),
                Default::default(),
            )
            .await
            .unwrap();
        repository
            .borrows
            .mark_returned(request.id, Utc::now(), Default::default())
            .await
            .unwrap();

        let report = service(&repository, quiet_notifier())
            .sweep(Utc::now())
            .await
            .unwrap();
        assert_eq!(report.overdue, 0);
    }

    #[tokio::test]
    async fn notifier_failures_do_not_fail_the_sweep() {
        let repository = Repository::in_memory();
        overdue_request(&repository, Utc::now() - ChronoDuration::days(1)).await;

        let mut mock = MockNotifier::new();
        mock.expect_fine_reminder()
            .times(1)
            .returning(|_| Err(AppError::Internal("smtp down".into())));
        let report = service(&repository, Arc::new(mock))
            .sweep(Utc::now())
            .await
            .unwrap();

        assert_eq!(report.fined, 1);
        assert_eq!(report.notified, 0);
    }

    #[tokio::test]
    async fn one_failing_record_does_not_stop_the_sweep() {
        let mut repository = Repository::in_memory();
        let now = Utc::now();
        let first = overdue_request(&repository, now - ChronoDuration::days(2)).await;
        another_request(&repository, &first).await;
        another_request(&repository, &first).await;

        // Break whichever record the sweep reaches first
        let broken = repository.borrows.overdue(now, false).await.unwrap()[0].id;
        repository.fines = Arc::new(BrokenFor {
            inner: repository.fines.clone(),
            request_id: broken,
        });

        let report = service(&repository, quiet_notifier()).sweep(now).await.unwrap();
        assert_eq!(report.overdue, 3);
        assert_eq!(report.fined, 2);
        assert_eq!(report.failed, 1);

        let listed = service(&repository, quiet_notifier())
            .list(&FineQuery::default())
            .await
            .unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|d| d.fine.borrow_request_id != broken));
        assert!(listed.iter().all(|d| d.fine.amount == 10));
    }

    #[tokio::test]
    async fn paying_twice_conflicts() {
        let repository = Repository::in_memory();
        overdue_request(&repository, Utc::now() - ChronoDuration::days(1)).await;
        let fines = service(&repository, quiet_notifier());
        fines.sweep(Utc::now()).await.unwrap();

        let id = fines.list(&FineQuery::default()).await.unwrap()[0].fine.id;
        fines.mark_paid(id).await.unwrap();
        let err = fines.mark_paid(id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }
}
