//! Borrow request model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::{book::BookShort, enums::text_enum, student::StudentShort};

/// Borrow request status. `Approved` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum BorrowStatus {
    Pending,
    Approved,
    Rejected,
}

text_enum!(BorrowStatus {
    Pending => "Pending",
    Approved => "Approved",
    Rejected => "Rejected",
});

/// A student's request to borrow one book
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BorrowRequest {
    pub id: Uuid,
    pub student_id: Uuid,
    pub book_id: Uuid,
    pub status: BorrowStatus,
    pub borrowed_date: DateTime<Utc>,
    /// Required unless `long_term`
    pub expected_return_date: Option<DateTime<Utc>>,
    pub long_term: bool,
    /// Set when the book comes back; orthogonal to `status`
    pub return_date: Option<DateTime<Utc>>,
    pub remarks: String,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BorrowRequest {
    pub fn is_returned(&self) -> bool {
        self.return_date.is_some()
    }
}

/// Borrow request with the student and book it links
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BorrowRequestDetails {
    #[serde(flatten)]
    pub request: BorrowRequest,
    pub student: Option<StudentShort>,
    pub book: Option<BookShort>,
}

/// Create borrow request body
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateBorrowRequest {
    #[serde(alias = "userId")]
    pub student_id: Uuid,
    #[serde(alias = "bookId")]
    pub book_id: Uuid,
    #[serde(default, alias = "longTermBorrow")]
    pub long_term: bool,
    #[serde(alias = "expectedReturnDate")]
    pub expected_return_date: Option<DateTime<Utc>>,
    pub remarks: Option<String>,
}

/// Validated request ready to be stored
#[derive(Debug, Clone)]
pub struct NewBorrowRequest {
    pub student_id: Uuid,
    pub book_id: Uuid,
    pub long_term: bool,
    pub expected_return_date: Option<DateTime<Utc>>,
    pub remarks: String,
    pub borrowed_date: DateTime<Utc>,
}

/// Credit change applied in the same unit of work as the insert.
/// The write only happens if the student row still has `expected_version`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreditDebit {
    pub expected_version: i32,
    pub credits_after: i32,
}

/// Counter side effects carried out atomically with a status change or a return
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransitionEffects {
    /// Added to the book's `available_copies`; the write fails if the result would be negative
    pub copies_delta: i32,
    /// Refund one credit to the student, never above this cap
    pub credit_refund_cap: Option<i32>,
}

/// Filters for borrow request listings (newest first)
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct BorrowQuery {
    pub status: Option<BorrowStatus>,
    pub student_id: Option<Uuid>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Check the approval state of the request linking a student and a book
#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyBorrowRequest {
    #[serde(alias = "studentId")]
    pub student_id: Uuid,
    #[serde(alias = "bookId")]
    pub book_id: Uuid,
}

/// Outcome of a verification: `success` is true only for an approved request
#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyOutcome {
    pub success: bool,
    pub message: String,
    pub data: BorrowRequest,
}

impl VerifyOutcome {
    pub fn from_request(request: BorrowRequest) -> Self {
        let approved = request.status == BorrowStatus::Approved;
        Self {
            success: approved,
            message: if approved {
                "Borrow request is already approved".to_string()
            } else {
                "Borrow request is not approved yet".to_string()
            },
            data: request,
        }
    }
}
