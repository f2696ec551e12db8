//! Fine model and overdue computation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::{book::BookShort, student::StudentShort};

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Penalty attached to one borrow request (at most one fine per request)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Fine {
    pub id: Uuid,
    pub borrow_request_id: Uuid,
    pub amount: i64,
    pub reason: String,
    pub paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fine with the student and book of its borrow request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FineDetails {
    #[serde(flatten)]
    pub fine: Fine,
    pub student: Option<StudentShort>,
    pub book: Option<BookShort>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct FineQuery {
    pub paid: Option<bool>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Whole days past `expected`, rounded up. Zero when not overdue.
pub fn overdue_days(expected: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let late_ms = (now - expected).num_milliseconds();
    if late_ms <= 0 {
        return 0;
    }
    (late_ms + MILLIS_PER_DAY - 1) / MILLIS_PER_DAY
}

pub fn fine_reason(days: i64) -> String {
    format!("Overdue by {} day(s)", days)
}
