//! Data models for the library server

pub mod analytics;
pub mod book;
pub mod borrow;
pub mod enums;
pub mod fine;
pub mod scan;
pub mod section;
pub mod student;

// Re-export commonly used types
pub use analytics::{BookStock, DemandTier, StockReport};
pub use book::{Book, BookShort, BookStatus};
pub use borrow::{BorrowRequest, BorrowRequestDetails, BorrowStatus};
pub use enums::Gender;
pub use fine::{Fine, FineDetails};
pub use scan::{Scan, ScanDetails, ScanType};
pub use section::Section;
pub use student::{Rfid, Student, StudentShort};

use serde::Deserialize;
use utoipa::IntoParams;

/// Pagination parameters shared by list endpoints
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct Pagination {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}
