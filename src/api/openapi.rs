//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{books, borrows, fines, health, rfid, sections, students};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Libtwin API",
        version = "0.3.0",
        description = "Digital library REST API: catalog, borrow requests, RFID gate, fines"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Students
        students::create_student,
        students::verify_student,
        students::list_students,
        students::get_student,
        students::update_student,
        students::delete_student,
        // Books
        books::create_book,
        books::list_books,
        books::get_book,
        books::update_book,
        books::delete_book,
        books::stock_analytics,
        // Borrow requests
        borrows::create_request,
        borrows::list_requests,
        borrows::get_request,
        borrows::list_by_status,
        borrows::student_requests,
        borrows::verify_request,
        borrows::approve_request,
        borrows::reject_request,
        borrows::return_request,
        // RFID
        rfid::scan,
        rfid::latest_scan,
        rfid::is_active,
        // Sections
        sections::record_visit,
        sections::record_book_bought,
        sections::list_sections,
        // Fines
        fines::list_fines,
        fines::student_fines,
        fines::mark_paid,
        fines::delete_fine,
        fines::calculate,
    ),
    components(
        schemas(
            // Students
            crate::models::student::Student,
            crate::models::student::StudentShort,
            crate::models::student::Rfid,
            crate::models::student::RfidInput,
            crate::models::student::CreateStudent,
            crate::models::student::UpdateStudent,
            crate::models::student::VerifyStudent,
            crate::models::enums::Gender,
            // Books
            crate::models::book::Book,
            crate::models::book::BookShort,
            crate::models::book::BookStatus,
            crate::models::book::CreateBook,
            crate::models::book::UpdateBook,
            crate::models::analytics::BookStock,
            crate::models::analytics::DemandTier,
            crate::models::analytics::StockReport,
            // Borrow requests
            crate::models::borrow::BorrowRequest,
            crate::models::borrow::BorrowRequestDetails,
            crate::models::borrow::BorrowStatus,
            crate::models::borrow::CreateBorrowRequest,
            crate::models::borrow::VerifyBorrowRequest,
            crate::models::borrow::VerifyOutcome,
            borrows::StudentRequestsResponse,
            // RFID
            crate::models::scan::Scan,
            crate::models::scan::ScanDetails,
            crate::models::scan::ScanType,
            crate::models::scan::ScanRequest,
            crate::models::scan::IsActiveRequest,
            crate::services::scans::PresenceReport,
            rfid::ScanResponse,
            // Sections
            crate::models::section::Section,
            crate::models::section::SectionIncrement,
            // Fines
            crate::models::fine::Fine,
            crate::models::fine::FineDetails,
            crate::services::fines::SweepReport,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "students", description = "Student registry"),
        (name = "books", description = "Book catalog and stock analytics"),
        (name = "issue", description = "Borrow request lifecycle"),
        (name = "rfid", description = "RFID gate scans"),
        (name = "sections", description = "Section presence counters"),
        (name = "fines", description = "Overdue fines")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
