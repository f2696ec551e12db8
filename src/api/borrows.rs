//! Borrow request endpoints
//!
//! Mutations are mirrored to real-time subscribers so dashboards that are
//! not the issuer stay current.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        borrow::{BorrowQuery, CreateBorrowRequest, VerifyBorrowRequest, VerifyOutcome},
        BorrowRequest, BorrowRequestDetails, BorrowStatus, Student,
    },
    realtime::handlers::{publish_new_request, publish_request_update},
};

use super::ApiJson;

/// A student's requests, as served to clients whose socket did not answer
#[derive(Serialize, ToSchema)]
pub struct StudentRequestsResponse {
    pub success: bool,
    pub requests: Vec<BorrowRequestDetails>,
    pub student: Student,
}

/// Create a borrow request and debit one credit
#[utoipa::path(
    post,
    path = "/issue",
    tag = "issue",
    request_body = CreateBorrowRequest,
    responses(
        (status = 201, description = "Borrow request created", body = BorrowRequest),
        (status = 400, description = "Missing expected return date for a short-term borrow"),
        (status = 404, description = "Student or book not found"),
        (status = 409, description = "Concurrent credit update"),
        (status = 422, description = "No credits left")
    )
)]
pub async fn create_request(
    State(state): State<crate::AppState>,
    ApiJson(request): ApiJson<CreateBorrowRequest>,
) -> AppResult<(StatusCode, Json<BorrowRequest>)> {
    let created = state.services.borrows.create_request(request).await?;

    match state.services.borrows.get(created.id).await {
        Ok(details) => publish_new_request(&state.hub, &details),
        Err(e) => tracing::warn!(request_id = %created.id, error = %e, "Could not announce new request"),
    }

    Ok((StatusCode::CREATED, Json(created)))
}

/// List borrow requests, newest first
#[utoipa::path(
    get,
    path = "/issue",
    tag = "issue",
    params(BorrowQuery),
    responses(
        (status = 200, description = "Borrow requests", body = Vec<BorrowRequestDetails>)
    )
)]
pub async fn list_requests(
    State(state): State<crate::AppState>,
    Query(query): Query<BorrowQuery>,
) -> AppResult<Json<Vec<BorrowRequestDetails>>> {
    let requests = state.services.borrows.list(&query).await?;
    Ok(Json(requests))
}

/// Get one borrow request with its student and book
#[utoipa::path(
    get,
    path = "/issue/{id}",
    tag = "issue",
    params(
        ("id" = Uuid, Path, description = "Borrow request ID")
    ),
    responses(
        (status = 200, description = "Borrow request", body = BorrowRequestDetails),
        (status = 404, description = "Borrow request not found")
    )
)]
pub async fn get_request(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<BorrowRequestDetails>> {
    let request = state.services.borrows.get(id).await?;
    Ok(Json(request))
}

/// List requests in one status
#[utoipa::path(
    get,
    path = "/issue/status/{status}",
    tag = "issue",
    params(
        ("status" = String, Path, description = "pending, approved or rejected"),
        ("page" = Option<i64>, Query, description = "Page number"),
        ("per_page" = Option<i64>, Query, description = "Items per page")
    ),
    responses(
        (status = 200, description = "Borrow requests", body = Vec<BorrowRequestDetails>),
        (status = 400, description = "Unknown status")
    )
)]
pub async fn list_by_status(
    State(state): State<crate::AppState>,
    Path(status): Path<String>,
    Query(mut query): Query<BorrowQuery>,
) -> AppResult<Json<Vec<BorrowRequestDetails>>> {
    let status: BorrowStatus = status.parse().map_err(AppError::Validation)?;
    query.status = Some(status);

    let requests = state.services.borrows.list(&query).await?;
    Ok(Json(requests))
}

/// A student's requests (HTTP fallback for the real-time list)
#[utoipa::path(
    get,
    path = "/issue/student/{id}",
    tag = "issue",
    params(
        ("id" = Uuid, Path, description = "Student ID")
    ),
    responses(
        (status = 200, description = "Student and their requests", body = StudentRequestsResponse),
        (status = 404, description = "Student not found")
    )
)]
pub async fn student_requests(
    State(state): State<crate::AppState>,
    Path(student_id): Path<Uuid>,
) -> AppResult<Json<StudentRequestsResponse>> {
    let (student, requests) = state.services.borrows.list_for_student(student_id).await?;
    Ok(Json(StudentRequestsResponse {
        success: true,
        requests,
        student,
    }))
}

/// Check whether the request linking a student and a book is approved
#[utoipa::path(
    post,
    path = "/issue/verify",
    tag = "issue",
    request_body = VerifyBorrowRequest,
    responses(
        (status = 200, description = "Verification outcome", body = VerifyOutcome),
        (status = 404, description = "No matching request")
    )
)]
pub async fn verify_request(
    State(state): State<crate::AppState>,
    ApiJson(request): ApiJson<VerifyBorrowRequest>,
) -> AppResult<Json<VerifyOutcome>> {
    let outcome = state
        .services
        .borrows
        .verify(request.student_id, request.book_id)
        .await?;
    Ok(Json(outcome))
}

/// Approve a Pending request
#[utoipa::path(
    patch,
    path = "/issue/approve/{id}",
    tag = "issue",
    params(
        ("id" = Uuid, Path, description = "Borrow request ID")
    ),
    responses(
        (status = 200, description = "Request approved", body = BorrowRequestDetails),
        (status = 404, description = "Borrow request not found"),
        (status = 409, description = "Request is not Pending"),
        (status = 422, description = "No copies available")
    )
)]
pub async fn approve_request(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<BorrowRequestDetails>> {
    let details = state.services.borrows.approve(id).await?;
    publish_request_update(&state.hub, &details, None);
    Ok(Json(details))
}

/// Reject a Pending request
#[utoipa::path(
    patch,
    path = "/issue/reject/{id}",
    tag = "issue",
    params(
        ("id" = Uuid, Path, description = "Borrow request ID")
    ),
    responses(
        (status = 200, description = "Request rejected", body = BorrowRequestDetails),
        (status = 404, description = "Borrow request not found"),
        (status = 409, description = "Request is not Pending")
    )
)]
pub async fn reject_request(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<BorrowRequestDetails>> {
    let details = state.services.borrows.reject(id).await?;
    publish_request_update(&state.hub, &details, None);
    Ok(Json(details))
}

/// Record the return of an Approved request's book
#[utoipa::path(
    patch,
    path = "/issue/return/{id}",
    tag = "issue",
    params(
        ("id" = Uuid, Path, description = "Borrow request ID")
    ),
    responses(
        (status = 200, description = "Return recorded", body = BorrowRequestDetails),
        (status = 404, description = "Borrow request not found"),
        (status = 409, description = "Request is not Approved or already returned")
    )
)]
pub async fn return_request(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<BorrowRequestDetails>> {
    let details = state.services.borrows.mark_returned(id).await?;
    publish_request_update(&state.hub, &details, None);
    Ok(Json(details))
}
