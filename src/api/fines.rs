//! Overdue fine endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{fine::FineQuery, Fine, FineDetails},
    services::fines::SweepReport,
};

/// List fines, optionally filtered by payment state
#[utoipa::path(
    get,
    path = "/fines",
    tag = "fines",
    params(FineQuery),
    responses(
        (status = 200, description = "Fines", body = Vec<FineDetails>)
    )
)]
pub async fn list_fines(
    State(state): State<crate::AppState>,
    Query(query): Query<FineQuery>,
) -> AppResult<Json<Vec<FineDetails>>> {
    let fines = state.services.fines.list(&query).await?;
    Ok(Json(fines))
}

/// Fines of one student
#[utoipa::path(
    get,
    path = "/fines/student/{id}",
    tag = "fines",
    params(
        ("id" = Uuid, Path, description = "Student ID")
    ),
    responses(
        (status = 200, description = "Student fines", body = Vec<FineDetails>),
        (status = 404, description = "Student not found")
    )
)]
pub async fn student_fines(
    State(state): State<crate::AppState>,
    Path(student_id): Path<Uuid>,
) -> AppResult<Json<Vec<FineDetails>>> {
    let fines = state.services.fines.list_for_student(student_id).await?;
    Ok(Json(fines))
}

/// Mark a fine as paid
#[utoipa::path(
    patch,
    path = "/fines/{id}/paid",
    tag = "fines",
    params(
        ("id" = Uuid, Path, description = "Fine ID")
    ),
    responses(
        (status = 200, description = "Fine paid", body = Fine),
        (status = 404, description = "Fine not found"),
        (status = 409, description = "Fine already paid")
    )
)]
pub async fn mark_paid(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Fine>> {
    let fine = state.services.fines.mark_paid(id).await?;
    Ok(Json(fine))
}

/// Delete a fine
#[utoipa::path(
    delete,
    path = "/fines/{id}",
    tag = "fines",
    params(
        ("id" = Uuid, Path, description = "Fine ID")
    ),
    responses(
        (status = 204, description = "Fine deleted"),
        (status = 404, description = "Fine not found")
    )
)]
pub async fn delete_fine(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.services.fines.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Run the overdue sweep now
#[utoipa::path(
    post,
    path = "/fines/calculate",
    tag = "fines",
    responses(
        (status = 200, description = "Sweep counters", body = SweepReport)
    )
)]
pub async fn calculate(State(state): State<crate::AppState>) -> AppResult<Json<SweepReport>> {
    let report = state.services.fines.sweep(Utc::now()).await?;
    Ok(Json(report))
}
