//! Presence sensor endpoints for library sections

use axum::{extract::State, Json};

use crate::{
    error::AppResult,
    models::{section::SectionIncrement, Section},
};

use super::ApiJson;

/// Count a visit to a section's shelves
#[utoipa::path(
    post,
    path = "/pir/scan",
    tag = "sections",
    request_body = SectionIncrement,
    responses(
        (status = 200, description = "Updated section", body = Section),
        (status = 400, description = "Section name missing")
    )
)]
pub async fn record_visit(
    State(state): State<crate::AppState>,
    ApiJson(request): ApiJson<SectionIncrement>,
) -> AppResult<Json<Section>> {
    let section = state
        .services
        .sections
        .record_visit(request.section_name.as_deref())
        .await?;
    Ok(Json(section))
}

/// Count a book bought for a section
#[utoipa::path(
    post,
    path = "/pir/book",
    tag = "sections",
    request_body = SectionIncrement,
    responses(
        (status = 200, description = "Updated section", body = Section),
        (status = 400, description = "Section name missing")
    )
)]
pub async fn record_book_bought(
    State(state): State<crate::AppState>,
    ApiJson(request): ApiJson<SectionIncrement>,
) -> AppResult<Json<Section>> {
    let section = state
        .services
        .sections
        .record_book_bought(request.section_name.as_deref())
        .await?;
    Ok(Json(section))
}

/// List all sections and their counters
#[utoipa::path(
    get,
    path = "/pir",
    tag = "sections",
    responses(
        (status = 200, description = "Sections", body = Vec<Section>)
    )
)]
pub async fn list_sections(State(state): State<crate::AppState>) -> AppResult<Json<Vec<Section>>> {
    let sections = state.services.sections.list().await?;
    Ok(Json(sections))
}
