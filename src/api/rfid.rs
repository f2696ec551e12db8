//! RFID gate endpoints

use axum::{extract::State, Json};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::{
        scan::{IsActiveRequest, ScanRequest},
        Scan, ScanDetails, ScanType, Student,
    },
    realtime::handlers::publish_scan,
    services::scans::PresenceReport,
};

use super::ApiJson;

/// Scan acknowledgement shown on the gate display
#[derive(Serialize, ToSchema)]
pub struct ScanResponse {
    pub success: bool,
    pub message: String,
    pub student: Student,
    pub scan: Scan,
}

/// Ingest a card scan and broadcast it
#[utoipa::path(
    post,
    path = "/rfid/scan",
    tag = "rfid",
    request_body = ScanRequest,
    responses(
        (status = 200, description = "Scan recorded", body = ScanResponse),
        (status = 400, description = "No UID given"),
        (status = 404, description = "No student registered for this card")
    )
)]
pub async fn scan(
    State(state): State<crate::AppState>,
    ApiJson(request): ApiJson<ScanRequest>,
) -> AppResult<Json<ScanResponse>> {
    let details = state.services.scans.record(request).await?;
    publish_scan(&state.hub, &details);

    let message = match details.scan.scan_type {
        ScanType::In => "You can enter now",
        ScanType::Out => "Goodbye",
    };
    let ScanDetails { scan, student } = details;

    Ok(Json(ScanResponse {
        success: true,
        message: message.to_string(),
        student,
        scan,
    }))
}

/// Most recent scan with its student
#[utoipa::path(
    get,
    path = "/rfid/get-scanned",
    tag = "rfid",
    responses(
        (status = 200, description = "Latest scan", body = ScanDetails),
        (status = 404, description = "No scans recorded")
    )
)]
pub async fn latest_scan(State(state): State<crate::AppState>) -> AppResult<Json<ScanDetails>> {
    let latest = state.services.scans.latest().await?;
    Ok(Json(latest))
}

/// Whether a student's last scan today was an entry
#[utoipa::path(
    post,
    path = "/rfid/is-active",
    tag = "rfid",
    request_body = IsActiveRequest,
    responses(
        (status = 200, description = "Presence report", body = PresenceReport),
        (status = 400, description = "PRN number missing"),
        (status = 404, description = "Student not found")
    )
)]
pub async fn is_active(
    State(state): State<crate::AppState>,
    ApiJson(request): ApiJson<IsActiveRequest>,
) -> AppResult<Json<PresenceReport>> {
    let prn = request.prn_number.unwrap_or_default();
    let report = state.services.scans.presence(&prn, Utc::now()).await?;
    Ok(Json(report))
}
