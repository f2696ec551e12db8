//! RFID gate scans

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::notifications::Notifier;
use crate::{
    error::{AppError, AppResult},
    models::{
        scan::{NewScan, ScanRequest},
        student::Rfid,
        Scan, ScanDetails, ScanType, Student,
    },
    repository::Repository,
};

/// Whether a student is currently inside, judged from today's scans
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PresenceReport {
    pub success: bool,
    pub student: Student,
    pub is_active: bool,
    pub latest_scan: Option<Scan>,
    pub message: String,
}

#[derive(Clone)]
pub struct ScansService {
    repository: Repository,
    notifier: Arc<dyn Notifier>,
}

impl ScansService {
    pub fn new(repository: Repository, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            repository,
            notifier,
        }
    }

    /// Resolve the card owner and append the scan. The welcome notification is
    /// sent in the background and never affects the result.
    pub async fn record(&self, request: ScanRequest) -> AppResult<ScanDetails> {
        let rfid = Rfid::complete(request.uid_hex.as_deref(), request.uid_dec.as_deref())?;

        let student = match self.repository.students.find_by_rfid(&rfid.hex).await? {
            Some(student) => Some(student),
            None => self.repository.students.find_by_rfid(&rfid.decimal).await?,
        }
        .ok_or_else(|| AppError::NotFound("No student registered for this card".to_string()))?;

        let scan = self
            .repository
            .scans
            .append(NewScan {
                student_id: student.id,
                scan_type: request.scan_type,
                scanned_at: Utc::now(),
                device_id: request.device_id,
                rfid_hex: rfid.hex,
                rfid_decimal: rfid.decimal,
            })
            .await?;

        tracing::info!(
            student_id = %student.id,
            scan_type = %scan.scan_type,
            "RFID scan recorded"
        );

        if scan.scan_type == ScanType::In {
            let notifier = self.notifier.clone();
            let (who, what) = (student.clone(), scan.clone());
            tokio::spawn(async move {
                if let Err(e) = notifier.entry_welcome(&who, &what).await {
                    tracing::warn!(student_id = %who.id, error = %e, "Entry welcome not delivered");
                }
            });
        }

        Ok(ScanDetails { scan, student })
    }

    pub async fn latest(&self) -> AppResult<ScanDetails> {
        self.repository
            .scans
            .latest()
            .await?
            .ok_or_else(|| AppError::NotFound("No scans recorded yet".to_string()))
    }

    /// A student is inside when their most recent scan of the current UTC day is an entry
    pub async fn presence(&self, prn: &str, now: DateTime<Utc>) -> AppResult<PresenceReport> {
        if prn.trim().is_empty() {
            return Err(AppError::Validation("prn_number is required".to_string()));
        }
        let student = self
            .repository
            .students
            .find_by_prn(prn)
            .await?
            .ok_or_else(|| AppError::NotFound("Student not found".to_string()))?;

        let day_start = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|d| d.and_utc())
            .ok_or_else(|| AppError::Internal("Invalid day boundary".to_string()))?;
        let latest_scan = self
            .repository
            .scans
            .latest_for_student(student.id, day_start, day_start + Duration::days(1))
            .await?;

        let is_active = latest_scan
            .as_ref()
            .map_or(false, |s| s.scan_type == ScanType::In);
        let message = match (&latest_scan, is_active) {
            (None, _) => "No scans recorded today",
            (Some(_), true) => "Student is inside the library",
            (Some(_), false) => "Student has left the library",
        };

        Ok(PresenceReport {
            success: true,
            student,
            is_active,
            latest_scan,
            message: message.to_string(),
        })
    }
}
