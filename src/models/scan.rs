//! RFID scan events (append-only)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{enums::text_enum, student::Student};

/// Entry or exit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScanType {
    #[default]
    In,
    Out,
}

text_enum!(ScanType {
    In => "in",
    Out => "out",
});

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Scan {
    pub id: Uuid,
    pub student_id: Uuid,
    pub scan_type: ScanType,
    pub scanned_at: DateTime<Utc>,
    pub device_id: Option<String>,
    pub rfid_hex: String,
    pub rfid_decimal: String,
}

/// Scan with the full student record
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ScanDetails {
    #[serde(flatten)]
    pub scan: Scan,
    pub student: Student,
}

/// Scan to append
#[derive(Debug, Clone)]
pub struct NewScan {
    pub student_id: Uuid,
    pub scan_type: ScanType,
    pub scanned_at: DateTime<Utc>,
    pub device_id: Option<String>,
    pub rfid_hex: String,
    pub rfid_decimal: String,
}

/// Payload sent by the reader at the gate
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ScanRequest {
    pub uid_hex: Option<String>,
    /// Readers send this either as a JSON number or a string
    #[serde(default, deserialize_with = "string_or_number")]
    #[schema(value_type = Option<String>)]
    pub uid_dec: Option<String>,
    #[serde(default)]
    pub scan_type: ScanType,
    pub device_id: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct IsActiveRequest {
    pub prn_number: Option<String>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    }))
}
