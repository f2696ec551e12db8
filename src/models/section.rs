//! Section traffic counters

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Section {
    /// Upper-cased section name
    pub section_name: String,
    pub visit_count: i64,
    pub books_bought_count: i64,
    pub shelf_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SectionIncrement {
    #[serde(alias = "sectionName")]
    pub section_name: Option<String>,
}

/// Canonical key for a section name
pub fn section_key(name: &str) -> String {
    name.trim().to_uppercase()
}
