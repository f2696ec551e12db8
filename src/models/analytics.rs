//! Stock analytics types

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{book::Book, section::Section};

/// Popularity band derived from the demand score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DemandTier {
    Hot,
    Popular,
    Moderate,
}

impl DemandTier {
    pub fn from_score(score: u8) -> Self {
        if score > 85 {
            DemandTier::Hot
        } else if score > 70 {
            DemandTier::Popular
        } else {
            DemandTier::Moderate
        }
    }
}

/// Book enriched with demand figures
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BookStock {
    #[serde(flatten)]
    pub book: Book,
    /// Approved requests for this book
    pub times_issued: i64,
    /// Visit count of the book's section
    pub shelf_visits: i64,
    /// 0..=100
    pub demand_score: u8,
    pub demand_status: DemandTier,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StockReport {
    pub success: bool,
    pub books: Vec<BookStock>,
    pub sections: Vec<Section>,
}
