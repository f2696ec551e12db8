//! Stock analytics: per-book demand derived from issues and shelf traffic

use std::collections::HashMap;

use crate::{
    error::AppResult,
    models::{section::section_key, BookStock, DemandTier, StockReport},
    repository::Repository,
};

const ISSUE_WEIGHT: f64 = 60.0;
const VISIT_WEIGHT: f64 = 40.0;

/// Weighted, normalized demand in `0..=100`.
///
/// Each input is normalized by the catalog maximum; a zero maximum contributes nothing.
pub fn demand_score(times_issued: i64, max_issued: i64, shelf_visits: i64, max_visits: i64) -> u8 {
    let ratio = |value: i64, max: i64| {
        if max <= 0 {
            0.0
        } else {
            (value.max(0) as f64 / max as f64).min(1.0)
        }
    };
    let score =
        ISSUE_WEIGHT * ratio(times_issued, max_issued) + VISIT_WEIGHT * ratio(shelf_visits, max_visits);
    score.round().clamp(0.0, 100.0) as u8
}

#[derive(Clone)]
pub struct AnalyticsService {
    repository: Repository,
}

impl AnalyticsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn stock_report(&self) -> AppResult<StockReport> {
        let books = self.repository.books.list_all().await?;
        let sections = self.repository.sections.list().await?;
        let issued: HashMap<_, _> = self
            .repository
            .borrows
            .approved_counts()
            .await?
            .into_iter()
            .collect();
        let visits: HashMap<String, i64> = sections
            .iter()
            .map(|s| (s.section_name.clone(), s.visit_count))
            .collect();

        let figures: Vec<(i64, i64)> = books
            .iter()
            .map(|b| {
                (
                    issued.get(&b.id).copied().unwrap_or(0),
                    visits.get(&section_key(&b.section)).copied().unwrap_or(0),
                )
            })
            .collect();
        let max_issued = figures.iter().map(|f| f.0).max().unwrap_or(0);
        let max_visits = figures.iter().map(|f| f.1).max().unwrap_or(0);

        let books = books
            .into_iter()
            .zip(figures)
            .map(|(book, (times_issued, shelf_visits))| {
                let score = demand_score(times_issued, max_issued, shelf_visits, max_visits);
                BookStock {
                    book,
                    times_issued,
                    shelf_visits,
                    demand_score: score,
                    demand_status: DemandTier::from_score(score),
                }
            })
            .collect();

        Ok(StockReport {
            success: true,
            books,
            sections,
        })
    }
}
