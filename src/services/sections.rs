//! Section traffic counters

use crate::{
    error::{AppError, AppResult},
    models::{section::section_key, Section},
    repository::Repository,
};

#[derive(Clone)]
pub struct SectionsService {
    repository: Repository,
}

impl SectionsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    fn require_name(name: Option<&str>) -> AppResult<&str> {
        name.map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| AppError::Validation("section_name is required".to_string()))
    }

    /// Count a shelf visit (presence sensor)
    pub async fn record_visit(&self, name: Option<&str>) -> AppResult<Section> {
        let name = Self::require_name(name)?;
        let section = self.repository.sections.increment_visits(name).await?;
        tracing::debug!(section = %section.section_name, visits = section.visit_count, "Section visit");
        Ok(section)
    }

    pub async fn record_book_bought(&self, name: Option<&str>) -> AppResult<Section> {
        let name = Self::require_name(name)?;
        self.repository.sections.increment_books_bought(name).await
    }

    pub async fn list(&self) -> AppResult<Vec<Section>> {
        self.repository.sections.list().await
    }

    /// Sections matching `name` (all when absent)
    pub async fn stats(&self, name: Option<&str>) -> AppResult<Vec<Section>> {
        let sections = self.repository.sections.list().await?;
        Ok(match name.map(section_key).filter(|n| !n.is_empty()) {
            Some(key) => sections
                .into_iter()
                .filter(|s| s.section_name == key)
                .collect(),
            None => sections,
        })
    }
}
