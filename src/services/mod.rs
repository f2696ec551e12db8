//! Business logic services

pub mod analytics;
pub mod borrows;
pub mod catalog;
pub mod fines;
pub mod notifications;
pub mod scans;
pub mod sections;
pub mod students;

use std::sync::Arc;

use crate::{config::AppConfig, repository::Repository};

use notifications::Notifier;

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub repository: Repository,
    pub students: students::StudentsService,
    pub catalog: catalog::CatalogService,
    pub borrows: borrows::BorrowsService,
    pub fines: fines::FinesService,
    pub scans: scans::ScansService,
    pub sections: sections::SectionsService,
    pub analytics: analytics::AnalyticsService,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, config: &AppConfig, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            students: students::StudentsService::new(repository.clone(), config.borrowing.clone()),
            catalog: catalog::CatalogService::new(repository.clone(), config.borrowing.clone()),
            borrows: borrows::BorrowsService::new(repository.clone(), config.borrowing.clone()),
            fines: fines::FinesService::new(
                repository.clone(),
                config.fines.clone(),
                config.borrowing.clone(),
                notifier.clone(),
            ),
            scans: scans::ScansService::new(repository.clone(), notifier),
            sections: sections::SectionsService::new(repository.clone()),
            analytics: analytics::AnalyticsService::new(repository.clone()),
            repository,
        }
    }
}
