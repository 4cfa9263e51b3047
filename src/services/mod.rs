//! Business logic services
//!
//! Services pre-check every rule so callers get the precise error, then hand
//! the write to the repository's conditional operation, which re-checks the
//! same guard atomically.

pub mod catalog;
pub mod events;
pub mod loans;
pub mod maintenance;
pub mod study_rooms;
pub mod users;

use crate::{
    config::AppConfig,
    error::{AppError, AppResult},
    repository::Repository,
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub users: users::UsersService,
    pub catalog: catalog::CatalogService,
    pub loans: loans::LoansService,
    pub study_rooms: study_rooms::StudyRoomsService,
    pub events: events::EventsService,
    pub maintenance: maintenance::MaintenanceService,
    repository: Repository,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, config: &AppConfig) -> Self {
        Self {
            users: users::UsersService::new(repository.clone(), config.auth.clone()),
            catalog: catalog::CatalogService::new(repository.clone()),
            loans: loans::LoansService::new(repository.clone(), config.loans.clone()),
            study_rooms: study_rooms::StudyRoomsService::new(repository.clone()),
            events: events::EventsService::new(repository.clone()),
            maintenance: maintenance::MaintenanceService::new(repository.clone()),
            repository,
        }
    }

    /// Check that the entity store answers
    pub async fn ping(&self) -> AppResult<()> {
        self.repository.ping().await
    }
}

/// Report a conditional write that failed although its pre-check passed,
/// i.e. a concurrent writer got there first. The error is passed through.
pub(crate) fn lost_race(operation: &'static str) -> impl FnOnce(AppError) -> AppError {
    move |error| {
        if !matches!(error, AppError::Database(_) | AppError::Internal(_)) {
            tracing::warn!(operation, error = %error, "Conditional write rejected after pre-check");
        }
        error
    }
}

/// Turn a `NotFound` into `None`, keeping every other error
pub(crate) fn optional<T>(result: AppResult<T>) -> AppResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(AppError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}
