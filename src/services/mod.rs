//! Business logic services

pub mod catalog;
pub mod email;
pub mod lending;
pub mod loans;
pub mod members;
pub mod notifications;
pub mod reports;
pub mod scheduler;

use std::sync::Arc;

use chrono::{NaiveDate, Utc};

use crate::{
    config::LendingConfig,
    error::AppResult,
    models::LoanPolicy,
    repository::{lending::LendingStore, Repository},
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    repository: Repository,
    pub catalog: catalog::CatalogService,
    pub members: members::MembersService,
    pub loans: loans::LoansService,
    pub lending: lending::LendingService,
    pub reports: reports::ReportsService,
    pub notifications: notifications::NotificationQueue,
}

impl Services {
    /// Create all services. `store` backs the loan lifecycle and reports;
    /// record-level CRUD goes through `repository`.
    pub fn new(
        repository: Repository,
        store: Arc<dyn LendingStore>,
        lending_config: &LendingConfig,
        notifications: notifications::NotificationQueue,
    ) -> Self {
        let policy = LoanPolicy::new(lending_config.loan_period_days);

        Self {
            catalog: catalog::CatalogService::new(repository.clone()),
            members: members::MembersService::new(repository.clone()),
            loans: loans::LoansService::new(repository.clone()),
            lending: lending::LendingService::new(store.clone(), policy, notifications.clone()),
            reports: reports::ReportsService::new(store),
            notifications,
            repository,
        }
    }

    /// Check database connectivity
    pub async fn ping(&self) -> AppResult<()> {
        self.repository.ping().await
    }
}

/// Current calendar date (UTC) used for loan, return and overdue dates
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}
