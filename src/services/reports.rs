//! Per-member loan reports

use std::sync::Arc;

use chrono::NaiveDate;

use crate::{
    error::AppResult,
    models::{OverdueMember, TopActiveMember},
    repository::lending::LendingStore,
};

#[derive(Clone)]
pub struct ReportsService {
    store: Arc<dyn LendingStore>,
}

impl ReportsService {
    pub fn new(store: Arc<dyn LendingStore>) -> Self {
        Self { store }
    }

    /// Members with at least one returned loan, most returns first
    pub async fn top_active_members(&self) -> AppResult<Vec<TopActiveMember>> {
        self.store.top_active_members().await
    }

    pub async fn overdue_members(&self, as_of: NaiveDate) -> AppResult<Vec<OverdueMember>> {
        self.store.overdue_members(as_of).await
    }
}
