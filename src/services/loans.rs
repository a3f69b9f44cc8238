//! Loan record service (list, retrieve, edit, delete)

use crate::{
    error::AppResult,
    models::loan::{Loan, LoanQuery, UpdateLoan},
    repository::Repository,
};

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
}

impl LoansService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn list(&self, query: &LoanQuery) -> AppResult<Vec<Loan>> {
        self.repository.loans.list(query).await
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Loan> {
        self.repository.loans.get_by_id(id).await
    }

    pub async fn update(&self, id: i32, data: &UpdateLoan) -> AppResult<Loan> {
        self.repository.loans.update(id, data).await
    }

    pub async fn delete(&self, id: i32) -> AppResult<()> {
        self.repository.loans.delete(id).await
    }
}
