//! Loan lifecycle: issue, return and extend.

use std::sync::Arc;

use crate::{
    error::AppResult,
    models::{Loan, LoanPolicy},
    repository::lending::LendingStore,
};

use super::{
    notifications::{NotificationJob, NotificationQueue},
    today,
};

#[derive(Clone)]
pub struct LendingService {
    store: Arc<dyn LendingStore>,
    policy: LoanPolicy,
    notifications: NotificationQueue,
}

impl LendingService {
    pub fn new(store: Arc<dyn LendingStore>, policy: LoanPolicy, notifications: NotificationQueue) -> Self {
        Self {
            store,
            policy,
            notifications,
        }
    }

    /// Lend one copy of a book to a member and queue the confirmation email.
    /// The loan stands even if the confirmation cannot be queued.
    pub async fn issue(&self, book_id: i32, member_id: i32) -> AppResult<Loan> {
        let terms = self.policy.terms(today())?;
        let loan = self.store.issue_loan(book_id, member_id, terms).await?;

        tracing::info!(
            loan_id = loan.id,
            book_id,
            member_id,
            due_date = %loan.due_date,
            "Loan issued"
        );

        self.notifications
            .enqueue(NotificationJob::LoanIssued { loan_id: loan.id });

        Ok(loan)
    }

    /// Close the member's active loan of a book
    pub async fn return_book(&self, book_id: i32, member_id: i32) -> AppResult<Loan> {
        let loan = self.store.return_loan(book_id, member_id, today()).await?;
        tracing::info!(loan_id = loan.id, book_id, member_id, "Loan returned");
        Ok(loan)
    }

    /// Push a loan's due date back. Validation of the requested duration
    /// happens before this call.
    pub async fn extend(&self, loan_id: i32, additional_days: u32) -> AppResult<Loan> {
        let loan = self.store.extend_loan(loan_id, additional_days).await?;
        tracing::info!(loan_id, additional_days, due_date = %loan.due_date, "Loan extended");
        Ok(loan)
    }
}
