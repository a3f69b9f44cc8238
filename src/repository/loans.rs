//! Loans repository for record-level operations. Issue, return and extend
//! live in [`super::lending`].

use sqlx::{Pool, Postgres};

use super::lending::{lock_loan, store_available_copies, store_loan};
use crate::{
    error::{AppError, AppResult},
    models::{
        loan::{Loan, LoanQuery, UpdateLoan},
        Book,
    },
};

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// List loans, newest first, optionally filtered
    pub async fn list(&self, query: &LoanQuery) -> AppResult<Vec<Loan>> {
        let mut conditions = Vec::new();
        let mut idx = 1;

        if query.book_id.is_some() {
            conditions.push(format!("book_id = ${}", idx));
            idx += 1;
        }
        if query.member_id.is_some() {
            conditions.push(format!("member_id = ${}", idx));
            idx += 1;
        }
        if query.is_returned.is_some() {
            conditions.push(format!("is_returned = ${}", idx));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let sql = format!("SELECT * FROM loans {} ORDER BY loan_date DESC, id DESC", where_clause);

        let mut builder = sqlx::query_as::<_, Loan>(&sql);
        if let Some(book_id) = query.book_id {
            builder = builder.bind(book_id);
        }
        if let Some(member_id) = query.member_id {
            builder = builder.bind(member_id);
        }
        if let Some(is_returned) = query.is_returned {
            builder = builder.bind(is_returned);
        }

        let rows = builder.fetch_all(&self.pool).await?;
        Ok(rows)
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
    }

    pub async fn update(&self, id: i32, data: &UpdateLoan) -> AppResult<Loan> {
        let mut tx = self.pool.begin().await?;

        let mut loan = lock_loan(&mut tx, id).await?;
        if let Some(due_date) = data.due_date {
            loan.reschedule(due_date)?;
        }
        let loan = store_loan(&mut tx, &loan).await?;

        tx.commit().await?;
        Ok(loan)
    }

    /// Delete a loan. An active loan gives its copy back to the book.
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        // Book first, matching the lock order of issue and return
        let book = sqlx::query_as::<_, Book>(
            r#"
            SELECT b.* FROM books b
            JOIN loans l ON l.book_id = b.id
            WHERE l.id = $1
            FOR UPDATE OF b
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let loan = lock_loan(&mut tx, id).await?;

        if loan.is_active() {
            let mut book = book.ok_or_else(|| {
                AppError::Internal(format!("Loan {} references a missing book", id))
            })?;
            book.release_copy()?;
            store_available_copies(&mut tx, &book).await?;
        }

        sqlx::query("DELETE FROM loans WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
