//! Loan lifecycle and aggregation queries.
//!
//! Every state change runs in a single transaction. The book row is locked
//! before any loan row so concurrent issue/return calls on the same book
//! serialize on the copy counter and cannot deadlock each other.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgConnection, Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{Book, Loan, LoanNotice, LoanTerms, OverdueMember, TopActiveMember},
};

/// Store operations behind the loan lifecycle and member reports
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LendingStore: Send + Sync {
    /// Take one copy of the book and open a loan for the member.
    /// Checks, in order: book exists, a copy is available, member exists.
    async fn issue_loan(&self, book_id: i32, member_id: i32, terms: LoanTerms) -> AppResult<Loan>;

    /// Close the member's active loan of the book and put the copy back
    async fn return_loan(&self, book_id: i32, member_id: i32, returned_on: NaiveDate) -> AppResult<Loan>;

    /// Push a loan's due date back by whole days
    async fn extend_loan(&self, loan_id: i32, additional_days: u32) -> AppResult<Loan>;

    /// Loan confirmation details, `None` when the loan no longer exists
    async fn loan_notice(&self, loan_id: i32) -> AppResult<Option<LoanNotice>>;

    /// Members ranked by their count of returned loans
    async fn top_active_members(&self) -> AppResult<Vec<TopActiveMember>>;

    /// Members with unreturned loans due strictly before `as_of`
    async fn overdue_members(&self, as_of: NaiveDate) -> AppResult<Vec<OverdueMember>>;
}

#[derive(Clone)]
pub struct PgLendingStore {
    pool: Pool<Postgres>,
}

impl PgLendingStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

pub(super) async fn lock_book(conn: &mut PgConnection, book_id: i32) -> AppResult<Book> {
    sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1 FOR UPDATE")
        .bind(book_id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", book_id)))
}

pub(super) async fn lock_loan(conn: &mut PgConnection, loan_id: i32) -> AppResult<Loan> {
    sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1 FOR UPDATE")
        .bind(loan_id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", loan_id)))
}

pub(super) async fn store_available_copies(conn: &mut PgConnection, book: &Book) -> AppResult<()> {
    sqlx::query("UPDATE books SET available_copies = $2 WHERE id = $1")
        .bind(book.id)
        .bind(book.available_copies)
        .execute(conn)
        .await?;
    Ok(())
}

pub(super) async fn store_loan(conn: &mut PgConnection, loan: &Loan) -> AppResult<Loan> {
    let row = sqlx::query_as::<_, Loan>(
        r#"
        UPDATE loans
        SET due_date = $2, return_date = $3, is_returned = $4
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(loan.id)
    .bind(loan.due_date)
    .bind(loan.return_date)
    .bind(loan.is_returned)
    .fetch_one(conn)
    .await?;
    Ok(row)
}

#[async_trait]
impl LendingStore for PgLendingStore {
    async fn issue_loan(&self, book_id: i32, member_id: i32, terms: LoanTerms) -> AppResult<Loan> {
        let mut tx = self.pool.begin().await?;

        let mut book = lock_book(&mut tx, book_id).await?;
        book.reserve_copy()?;

        let member_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM members WHERE id = $1)")
                .bind(member_id)
                .fetch_one(&mut *tx)
                .await?;
        if !member_exists {
            return Err(AppError::UnknownReference("Member does not exist.".to_string()));
        }

        let loan = sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO loans (book_id, member_id, loan_date, due_date, is_returned)
            VALUES ($1, $2, $3, $4, FALSE)
            RETURNING *
            "#,
        )
        .bind(book_id)
        .bind(member_id)
        .bind(terms.loan_date)
        .bind(terms.due_date)
        .fetch_one(&mut *tx)
        .await?;

        store_available_copies(&mut tx, &book).await?;
        tx.commit().await?;

        Ok(loan)
    }

    async fn return_loan(&self, book_id: i32, member_id: i32, returned_on: NaiveDate) -> AppResult<Loan> {
        let mut tx = self.pool.begin().await?;

        let mut book = lock_book(&mut tx, book_id).await?;

        let mut loan = sqlx::query_as::<_, Loan>(
            r#"
            SELECT * FROM loans
            WHERE book_id = $1 AND member_id = $2 AND is_returned = FALSE
            ORDER BY id
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(book_id)
        .bind(member_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::UnknownReference("Active loan does not exist.".to_string()))?;

        loan.close(returned_on)?;
        book.release_copy()?;

        let loan = store_loan(&mut tx, &loan).await?;
        store_available_copies(&mut tx, &book).await?;
        tx.commit().await?;

        Ok(loan)
    }

    async fn extend_loan(&self, loan_id: i32, additional_days: u32) -> AppResult<Loan> {
        let mut tx = self.pool.begin().await?;

        let mut loan = lock_loan(&mut tx, loan_id).await?;
        loan.extend(additional_days)?;
        let loan = store_loan(&mut tx, &loan).await?;

        tx.commit().await?;
        Ok(loan)
    }

    async fn loan_notice(&self, loan_id: i32) -> AppResult<Option<LoanNotice>> {
        let notice = sqlx::query_as::<_, LoanNotice>(
            r#"
            SELECT l.id AS loan_id, m.id AS member_id, u.username, u.email,
                   b.title AS book_title, l.due_date
            FROM loans l
            JOIN books b ON b.id = l.book_id
            JOIN members m ON m.id = l.member_id
            JOIN users u ON u.id = m.user_id
            WHERE l.id = $1
            "#,
        )
        .bind(loan_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(notice)
    }

    async fn top_active_members(&self) -> AppResult<Vec<TopActiveMember>> {
        let rows = sqlx::query_as::<_, TopActiveMember>(
            r#"
            SELECT m.id AS member_id, u.username, u.email,
                   COUNT(DISTINCT l.id) AS number_of_active_loans
            FROM members m
            JOIN users u ON u.id = m.user_id
            JOIN loans l ON l.member_id = m.id AND l.is_returned = TRUE
            GROUP BY m.id, u.username, u.email
            ORDER BY number_of_active_loans DESC, m.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn overdue_members(&self, as_of: NaiveDate) -> AppResult<Vec<OverdueMember>> {
        let rows = sqlx::query_as::<_, OverdueMember>(
            r#"
            SELECT m.id AS member_id, u.username, u.email,
                   COUNT(l.id) AS overdue_count
            FROM members m
            JOIN users u ON u.id = m.user_id
            JOIN loans l ON l.member_id = m.id
            WHERE l.is_returned = FALSE AND l.due_date < $1
            GROUP BY m.id, u.username, u.email
            ORDER BY m.id
            "#,
        )
        .bind(as_of)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
