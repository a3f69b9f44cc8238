//! Shared fixtures: an in-memory lending store, a recording mailer and a
//! router wired to them.

#![allow(dead_code)]

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use axum::Router;
use chrono::NaiveDate;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::mpsc;

use lending_server::{
    api,
    config::{AppConfig, LendingConfig},
    error::{AppError, AppResult},
    models::{Book, Loan, LoanNotice, LoanTerms, OverdueMember, TopActiveMember},
    repository::{lending::LendingStore, Repository},
    services::{
        email::{EmailMessage, Mailer},
        notifications::{NotificationJob, NotificationQueue},
        Services,
    },
    AppState,
};

#[derive(Default)]
struct Tables {
    books: BTreeMap<i32, Book>,
    members: BTreeMap<i32, (String, String)>,
    loans: BTreeMap<i32, Loan>,
    next_loan_id: i32,
}

/// Lending store kept in memory, applying the same model rules as the
/// Postgres store.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_book(&self, id: i32, title: &str, total_copies: i32) {
        self.tables.lock().unwrap().books.insert(
            id,
            Book {
                id,
                title: title.to_string(),
                author_id: 1,
                isbn: None,
                genre: None,
                published_date: None,
                total_copies,
                available_copies: total_copies,
            },
        );
    }

    pub fn add_member(&self, id: i32, username: &str) {
        self.tables
            .lock()
            .unwrap()
            .members
            .insert(id, (username.to_string(), format!("{}@example.org", username)));
    }

    pub fn book(&self, id: i32) -> Book {
        self.tables.lock().unwrap().books[&id].clone()
    }

    pub fn loans(&self) -> Vec<Loan> {
        self.tables.lock().unwrap().loans.values().cloned().collect()
    }
}

#[async_trait]
impl LendingStore for MemoryStore {
    async fn issue_loan(&self, book_id: i32, member_id: i32, terms: LoanTerms) -> AppResult<Loan> {
        let mut tables = self.tables.lock().unwrap();

        let mut book = tables
            .books
            .get(&book_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", book_id)))?;
        book.reserve_copy()?;
        if !tables.members.contains_key(&member_id) {
            return Err(AppError::UnknownReference("Member does not exist.".to_string()));
        }

        tables.next_loan_id += 1;
        let loan = Loan {
            id: tables.next_loan_id,
            book_id,
            member_id,
            loan_date: terms.loan_date,
            due_date: terms.due_date,
            return_date: None,
            is_returned: false,
        };
        tables.loans.insert(loan.id, loan.clone());
        tables.books.insert(book_id, book);
        Ok(loan)
    }

    async fn return_loan(&self, book_id: i32, member_id: i32, returned_on: NaiveDate) -> AppResult<Loan> {
        let mut tables = self.tables.lock().unwrap();

        let mut book = tables
            .books
            .get(&book_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", book_id)))?;
        let mut loan = tables
            .loans
            .values()
            .find(|l| l.book_id == book_id && l.member_id == member_id && l.is_active())
            .cloned()
            .ok_or_else(|| AppError::UnknownReference("Active loan does not exist.".to_string()))?;

        loan.close(returned_on)?;
        book.release_copy()?;

        tables.loans.insert(loan.id, loan.clone());
        tables.books.insert(book_id, book);
        Ok(loan)
    }

    async fn extend_loan(&self, loan_id: i32, additional_days: u32) -> AppResult<Loan> {
        let mut tables = self.tables.lock().unwrap();
        let loan = tables
            .loans
            .get_mut(&loan_id)
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", loan_id)))?;
        loan.extend(additional_days)?;
        Ok(loan.clone())
    }

    async fn loan_notice(&self, loan_id: i32) -> AppResult<Option<LoanNotice>> {
        let tables = self.tables.lock().unwrap();
        let notice = tables.loans.get(&loan_id).and_then(|loan| {
            let book = tables.books.get(&loan.book_id)?;
            let (username, email) = tables.members.get(&loan.member_id)?;
            Some(LoanNotice {
                loan_id,
                member_id: loan.member_id,
                username: username.clone(),
                email: email.clone(),
                book_title: book.title.clone(),
                due_date: loan.due_date,
            })
        });
        Ok(notice)
    }

    async fn top_active_members(&self) -> AppResult<Vec<TopActiveMember>> {
        let tables = self.tables.lock().unwrap();
        let mut rows: Vec<TopActiveMember> = tables
            .members
            .iter()
            .filter_map(|(id, (username, email))| {
                let count = tables
                    .loans
                    .values()
                    .filter(|l| l.member_id == *id && l.is_returned)
                    .count() as i64;
                (count > 0).then(|| TopActiveMember {
                    member_id: *id,
                    username: username.clone(),
                    email: email.clone(),
                    number_of_active_loans: count,
                })
            })
            .collect();
        rows.sort_by(|a, b| {
            b.number_of_active_loans
                .cmp(&a.number_of_active_loans)
                .then(a.member_id.cmp(&b.member_id))
        });
        Ok(rows)
    }

    async fn overdue_members(&self, as_of: NaiveDate) -> AppResult<Vec<OverdueMember>> {
        let tables = self.tables.lock().unwrap();
        let rows = tables
            .members
            .iter()
            .filter_map(|(id, (username, email))| {
                let count = tables
                    .loans
                    .values()
                    .filter(|l| l.member_id == *id && l.is_overdue(as_of))
                    .count() as i64;
                (count > 0).then(|| OverdueMember {
                    member_id: *id,
                    username: username.clone(),
                    email: email.clone(),
                    overdue_count: count,
                })
            })
            .collect();
        Ok(rows)
    }
}

/// Keeps every message instead of sending it
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<EmailMessage>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &EmailMessage) -> AppResult<()> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// Router backed by `store`. CRUD routes need a database; the lazy pool
/// never connects unless one of them is called.
pub fn test_app(store: Arc<MemoryStore>) -> (Router, mpsc::Receiver<NotificationJob>) {
    let config = AppConfig::default();
    let pool = PgPoolOptions::new()
        .connect_lazy(&config.database.url)
        .expect("lazy pool");

    let (queue, receiver) = NotificationQueue::bounded(16);
    let services = Services::new(
        Repository::new(pool),
        store,
        &LendingConfig::default(),
        queue,
    );

    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    };

    (api::router(state), receiver)
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}
