//! Repository layer for database operations

pub mod authors;
pub mod books;
pub mod lending;
pub mod loans;
pub mod members;

use sqlx::{Pool, Postgres};

use crate::error::{AppError, AppResult};

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub authors: authors::AuthorsRepository,
    pub books: books::BooksRepository,
    pub members: members::MembersRepository,
    pub loans: loans::LoansRepository,
    pub lending: lending::PgLendingStore,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            authors: authors::AuthorsRepository::new(pool.clone()),
            books: books::BooksRepository::new(pool.clone()),
            members: members::MembersRepository::new(pool.clone()),
            loans: loans::LoansRepository::new(pool.clone()),
            lending: lending::PgLendingStore::new(pool.clone()),
            pool,
        }
    }

    /// Round-trip to the database
    pub async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Statement kind, which decides what a foreign key violation means
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Statement {
    /// Insert or update: a referenced row is missing
    Upsert,
    /// Delete: other rows still reference this one
    Delete,
}

/// Map Postgres constraint violations on an insert or update to client
/// errors. `entity` names the row being written.
pub(crate) fn constraint_error(err: sqlx::Error, entity: &str) -> AppError {
    map_violation(err, entity, Statement::Upsert)
}

/// Map Postgres constraint violations on a delete to client errors
pub(crate) fn delete_error(err: sqlx::Error, entity: &str) -> AppError {
    map_violation(err, entity, Statement::Delete)
}

fn map_violation(err: sqlx::Error, entity: &str, statement: Statement) -> AppError {
    let code = err
        .as_database_error()
        .and_then(|db_err| db_err.code())
        .map(|code| code.into_owned());

    match code.as_deref().and_then(|code| violation(code, entity, statement)) {
        Some(mapped) => mapped,
        None => AppError::Database(err),
    }
}

fn violation(code: &str, entity: &str, statement: Statement) -> Option<AppError> {
    match (code, statement) {
        // unique_violation
        ("23505", _) => Some(AppError::Conflict(format!("{} already exists", entity))),
        // foreign_key_violation
        ("23503", Statement::Upsert) => Some(AppError::UnknownReference(format!(
            "{} references a record that does not exist.",
            entity
        ))),
        ("23503", Statement::Delete) => Some(AppError::Conflict(format!(
            "{} is still referenced by other records",
            entity
        ))),
        // check_violation
        ("23514", _) => Some(AppError::Validation(format!("{} violates a consistency rule", entity))),
        _ => None,
    }
}
