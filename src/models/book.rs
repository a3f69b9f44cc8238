//! Book model and copy-availability accounting

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Book record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub author_id: i32,
    pub isbn: Option<String>,
    pub genre: Option<String>,
    pub published_date: Option<NaiveDate>,
    /// Physical copies owned by the library
    pub total_copies: i32,
    /// Copies not currently on loan
    pub available_copies: i32,
}

impl Book {
    /// Take one copy off the shelf for a new loan
    pub fn reserve_copy(&mut self) -> AppResult<()> {
        if self.available_copies < 1 {
            return Err(AppError::NotAvailable("No available copies.".to_string()));
        }
        self.available_copies -= 1;
        Ok(())
    }

    /// Put one copy back on the shelf after a return
    pub fn release_copy(&mut self) -> AppResult<()> {
        if self.available_copies >= self.total_copies {
            return Err(AppError::Conflict(format!(
                "Book {} already has all {} copies available",
                self.id, self.total_copies
            )));
        }
        self.available_copies += 1;
        Ok(())
    }

    /// Number of copies currently on loan
    pub fn copies_on_loan(&self) -> i32 {
        self.total_copies - self.available_copies
    }

    /// Change the owned copy count, shifting available copies by the same amount
    pub fn set_total_copies(&mut self, total: i32) -> AppResult<()> {
        if total < self.copies_on_loan() {
            return Err(AppError::Validation(format!(
                "total_copies cannot be lower than the {} copies currently on loan",
                self.copies_on_loan()
            )));
        }
        self.available_copies += total - self.total_copies;
        self.total_copies = total;
        Ok(())
    }
}

/// Create book request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,
    pub author_id: i32,
    #[validate(length(min = 10, max = 13, message = "ISBN must be 10 or 13 characters"))]
    pub isbn: Option<String>,
    #[validate(length(max = 50))]
    pub genre: Option<String>,
    pub published_date: Option<NaiveDate>,
    #[validate(range(min = 0, message = "total_copies must not be negative"))]
    pub total_copies: i32,
    /// Defaults to total_copies
    #[validate(range(min = 0, message = "available_copies must not be negative"))]
    pub available_copies: Option<i32>,
}

impl CreateBook {
    /// Initial available copy count, checked against the total
    pub fn initial_available_copies(&self) -> AppResult<i32> {
        let available = self.available_copies.unwrap_or(self.total_copies);
        if available > self.total_copies {
            return Err(AppError::Validation(
                "available_copies cannot exceed total_copies".to_string(),
            ));
        }
        Ok(available)
    }
}

/// Update book request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: Option<String>,
    pub author_id: Option<i32>,
    #[validate(length(min = 10, max = 13, message = "ISBN must be 10 or 13 characters"))]
    pub isbn: Option<String>,
    #[validate(length(max = 50))]
    pub genre: Option<String>,
    pub published_date: Option<NaiveDate>,
    #[validate(range(min = 0, message = "total_copies must not be negative"))]
    pub total_copies: Option<i32>,
}

/// Book list filters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct BookQuery {
    pub author_id: Option<i32>,
    /// Case-insensitive title fragment
    pub title: Option<String>,
    /// Only books with at least one copy on the shelf
    pub available: Option<bool>,
}
