//! Loan model, lending policy and due-date arithmetic

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::ValidationError;

use crate::error::{AppError, AppResult};

const SECONDS_PER_DAY: i64 = 86_400;

/// Loan record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    pub id: i32,
    pub book_id: i32,
    pub member_id: i32,
    pub loan_date: NaiveDate,
    pub due_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub is_returned: bool,
}

impl Loan {
    pub fn is_active(&self) -> bool {
        !self.is_returned
    }

    /// Unreturned and past its due date
    pub fn is_overdue(&self, as_of: NaiveDate) -> bool {
        self.is_active() && self.due_date < as_of
    }

    /// Mark the loan returned. `return_date` is written exactly once.
    pub fn close(&mut self, returned_on: NaiveDate) -> AppResult<()> {
        if self.is_returned {
            return Err(AppError::Conflict(format!("Loan {} is already returned", self.id)));
        }
        self.is_returned = true;
        self.return_date = Some(returned_on);
        Ok(())
    }

    /// Push the due date back. Returned loans are extended as well.
    pub fn extend(&mut self, additional_days: u32) -> AppResult<()> {
        self.due_date = self
            .due_date
            .checked_add_days(Days::new(u64::from(additional_days)))
            .ok_or_else(|| AppError::Validation("Extended due date is out of range".to_string()))?;
        Ok(())
    }

    /// Move the due date to an explicit value
    pub fn reschedule(&mut self, due_date: NaiveDate) -> AppResult<()> {
        if due_date < self.loan_date {
            return Err(AppError::Validation(
                "due_date cannot be earlier than loan_date".to_string(),
            ));
        }
        self.due_date = due_date;
        Ok(())
    }
}

/// Dates assigned to a newly issued loan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoanTerms {
    pub loan_date: NaiveDate,
    pub due_date: NaiveDate,
}

/// Lending rules applied when a loan is issued
#[derive(Debug, Clone, Copy)]
pub struct LoanPolicy {
    pub period_days: u32,
}

impl LoanPolicy {
    pub fn new(period_days: u32) -> Self {
        Self { period_days }
    }

    pub fn terms(&self, today: NaiveDate) -> AppResult<LoanTerms> {
        let due_date = today
            .checked_add_days(Days::new(u64::from(self.period_days)))
            .ok_or_else(|| {
                AppError::Internal(format!(
                    "Loan period of {} days is out of range",
                    self.period_days
                ))
            })?;
        Ok(LoanTerms {
            loan_date: today,
            due_date,
        })
    }
}

/// Everything needed to write the loan confirmation message
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct LoanNotice {
    pub loan_id: i32,
    pub member_id: i32,
    pub username: String,
    pub email: String,
    pub book_title: String,
    pub due_date: NaiveDate,
}

/// Update loan request. Only the due date is editable; lending state moves
/// through issue, return and extend.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateLoan {
    pub due_date: Option<NaiveDate>,
}

/// Loan list filters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct LoanQuery {
    pub book_id: Option<i32>,
    pub member_id: Option<i32>,
    pub is_returned: Option<bool>,
}

/// A loan extension: whole days, or a duration string
/// (`"P5D"`, `"P2W"`, `"5 days"`, `"5 00:00:00"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum DurationInput {
    Days(i64),
    Text(String),
}

impl DurationInput {
    /// Whole days in the duration; any time-of-day remainder is dropped.
    pub fn whole_days(&self) -> Result<u32, String> {
        let seconds = match self {
            DurationInput::Days(days) => days
                .checked_mul(SECONDS_PER_DAY)
                .ok_or_else(out_of_range)?,
            DurationInput::Text(text) => parse_duration_seconds(text)?,
        };
        if seconds < 0 {
            return Err("additional_days must not be negative".to_string());
        }
        u32::try_from(seconds / SECONDS_PER_DAY).map_err(|_| out_of_range())
    }
}

/// Validator hook for request bodies carrying a [`DurationInput`]
pub fn validate_duration(input: &DurationInput) -> Result<(), ValidationError> {
    input.whole_days().map(|_| ()).map_err(|message| {
        let mut error = ValidationError::new("duration");
        error.message = Some(message.into());
        error
    })
}

fn malformed() -> String {
    "additional_days is not a valid duration".to_string()
}

fn out_of_range() -> String {
    "additional_days is out of range".to_string()
}

fn parse_duration_seconds(text: &str) -> Result<i64, String> {
    let text = text.trim();
    if text.is_empty() {
        return Err(malformed());
    }
    if text.starts_with('-') {
        return Err("additional_days must not be negative".to_string());
    }
    if let Some(rest) = text.strip_prefix(['P', 'p']) {
        return parse_iso8601(rest);
    }
    if let Ok(days) = text.parse::<i64>() {
        return days.checked_mul(SECONDS_PER_DAY).ok_or_else(out_of_range);
    }

    // "<days> day(s)[, HH:MM:SS]", "<days> HH:MM:SS" or a bare clock
    let (days, clock) = match text.split_once(' ') {
        Some((days, rest)) => {
            let rest = rest.trim_start();
            let rest = rest
                .strip_prefix("days")
                .or_else(|| rest.strip_prefix("day"))
                .unwrap_or(rest);
            let rest = rest.trim_start_matches(',').trim();
            (days.parse::<i64>().map_err(|_| malformed())?, rest)
        }
        None => (0, text),
    };

    let clock_seconds = if clock.is_empty() { 0 } else { parse_clock(clock)? };
    days.checked_mul(SECONDS_PER_DAY)
        .and_then(|s| s.checked_add(clock_seconds))
        .ok_or_else(out_of_range)
}

/// `HH:MM:SS`, `MM:SS` or `SS`, with an optional fractional second part
fn parse_clock(clock: &str) -> Result<i64, String> {
    let clock = clock.split(['.', ',']).next().unwrap_or(clock);
    let fields: Vec<&str> = clock.split(':').collect();
    if fields.is_empty() || fields.len() > 3 {
        return Err(malformed());
    }
    fields.iter().try_fold(0i64, |acc, field| {
        let value: i64 = field.parse().map_err(|_| malformed())?;
        if value < 0 {
            return Err(malformed());
        }
        acc.checked_mul(60)
            .and_then(|a| a.checked_add(value))
            .ok_or_else(out_of_range)
    })
}

fn parse_iso8601(rest: &str) -> Result<i64, String> {
    let mut total: i64 = 0;
    let mut number = String::new();
    let mut in_time = false;
    let mut any_component = false;

    for c in rest.chars() {
        match c {
            '0'..='9' => number.push(c),
            'T' | 't' if number.is_empty() && !in_time => in_time = true,
            unit => {
                let value: i64 = number.parse().map_err(|_| malformed())?;
                number.clear();
                let scale = match (in_time, unit.to_ascii_uppercase()) {
                    (false, 'W') => 7 * SECONDS_PER_DAY,
                    (false, 'D') => SECONDS_PER_DAY,
                    (true, 'H') => 3_600,
                    (true, 'M') => 60,
                    (true, 'S') => 1,
                    _ => return Err(malformed()),
                };
                total = value
                    .checked_mul(scale)
                    .and_then(|s| total.checked_add(s))
                    .ok_or_else(out_of_range)?;
                any_component = true;
            }
        }
    }

    if !number.is_empty() || !any_component {
        return Err(malformed());
    }
    Ok(total)
}
