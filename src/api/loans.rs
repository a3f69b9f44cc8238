//! Loan API endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::loan::{DurationInput, Loan, LoanQuery, UpdateLoan},
};

use super::books::LoanActionResponse;

/// Create loan request
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateLoanRequest {
    pub book_id: i32,
    pub member_id: i32,
}

/// Due date extension request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ExtendLoanRequest {
    /// Whole days, or a duration such as `"P5D"` or `"5 days"`
    #[validate(custom(function = "crate::models::loan::validate_duration"))]
    pub additional_days: DurationInput,
}

/// List loans
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    params(LoanQuery),
    responses(
        (status = 200, description = "Loan list", body = Vec<Loan>)
    )
)]
pub async fn list_loans(
    State(state): State<crate::AppState>,
    Query(query): Query<LoanQuery>,
) -> AppResult<Json<Vec<Loan>>> {
    let loans = state.services.loans.list(&query).await?;
    Ok(Json(loans))
}

/// Get loan by ID
#[utoipa::path(
    get,
    path = "/loans/{id}",
    tag = "loans",
    params(("id" = i32, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Loan details", body = Loan),
        (status = 404, description = "Loan not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_loan(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<Loan>> {
    let loan = state.services.loans.get_by_id(id).await?;
    Ok(Json(loan))
}

/// Create a loan (same rules as lending a book)
#[utoipa::path(
    post,
    path = "/loans",
    tag = "loans",
    request_body = CreateLoanRequest,
    responses(
        (status = 201, description = "Loan created", body = Loan),
        (status = 400, description = "No copy available or unknown member", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_loan(
    State(state): State<crate::AppState>,
    WithRejection(Json(data), _): WithRejection<Json<CreateLoanRequest>, AppError>,
) -> AppResult<(StatusCode, Json<Loan>)> {
    let loan = state.services.lending.issue(data.book_id, data.member_id).await?;
    Ok((StatusCode::CREATED, Json(loan)))
}

/// Change a loan's due date
#[utoipa::path(
    put,
    path = "/loans/{id}",
    tag = "loans",
    params(("id" = i32, Path, description = "Loan ID")),
    request_body = UpdateLoan,
    responses(
        (status = 200, description = "Loan updated", body = Loan),
        (status = 400, description = "Due date before loan date", body = crate::error::ErrorResponse),
        (status = 404, description = "Loan not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_loan(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
    WithRejection(Json(data), _): WithRejection<Json<UpdateLoan>, AppError>,
) -> AppResult<Json<Loan>> {
    let loan = state.services.loans.update(id, &data).await?;
    Ok(Json(loan))
}

/// Delete a loan. An active loan gives its copy back.
#[utoipa::path(
    delete,
    path = "/loans/{id}",
    tag = "loans",
    params(("id" = i32, Path, description = "Loan ID")),
    responses(
        (status = 204, description = "Loan deleted"),
        (status = 404, description = "Loan not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_loan(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    state.services.loans.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Push a loan's due date back
#[utoipa::path(
    post,
    path = "/loans/{id}/extend-due-date",
    tag = "loans",
    params(("id" = i32, Path, description = "Loan ID")),
    request_body = ExtendLoanRequest,
    responses(
        (status = 200, description = "Due date extended", body = LoanActionResponse),
        (status = 400, description = "Invalid duration", body = crate::error::ErrorResponse),
        (status = 404, description = "Loan not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn extend_due_date(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
    WithRejection(Json(data), _): WithRejection<Json<ExtendLoanRequest>, AppError>,
) -> AppResult<Json<LoanActionResponse>> {
    data.validate()?;
    let additional_days = data
        .additional_days
        .whole_days()
        .map_err(AppError::Validation)?;

    let loan = state.services.lending.extend(id, additional_days).await?;
    Ok(Json(LoanActionResponse {
        status: "Loan due date extended.".to_string(),
        loan,
    }))
}
