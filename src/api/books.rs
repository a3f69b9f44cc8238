//! Book API endpoints, including the loan and return actions

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookQuery, CreateBook, UpdateBook},
        Loan,
    },
};

/// Body of the loan and return actions
#[derive(Debug, Deserialize, ToSchema)]
pub struct MemberRequest {
    pub member_id: i32,
}

/// Outcome of a lending action
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoanActionResponse {
    pub status: String,
    pub loan: Loan,
}

/// List books
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    params(BookQuery),
    responses(
        (status = 200, description = "Book list", body = Vec<Book>)
    )
)]
pub async fn list_books(
    State(state): State<crate::AppState>,
    Query(query): Query<BookQuery>,
) -> AppResult<Json<Vec<Book>>> {
    let books = state.services.catalog.list_books(&query).await?;
    Ok(Json(books))
}

/// Get book by ID
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    params(("id" = i32, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book details", body = Book),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_book(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<Book>> {
    let book = state.services.catalog.get_book(id).await?;
    Ok(Json(book))
}

/// Create book
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    request_body = CreateBook,
    responses(
        (status = 201, description = "Book created", body = Book),
        (status = 400, description = "Invalid book or unknown author", body = crate::error::ErrorResponse),
        (status = 409, description = "ISBN already exists", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_book(
    State(state): State<crate::AppState>,
    WithRejection(Json(data), _): WithRejection<Json<CreateBook>, AppError>,
) -> AppResult<(StatusCode, Json<Book>)> {
    data.validate()?;
    let book = state.services.catalog.create_book(&data).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

/// Update book
#[utoipa::path(
    put,
    path = "/books/{id}",
    tag = "books",
    params(("id" = i32, Path, description = "Book ID")),
    request_body = UpdateBook,
    responses(
        (status = 200, description = "Book updated", body = Book),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_book(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
    WithRejection(Json(data), _): WithRejection<Json<UpdateBook>, AppError>,
) -> AppResult<Json<Book>> {
    data.validate()?;
    let book = state.services.catalog.update_book(id, &data).await?;
    Ok(Json(book))
}

/// Delete book
#[utoipa::path(
    delete,
    path = "/books/{id}",
    tag = "books",
    params(("id" = i32, Path, description = "Book ID")),
    responses(
        (status = 204, description = "Book deleted"),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Book has loan history", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_book(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    state.services.catalog.delete_book(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Lend one copy of the book to a member
#[utoipa::path(
    post,
    path = "/books/{id}/loan",
    tag = "books",
    params(("id" = i32, Path, description = "Book ID")),
    request_body = MemberRequest,
    responses(
        (status = 201, description = "Book loaned", body = LoanActionResponse),
        (status = 400, description = "No copy available or unknown member", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn loan_book(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
    WithRejection(Json(data), _): WithRejection<Json<MemberRequest>, AppError>,
) -> AppResult<(StatusCode, Json<LoanActionResponse>)> {
    let loan = state.services.lending.issue(id, data.member_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(LoanActionResponse {
            status: "Book loaned successfully.".to_string(),
            loan,
        }),
    ))
}

/// Return the member's active loan of the book
#[utoipa::path(
    post,
    path = "/books/{id}/return",
    tag = "books",
    params(("id" = i32, Path, description = "Book ID")),
    request_body = MemberRequest,
    responses(
        (status = 200, description = "Book returned", body = LoanActionResponse),
        (status = 400, description = "No active loan", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_book(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
    WithRejection(Json(data), _): WithRejection<Json<MemberRequest>, AppError>,
) -> AppResult<Json<LoanActionResponse>> {
    let loan = state.services.lending.return_book(id, data.member_id).await?;
    Ok(Json(LoanActionResponse {
        status: "Book returned successfully.".to_string(),
        loan,
    }))
}
