//! API handlers for the lending REST endpoints

pub mod authors;
pub mod books;
pub mod health;
pub mod loans;
pub mod members;
pub mod notifications;
pub mod openapi;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::AppState;

/// Create the application router with all routes
pub fn router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // API v1 routes
    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Authors
        .route("/authors", get(authors::list_authors).post(authors::create_author))
        .route(
            "/authors/:id",
            get(authors::get_author)
                .put(authors::update_author)
                .delete(authors::delete_author),
        )
        // Books
        .route("/books", get(books::list_books).post(books::create_book))
        .route(
            "/books/:id",
            get(books::get_book)
                .put(books::update_book)
                .delete(books::delete_book),
        )
        .route("/books/:id/loan", post(books::loan_book))
        .route("/books/:id/return", post(books::return_book))
        // Members
        .route("/members", get(members::list_members).post(members::create_member))
        .route("/members/top-active", get(members::top_active_members))
        .route("/members/overdue", get(members::overdue_members))
        .route(
            "/members/:id",
            get(members::get_member)
                .put(members::update_member)
                .delete(members::delete_member),
        )
        // Loans
        .route("/loans", get(loans::list_loans).post(loans::create_loan))
        .route(
            "/loans/:id",
            get(loans::get_loan)
                .put(loans::update_loan)
                .delete(loans::delete_loan),
        )
        .route("/loans/:id/extend-due-date", post(loans::extend_due_date))
        // Notifications
        .route(
            "/notifications/overdue-scan",
            post(notifications::trigger_overdue_scan),
        )
        .with_state(state);

    // OpenAPI documentation
    let openapi = openapi::create_openapi_router();

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
