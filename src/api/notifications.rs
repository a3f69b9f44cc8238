//! Notification triggers

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    error::{AppError, AppResult},
    services::{notifications::NotificationJob, today},
};

#[derive(Debug, Deserialize, IntoParams)]
pub struct OverdueScanQuery {
    /// Reference date, defaults to today
    pub as_of: Option<NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ScanQueuedResponse {
    pub status: String,
    pub as_of: NaiveDate,
}

/// Queue an overdue scan outside the regular schedule
#[utoipa::path(
    post,
    path = "/notifications/overdue-scan",
    tag = "notifications",
    params(OverdueScanQuery),
    responses(
        (status = 202, description = "Scan queued", body = ScanQueuedResponse),
        (status = 500, description = "Notification queue unavailable", body = crate::error::ErrorResponse)
    )
)]
pub async fn trigger_overdue_scan(
    State(state): State<crate::AppState>,
    Query(query): Query<OverdueScanQuery>,
) -> AppResult<(StatusCode, Json<ScanQueuedResponse>)> {
    let as_of = query.as_of.unwrap_or_else(today);

    if !state
        .services
        .notifications
        .enqueue(NotificationJob::OverdueScan { as_of })
    {
        return Err(AppError::Internal("Notification queue unavailable".to_string()));
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(ScanQueuedResponse {
            status: "Overdue scan queued.".to_string(),
            as_of,
        }),
    ))
}
