//! Member API endpoints and per-member reports

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::WithRejection;
use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::IntoParams;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        member::{CreateMember, Member, UpdateMember},
        OverdueMember, TopActiveMember,
    },
    services::today,
};

#[derive(Debug, Deserialize, IntoParams)]
pub struct OverdueQuery {
    /// Reference date, defaults to today
    pub as_of: Option<NaiveDate>,
}

/// List members
#[utoipa::path(
    get,
    path = "/members",
    tag = "members",
    responses(
        (status = 200, description = "Member list", body = Vec<Member>)
    )
)]
pub async fn list_members(State(state): State<crate::AppState>) -> AppResult<Json<Vec<Member>>> {
    let members = state.services.members.list().await?;
    Ok(Json(members))
}

/// Get member by ID
#[utoipa::path(
    get,
    path = "/members/{id}",
    tag = "members",
    params(("id" = i32, Path, description = "Member ID")),
    responses(
        (status = 200, description = "Member details", body = Member),
        (status = 404, description = "Member not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_member(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<Member>> {
    let member = state.services.members.get_by_id(id).await?;
    Ok(Json(member))
}

/// Create a member and its user account
#[utoipa::path(
    post,
    path = "/members",
    tag = "members",
    request_body = CreateMember,
    responses(
        (status = 201, description = "Member created", body = Member),
        (status = 409, description = "Username already exists", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_member(
    State(state): State<crate::AppState>,
    WithRejection(Json(data), _): WithRejection<Json<CreateMember>, AppError>,
) -> AppResult<(StatusCode, Json<Member>)> {
    data.validate()?;
    let member = state.services.members.create(&data).await?;
    Ok((StatusCode::CREATED, Json(member)))
}

/// Update member
#[utoipa::path(
    put,
    path = "/members/{id}",
    tag = "members",
    params(("id" = i32, Path, description = "Member ID")),
    request_body = UpdateMember,
    responses(
        (status = 200, description = "Member updated", body = Member),
        (status = 404, description = "Member not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_member(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
    WithRejection(Json(data), _): WithRejection<Json<UpdateMember>, AppError>,
) -> AppResult<Json<Member>> {
    data.validate()?;
    let member = state.services.members.update(id, &data).await?;
    Ok(Json(member))
}

/// Delete member
#[utoipa::path(
    delete,
    path = "/members/{id}",
    tag = "members",
    params(("id" = i32, Path, description = "Member ID")),
    responses(
        (status = 204, description = "Member deleted"),
        (status = 404, description = "Member not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Member has loan history", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_member(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    state.services.members.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Members ranked by returned loans
#[utoipa::path(
    get,
    path = "/members/top-active",
    tag = "members",
    responses(
        (status = 200, description = "Members with at least one returned loan", body = Vec<TopActiveMember>)
    )
)]
pub async fn top_active_members(
    State(state): State<crate::AppState>,
) -> AppResult<Json<Vec<TopActiveMember>>> {
    let members = state.services.reports.top_active_members().await?;
    Ok(Json(members))
}

/// Members holding overdue loans
#[utoipa::path(
    get,
    path = "/members/overdue",
    tag = "members",
    params(OverdueQuery),
    responses(
        (status = 200, description = "Members with overdue loans", body = Vec<OverdueMember>)
    )
)]
pub async fn overdue_members(
    State(state): State<crate::AppState>,
    Query(query): Query<OverdueQuery>,
) -> AppResult<Json<Vec<OverdueMember>>> {
    let as_of = query.as_of.unwrap_or_else(today);
    let members = state.services.reports.overdue_members(as_of).await?;
    Ok(Json(members))
}
