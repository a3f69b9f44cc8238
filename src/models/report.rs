//! Per-member aggregate records

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Row of the top-active-members report.
///
/// `number_of_active_loans` counts the member's *returned* loans. The name is
/// kept for API compatibility; see DESIGN.md.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct TopActiveMember {
    pub member_id: i32,
    pub username: String,
    pub email: String,
    pub number_of_active_loans: i64,
}

/// A member holding at least one unreturned loan past its due date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct OverdueMember {
    pub member_id: i32,
    pub username: String,
    pub email: String,
    pub overdue_count: i64,
}
