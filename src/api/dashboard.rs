//! Dashboard endpoints

use axum::{extract::State, Json};

use crate::{
    error::AppResult,
    models::dashboard::{LibraryStats, MemberDashboard},
    AppState,
};

use super::AuthenticatedUser;

/// Library-wide figures (admin)
#[utoipa::path(
    get,
    path = "/dashboard/admin",
    tag = "dashboard",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Library statistics", body = LibraryStats),
        (status = 403, description = "Admin only")
    )
)]
pub async fn admin_dashboard(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
) -> AppResult<Json<LibraryStats>> {
    Ok(Json(state.services.dashboard.library_stats(&caller).await?))
}

/// Caller's own loans, reservations and fines
#[utoipa::path(
    get,
    path = "/dashboard/me",
    tag = "dashboard",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Member dashboard", body = MemberDashboard)
    )
)]
pub async fn member_dashboard(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
) -> AppResult<Json<MemberDashboard>> {
    Ok(Json(state.services.dashboard.member_dashboard(&caller).await?))
}
