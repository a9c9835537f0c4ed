//! Fine endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::fine::{CreateFine, Fine, FineFilter},
    AppState,
};

use super::AuthenticatedUser;

/// List fines; members only see their own
#[utoipa::path(
    get,
    path = "/fines",
    tag = "fines",
    security(("bearer_auth" = [])),
    params(FineFilter),
    responses(
        (status = 200, description = "Fines", body = Vec<Fine>)
    )
)]
pub async fn list_fines(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Query(filter): Query<FineFilter>,
) -> AppResult<Json<Vec<Fine>>> {
    Ok(Json(state.services.fines.list(&caller, filter).await?))
}

#[utoipa::path(
    get,
    path = "/fines/unpaid",
    tag = "fines",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Unpaid fines", body = Vec<Fine>),
        (status = 403, description = "Admin only")
    )
)]
pub async fn unpaid_fines(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
) -> AppResult<Json<Vec<Fine>>> {
    Ok(Json(state.services.fines.unpaid_fines(&caller).await?))
}

#[utoipa::path(
    get,
    path = "/fines/{id}",
    tag = "fines",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Fine ID")),
    responses(
        (status = 200, description = "Fine", body = Fine),
        (status = 404, description = "Fine not found")
    )
)]
pub async fn get_fine(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Fine>> {
    Ok(Json(state.services.fines.get(&caller, id).await?))
}

/// Issue a manual fine (admin)
#[utoipa::path(
    post,
    path = "/fines",
    tag = "fines",
    security(("bearer_auth" = [])),
    request_body = CreateFine,
    responses(
        (status = 201, description = "Fine issued", body = Fine),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn create_fine(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Json(request): Json<CreateFine>,
) -> AppResult<(StatusCode, Json<Fine>)> {
    let fine = state.services.fines.create(&caller, request).await?;
    Ok((StatusCode::CREATED, Json(fine)))
}

/// Record payment (admin)
#[utoipa::path(
    post,
    path = "/fines/{id}/pay",
    tag = "fines",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Fine ID")),
    responses(
        (status = 200, description = "Fine paid", body = Fine),
        (status = 404, description = "Fine not found"),
        (status = 409, description = "Already paid")
    )
)]
pub async fn pay_fine(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Fine>> {
    Ok(Json(state.services.fines.mark_paid(&caller, id).await?))
}

#[utoipa::path(
    delete,
    path = "/fines/{id}",
    tag = "fines",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Fine ID")),
    responses(
        (status = 204, description = "Fine deleted"),
        (status = 404, description = "Fine not found")
    )
)]
pub async fn delete_fine(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    state.services.fines.delete(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
