//! Member management endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::{
        fine::Fine,
        loan::LoanResponse,
        member::{CreateMember, Member, MemberQuery, UpdateMember},
    },
    AppState,
};

use super::AuthenticatedUser;

/// Search members (admin)
#[utoipa::path(
    get,
    path = "/members",
    tag = "members",
    security(("bearer_auth" = [])),
    params(MemberQuery),
    responses(
        (status = 200, description = "Matching members", body = Vec<Member>),
        (status = 403, description = "Admin only")
    )
)]
pub async fn list_members(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Query(query): Query<MemberQuery>,
) -> AppResult<Json<Vec<Member>>> {
    Ok(Json(state.services.members.search(&caller, &query).await?))
}

/// Member record of the caller, created on first use
#[utoipa::path(
    get,
    path = "/members/me",
    tag = "members",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Caller's member record", body = Member)
    )
)]
pub async fn me(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
) -> AppResult<Json<Member>> {
    Ok(Json(state.services.members.resolve(&caller).await?))
}

#[utoipa::path(
    get,
    path = "/members/{id}",
    tag = "members",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Member ID")),
    responses(
        (status = 200, description = "Member details", body = Member),
        (status = 404, description = "Member not found")
    )
)]
pub async fn get_member(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Member>> {
    Ok(Json(state.services.members.get(&caller, id).await?))
}

#[utoipa::path(
    post,
    path = "/members",
    tag = "members",
    security(("bearer_auth" = [])),
    request_body = CreateMember,
    responses(
        (status = 201, description = "Member created", body = Member),
        (status = 409, description = "Email already in use")
    )
)]
pub async fn create_member(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Json(request): Json<CreateMember>,
) -> AppResult<(StatusCode, Json<Member>)> {
    let member = state.services.members.create(&caller, request).await?;
    Ok((StatusCode::CREATED, Json(member)))
}

#[utoipa::path(
    put,
    path = "/members/{id}",
    tag = "members",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Member ID")),
    request_body = UpdateMember,
    responses(
        (status = 200, description = "Member updated", body = Member),
        (status = 404, description = "Member not found")
    )
)]
pub async fn update_member(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<UpdateMember>,
) -> AppResult<Json<Member>> {
    Ok(Json(state.services.members.update(&caller, id, request).await?))
}

#[utoipa::path(
    delete,
    path = "/members/{id}",
    tag = "members",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Member ID")),
    responses(
        (status = 204, description = "Member deleted"),
        (status = 404, description = "Member not found")
    )
)]
pub async fn delete_member(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    state.services.members.delete(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Loans of a member
#[utoipa::path(
    get,
    path = "/members/{id}/loans",
    tag = "members",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Member ID")),
    responses(
        (status = 200, description = "Member's loans", body = Vec<LoanResponse>),
        (status = 403, description = "Not your record")
    )
)]
pub async fn member_loans(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<LoanResponse>>> {
    let now = chrono::Utc::now();
    let loans = state.services.loans.loans_by_member(&caller, id).await?;
    Ok(Json(loans.into_iter().map(|l| LoanResponse::new(l, now)).collect()))
}

/// Fines of a member
#[utoipa::path(
    get,
    path = "/members/{id}/fines",
    tag = "members",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Member ID")),
    responses(
        (status = 200, description = "Member's fines", body = Vec<Fine>),
        (status = 403, description = "Not your record")
    )
)]
pub async fn member_fines(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<Fine>>> {
    Ok(Json(state.services.fines.fines_by_member(&caller, id).await?))
}
