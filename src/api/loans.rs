//! Loan management endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;

use crate::{
    error::AppResult,
    models::loan::{CreateLoan, LoanFilter, LoanResponse, UpdateLoan},
    AppState,
};

use super::AuthenticatedUser;

/// List loans; members only see their own
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(LoanFilter),
    responses(
        (status = 200, description = "Loans", body = Vec<LoanResponse>)
    )
)]
pub async fn list_loans(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Query(filter): Query<LoanFilter>,
) -> AppResult<Json<Vec<LoanResponse>>> {
    let now = Utc::now();
    let loans = state.services.loans.list_loans(&caller, filter).await?;
    Ok(Json(loans.into_iter().map(|l| LoanResponse::new(l, now)).collect()))
}

/// Active loans past their due date (admin)
#[utoipa::path(
    get,
    path = "/loans/late",
    tag = "loans",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Late loans", body = Vec<LoanResponse>),
        (status = 403, description = "Admin only")
    )
)]
pub async fn late_loans(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
) -> AppResult<Json<Vec<LoanResponse>>> {
    let now = Utc::now();
    let loans = state.services.loans.late_loans(&caller).await?;
    Ok(Json(loans.into_iter().map(|l| LoanResponse::new(l, now)).collect()))
}

#[utoipa::path(
    get,
    path = "/loans/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Loan details", body = LoanResponse),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn get_loan(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<LoanResponse>> {
    let loan = state.services.loans.get_loan(&caller, id).await?;
    Ok(Json(LoanResponse::new(loan, Utc::now())))
}

/// Borrow a book
#[utoipa::path(
    post,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = CreateLoan,
    responses(
        (status = 201, description = "Loan created", body = LoanResponse),
        (status = 404, description = "Book or member not found"),
        (status = 409, description = "Duplicate loan or reserved by another member"),
        (status = 422, description = "Loan limit reached or out of stock")
    )
)]
pub async fn create_loan(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Json(request): Json<CreateLoan>,
) -> AppResult<(StatusCode, Json<LoanResponse>)> {
    let loan = state.services.loans.create_loan(&caller, request).await?;
    Ok((StatusCode::CREATED, Json(LoanResponse::new(loan, Utc::now()))))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/loans/{id}/return",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Book returned", body = LoanResponse),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Already returned")
    )
)]
pub async fn return_loan(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<LoanResponse>> {
    let loan = state.services.loans.return_loan(&caller, id).await?;
    Ok(Json(LoanResponse::new(loan, Utc::now())))
}

/// Edit loan dates (admin)
#[utoipa::path(
    put,
    path = "/loans/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Loan ID")),
    request_body = UpdateLoan,
    responses(
        (status = 200, description = "Loan updated", body = LoanResponse),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Loan changed since it was read")
    )
)]
pub async fn update_loan(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<UpdateLoan>,
) -> AppResult<Json<LoanResponse>> {
    let loan = state.services.loans.update_loan(&caller, id, request).await?;
    Ok(Json(LoanResponse::new(loan, Utc::now())))
}

#[utoipa::path(
    delete,
    path = "/loans/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Loan ID")),
    responses(
        (status = 204, description = "Loan deleted"),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn delete_loan(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    state.services.loans.delete_loan(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
