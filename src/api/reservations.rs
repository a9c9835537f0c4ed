//! Reservation endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::reservation::{CreateReservation, Reservation, ReservationFilter},
    AppState,
};

use super::AuthenticatedUser;

/// List reservations in queue order; members only see their own
#[utoipa::path(
    get,
    path = "/reservations",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(ReservationFilter),
    responses(
        (status = 200, description = "Reservations", body = Vec<Reservation>)
    )
)]
pub async fn list_reservations(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Query(filter): Query<ReservationFilter>,
) -> AppResult<Json<Vec<Reservation>>> {
    Ok(Json(state.services.reservations.list(&caller, filter).await?))
}

#[utoipa::path(
    get,
    path = "/reservations/mine",
    tag = "reservations",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Caller's reservations", body = Vec<Reservation>)
    )
)]
pub async fn my_reservations(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
) -> AppResult<Json<Vec<Reservation>>> {
    Ok(Json(state.services.reservations.own(&caller).await?))
}

#[utoipa::path(
    get,
    path = "/reservations/{id}",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation", body = Reservation),
        (status = 404, description = "Reservation not found")
    )
)]
pub async fn get_reservation(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Reservation>> {
    Ok(Json(state.services.reservations.get(&caller, id).await?))
}

/// Reserve an out-of-stock book
#[utoipa::path(
    post,
    path = "/reservations",
    tag = "reservations",
    security(("bearer_auth" = [])),
    request_body = CreateReservation,
    responses(
        (status = 201, description = "Reservation created", body = Reservation),
        (status = 404, description = "Book not found"),
        (status = 409, description = "Book is available")
    )
)]
pub async fn create_reservation(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Json(request): Json<CreateReservation>,
) -> AppResult<(StatusCode, Json<Reservation>)> {
    let reservation = state.services.reservations.create(&caller, request).await?;
    Ok((StatusCode::CREATED, Json(reservation)))
}

#[utoipa::path(
    delete,
    path = "/reservations/{id}",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Reservation ID")),
    responses(
        (status = 204, description = "Reservation cancelled"),
        (status = 404, description = "Reservation not found")
    )
)]
pub async fn cancel_reservation(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    state.services.reservations.cancel(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Waiting list for a book (admin)
#[utoipa::path(
    get,
    path = "/books/{id}/reservations",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Queue, head first", body = Vec<Reservation>),
        (status = 404, description = "Book not found")
    )
)]
pub async fn book_queue(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<Reservation>>> {
    Ok(Json(state.services.reservations.queue(&caller, id).await?))
}
