//! Reservation queries. Queue order is `reserved_at, id`.

use sqlx::PgExecutor;

use crate::{
    error::AppResult,
    models::reservation::{NewReservation, Reservation, ReservationFilter},
};

pub async fn get<'e, E: PgExecutor<'e>>(executor: E, id: i32) -> AppResult<Option<Reservation>> {
    let reservation = sqlx::query_as::<_, Reservation>("SELECT * FROM reservations WHERE id = $1")
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(reservation)
}

pub async fn list<'e, E: PgExecutor<'e>>(
    executor: E,
    filter: &ReservationFilter,
) -> AppResult<Vec<Reservation>> {
    let reservations = sqlx::query_as::<_, Reservation>(
        r#"
        SELECT * FROM reservations
        WHERE ($1::int IS NULL OR member_id = $1)
          AND ($2::int IS NULL OR book_id = $2)
        ORDER BY reserved_at, id
        "#,
    )
    .bind(filter.member_id)
    .bind(filter.book_id)
    .fetch_all(executor)
    .await?;
    Ok(reservations)
}

/// Head of the queue, locked so two loans cannot consume it twice
pub async fn first_for_book<'e, E: PgExecutor<'e>>(executor: E, book_id: i32) -> AppResult<Option<Reservation>> {
    let reservation = sqlx::query_as::<_, Reservation>(
        r#"
        SELECT * FROM reservations
        WHERE book_id = $1
        ORDER BY reserved_at, id
        LIMIT 1
        FOR UPDATE
        "#,
    )
    .bind(book_id)
    .fetch_optional(executor)
    .await?;
    Ok(reservation)
}

pub async fn create<'e, E: PgExecutor<'e>>(executor: E, reservation: &NewReservation) -> AppResult<Reservation> {
    let created = sqlx::query_as::<_, Reservation>(
        r#"
        INSERT INTO reservations (book_id, member_id, reserved_at)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(reservation.book_id)
    .bind(reservation.member_id)
    .bind(reservation.reserved_at)
    .fetch_one(executor)
    .await?;
    Ok(created)
}

pub async fn delete<'e, E: PgExecutor<'e>>(executor: E, id: i32) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM reservations WHERE id = $1")
        .bind(id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}
