//! Fine queries

use chrono::{DateTime, Utc};
use sqlx::PgExecutor;

use crate::{
    error::AppResult,
    models::fine::{Fine, FineFilter, NewFine},
};

pub async fn get<'e, E: PgExecutor<'e>>(executor: E, id: i32) -> AppResult<Option<Fine>> {
    let fine = sqlx::query_as::<_, Fine>("SELECT * FROM fines WHERE id = $1")
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(fine)
}

pub async fn list<'e, E: PgExecutor<'e>>(executor: E, filter: &FineFilter) -> AppResult<Vec<Fine>> {
    let fines = sqlx::query_as::<_, Fine>(
        r#"
        SELECT f.* FROM fines f
        JOIN loans l ON l.id = f.loan_id
        WHERE ($1::int IS NULL OR l.member_id = $1)
          AND (NOT $2 OR NOT f.paid)
        ORDER BY f.created_at, f.id
        "#,
    )
    .bind(filter.member_id)
    .bind(filter.unpaid_only.unwrap_or(false))
    .fetch_all(executor)
    .await?;
    Ok(fines)
}

pub async fn create<'e, E: PgExecutor<'e>>(executor: E, fine: &NewFine) -> AppResult<Fine> {
    let created = sqlx::query_as::<_, Fine>(
        r#"
        INSERT INTO fines (loan_id, amount, paid, created_at)
        VALUES ($1, $2, FALSE, $3)
        RETURNING *
        "#,
    )
    .bind(fine.loan_id)
    .bind(fine.amount)
    .bind(fine.created_at)
    .fetch_one(executor)
    .await?;
    Ok(created)
}

/// Conditional flip: only an unpaid row matches, so a concurrent second payment gets `None`
pub async fn mark_paid<'e, E: PgExecutor<'e>>(
    executor: E,
    id: i32,
    paid_at: DateTime<Utc>,
) -> AppResult<Option<Fine>> {
    let fine = sqlx::query_as::<_, Fine>(
        r#"
        UPDATE fines SET paid = TRUE, paid_at = $2
        WHERE id = $1 AND NOT paid
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(paid_at)
    .fetch_optional(executor)
    .await?;
    Ok(fine)
}

pub async fn delete<'e, E: PgExecutor<'e>>(executor: E, id: i32) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM fines WHERE id = $1")
        .bind(id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}
