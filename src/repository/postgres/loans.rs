//! Loan queries

use chrono::{DateTime, Utc};
use sqlx::PgExecutor;

use crate::{
    error::AppResult,
    models::loan::{Loan, LoanFilter, LoanRow, NewLoan},
};

pub async fn get<'e, E: PgExecutor<'e>>(executor: E, id: i32) -> AppResult<Option<Loan>> {
    let row = sqlx::query_as::<_, LoanRow>("SELECT * FROM loans WHERE id = $1")
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(row.map(Loan::from))
}

/// Lock the loan row until the surrounding transaction ends
pub async fn lock<'e, E: PgExecutor<'e>>(executor: E, id: i32) -> AppResult<Option<Loan>> {
    let row = sqlx::query_as::<_, LoanRow>("SELECT * FROM loans WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(row.map(Loan::from))
}

pub async fn list<'e, E: PgExecutor<'e>>(executor: E, filter: &LoanFilter) -> AppResult<Vec<Loan>> {
    let rows = sqlx::query_as::<_, LoanRow>(
        r#"
        SELECT * FROM loans
        WHERE ($1::int IS NULL OR member_id = $1)
          AND ($2::int IS NULL OR book_id = $2)
          AND (NOT $3 OR returned_at IS NULL)
        ORDER BY loan_date DESC, id DESC
        "#,
    )
    .bind(filter.member_id)
    .bind(filter.book_id)
    .bind(filter.active_only.unwrap_or(false))
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(Loan::from).collect())
}

pub async fn list_late<'e, E: PgExecutor<'e>>(executor: E, now: DateTime<Utc>) -> AppResult<Vec<Loan>> {
    let rows = sqlx::query_as::<_, LoanRow>(
        r#"
        SELECT * FROM loans
        WHERE returned_at IS NULL AND due_date < $1
        ORDER BY due_date, id
        "#,
    )
    .bind(now)
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(Loan::from).collect())
}

pub async fn count_active_for_member<'e, E: PgExecutor<'e>>(executor: E, member_id: i32) -> AppResult<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM loans WHERE member_id = $1 AND returned_at IS NULL",
    )
    .bind(member_id)
    .fetch_one(executor)
    .await?;
    Ok(count)
}

/// Lock every unreturned loan of the member, oldest first
pub async fn lock_active_for_member<'e, E: PgExecutor<'e>>(executor: E, member_id: i32) -> AppResult<Vec<Loan>> {
    let rows = sqlx::query_as::<_, LoanRow>(
        r#"
        SELECT * FROM loans
        WHERE member_id = $1 AND returned_at IS NULL
        ORDER BY id
        FOR UPDATE
        "#,
    )
    .bind(member_id)
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(Loan::from).collect())
}

pub async fn has_active<'e, E: PgExecutor<'e>>(executor: E, member_id: i32, book_id: i32) -> AppResult<bool> {
    let exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM loans
            WHERE member_id = $1 AND book_id = $2 AND returned_at IS NULL
        )
        "#,
    )
    .bind(member_id)
    .bind(book_id)
    .fetch_one(executor)
    .await?;
    Ok(exists)
}

pub async fn create<'e, E: PgExecutor<'e>>(executor: E, loan: &NewLoan) -> AppResult<Loan> {
    let row = sqlx::query_as::<_, LoanRow>(
        r#"
        INSERT INTO loans (book_id, member_id, loan_date, due_date)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(loan.book_id)
    .bind(loan.member_id)
    .bind(loan.loan_date)
    .bind(loan.due_date)
    .fetch_one(executor)
    .await?;
    Ok(row.into())
}

pub async fn save<'e, E: PgExecutor<'e>>(executor: E, loan: &Loan) -> AppResult<Loan> {
    let row = sqlx::query_as::<_, LoanRow>(
        r#"
        UPDATE loans
        SET loan_date = $2, due_date = $3, returned_at = $4, version = version + 1
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(loan.id)
    .bind(loan.loan_date)
    .bind(loan.due_date)
    .bind(loan.state.returned_at())
    .fetch_one(executor)
    .await?;
    Ok(row.into())
}

pub async fn delete<'e, E: PgExecutor<'e>>(executor: E, id: i32) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM loans WHERE id = $1")
        .bind(id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}
