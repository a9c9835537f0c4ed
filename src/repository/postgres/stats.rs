//! Dashboard aggregates

use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};

use crate::{
    error::AppResult,
    models::dashboard::{AuthorCount, LibraryStats, MonthCount},
};

pub async fn library_stats(pool: &Pool<Postgres>, now: DateTime<Utc>) -> AppResult<LibraryStats> {
    let counts = sqlx::query(
        r#"
        SELECT
            (SELECT COUNT(*) FROM books) AS total_books,
            (SELECT COUNT(*) FROM members) AS total_members,
            (SELECT COUNT(*) FROM loans WHERE returned_at IS NULL) AS active_loans,
            (SELECT COUNT(*) FROM loans WHERE returned_at IS NULL AND due_date < $1) AS late_loans,
            (SELECT COUNT(*) FROM reservations) AS total_reservations
        "#,
    )
    .bind(now)
    .fetch_one(pool)
    .await?;

    let books_by_author = sqlx::query(
        "SELECT author, COUNT(*) AS count FROM books GROUP BY author ORDER BY author",
    )
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|row| AuthorCount {
        author: row.get("author"),
        count: row.get("count"),
    })
    .collect();

    let loans_per_month = sqlx::query(
        r#"
        SELECT EXTRACT(MONTH FROM loan_date AT TIME ZONE 'UTC')::int AS month, COUNT(*) AS count
        FROM loans
        GROUP BY 1
        ORDER BY 1
        "#,
    )
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|row| {
        let month: i32 = row.get("month");
        MonthCount::new(month as u32, row.get("count"))
    })
    .collect();

    Ok(LibraryStats {
        total_books: counts.get("total_books"),
        total_members: counts.get("total_members"),
        active_loans: counts.get("active_loans"),
        late_loans: counts.get("late_loans"),
        total_reservations: counts.get("total_reservations"),
        books_by_author,
        loans_per_month,
    })
}
