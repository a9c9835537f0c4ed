//! Member queries

use sqlx::PgExecutor;

use crate::{
    error::AppResult,
    models::member::{Member, MemberQuery, NewMember},
};

pub async fn get<'e, E: PgExecutor<'e>>(executor: E, id: i32) -> AppResult<Option<Member>> {
    let member = sqlx::query_as::<_, Member>("SELECT * FROM members WHERE id = $1")
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(member)
}

/// Lock the member row until the surrounding transaction ends
pub async fn lock<'e, E: PgExecutor<'e>>(executor: E, id: i32) -> AppResult<Option<Member>> {
    let member = sqlx::query_as::<_, Member>("SELECT * FROM members WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(member)
}

pub async fn find_by_email<'e, E: PgExecutor<'e>>(executor: E, email: &str) -> AppResult<Option<Member>> {
    let member = sqlx::query_as::<_, Member>("SELECT * FROM members WHERE email = $1")
        .bind(email)
        .fetch_optional(executor)
        .await?;
    Ok(member)
}

pub async fn search<'e, E: PgExecutor<'e>>(executor: E, query: &MemberQuery) -> AppResult<Vec<Member>> {
    let search = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let members = sqlx::query_as::<_, Member>(
        r#"
        SELECT * FROM members
        WHERE $1::text IS NULL
           OR last_name ILIKE '%' || $1 || '%'
           OR first_name ILIKE '%' || $1 || '%'
           OR email ILIKE '%' || $1 || '%'
        ORDER BY last_name, first_name, id
        "#,
    )
    .bind(search)
    .fetch_all(executor)
    .await?;

    Ok(members)
}

pub async fn create<'e, E: PgExecutor<'e>>(executor: E, member: &NewMember) -> AppResult<Member> {
    let created = sqlx::query_as::<_, Member>(
        r#"
        INSERT INTO members (first_name, last_name, email, membership_date)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(&member.first_name)
    .bind(&member.last_name)
    .bind(&member.email)
    .bind(member.membership_date)
    .fetch_one(executor)
    .await?;
    Ok(created)
}

/// Insert relying on the unique email; `None` when another row already holds it
pub async fn create_if_absent<'e, E: PgExecutor<'e>>(
    executor: E,
    member: &NewMember,
) -> AppResult<Option<Member>> {
    let created = sqlx::query_as::<_, Member>(
        r#"
        INSERT INTO members (first_name, last_name, email, membership_date)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (email) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(&member.first_name)
    .bind(&member.last_name)
    .bind(&member.email)
    .bind(member.membership_date)
    .fetch_optional(executor)
    .await?;
    Ok(created)
}

pub async fn update<'e, E: PgExecutor<'e>>(executor: E, member: &Member) -> AppResult<Option<Member>> {
    let updated = sqlx::query_as::<_, Member>(
        r#"
        UPDATE members
        SET first_name = $2, last_name = $3, email = $4, membership_date = $5
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(member.id)
    .bind(&member.first_name)
    .bind(&member.last_name)
    .bind(&member.email)
    .bind(member.membership_date)
    .fetch_optional(executor)
    .await?;
    Ok(updated)
}

pub async fn delete<'e, E: PgExecutor<'e>>(executor: E, id: i32) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM members WHERE id = $1")
        .bind(id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}
