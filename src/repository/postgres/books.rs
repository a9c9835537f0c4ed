//! Book and category queries

use sqlx::PgExecutor;

use crate::{
    error::AppResult,
    models::book::{Book, BookQuery, Category, CreateBook},
};

pub async fn get<'e, E: PgExecutor<'e>>(executor: E, id: i32) -> AppResult<Option<Book>> {
    let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(book)
}

/// Lock the book row until the surrounding transaction ends
pub async fn lock<'e, E: PgExecutor<'e>>(executor: E, id: i32) -> AppResult<Option<Book>> {
    let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(book)
}

pub async fn search<'e, E: PgExecutor<'e>>(executor: E, query: &BookQuery) -> AppResult<Vec<Book>> {
    let search = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let books = sqlx::query_as::<_, Book>(
        r#"
        SELECT * FROM books
        WHERE ($1::text IS NULL
               OR title ILIKE '%' || $1 || '%'
               OR author ILIKE '%' || $1 || '%'
               OR isbn ILIKE '%' || $1 || '%')
          AND ($2::int IS NULL OR category_id = $2)
          AND (NOT $3 OR available_copies > 0)
        ORDER BY title, id
        "#,
    )
    .bind(search)
    .bind(query.category_id)
    .bind(query.available_only.unwrap_or(false))
    .fetch_all(executor)
    .await?;

    Ok(books)
}

pub async fn create<'e, E: PgExecutor<'e>>(executor: E, book: &CreateBook) -> AppResult<Book> {
    let created = sqlx::query_as::<_, Book>(
        r#"
        INSERT INTO books (title, author, isbn, publication_year, category_id, available_copies, image_url)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(&book.title)
    .bind(&book.author)
    .bind(&book.isbn)
    .bind(book.publication_year)
    .bind(book.category_id)
    .bind(book.available_copies)
    .bind(&book.image_url)
    .fetch_one(executor)
    .await?;

    Ok(created)
}

/// Versioned update; `None` when the row is gone or its version moved on
pub async fn update<'e, E: PgExecutor<'e>>(executor: E, book: &Book) -> AppResult<Option<Book>> {
    let updated = sqlx::query_as::<_, Book>(
        r#"
        UPDATE books
        SET title = $2, author = $3, isbn = $4, publication_year = $5,
            category_id = $6, available_copies = $7, image_url = $8,
            version = version + 1
        WHERE id = $1 AND version = $9
        RETURNING *
        "#,
    )
    .bind(book.id)
    .bind(&book.title)
    .bind(&book.author)
    .bind(&book.isbn)
    .bind(book.publication_year)
    .bind(book.category_id)
    .bind(book.available_copies)
    .bind(&book.image_url)
    .bind(book.version)
    .fetch_optional(executor)
    .await?;

    Ok(updated)
}

pub async fn set_available_copies<'e, E: PgExecutor<'e>>(
    executor: E,
    id: i32,
    copies: i32,
) -> AppResult<()> {
    sqlx::query("UPDATE books SET available_copies = $2, version = version + 1 WHERE id = $1")
        .bind(id)
        .bind(copies)
        .execute(executor)
        .await?;
    Ok(())
}

pub async fn delete<'e, E: PgExecutor<'e>>(executor: E, id: i32) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM books WHERE id = $1")
        .bind(id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn get_category<'e, E: PgExecutor<'e>>(executor: E, id: i32) -> AppResult<Option<Category>> {
    let category = sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = $1")
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(category)
}

pub async fn list_categories<'e, E: PgExecutor<'e>>(executor: E) -> AppResult<Vec<Category>> {
    let categories = sqlx::query_as::<_, Category>("SELECT * FROM categories ORDER BY name, id")
        .fetch_all(executor)
        .await?;
    Ok(categories)
}

pub async fn create_category<'e, E: PgExecutor<'e>>(executor: E, name: &str) -> AppResult<Category> {
    let category = sqlx::query_as::<_, Category>(
        "INSERT INTO categories (name) VALUES ($1) RETURNING *",
    )
    .bind(name)
    .fetch_one(executor)
    .await?;
    Ok(category)
}

/// Versioned update; `None` when the row is gone or its version moved on
pub async fn update_category<'e, E: PgExecutor<'e>>(
    executor: E,
    category: &Category,
) -> AppResult<Option<Category>> {
    let updated = sqlx::query_as::<_, Category>(
        r#"
        UPDATE categories SET name = $2, version = version + 1
        WHERE id = $1 AND version = $3
        RETURNING *
        "#,
    )
    .bind(category.id)
    .bind(&category.name)
    .bind(category.version)
    .fetch_optional(executor)
    .await?;
    Ok(updated)
}

pub async fn delete_category<'e, E: PgExecutor<'e>>(executor: E, id: i32) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM categories WHERE id = $1")
        .bind(id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}
