//! Book (catalog entry) and category models

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Book model from database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub publication_year: i32,
    pub category_id: Option<i32>,
    /// Copies on the shelf, never negative
    pub available_copies: i32,
    pub image_url: Option<String>,
    pub version: i32,
}

impl Book {
    pub fn is_available(&self) -> bool {
        self.available_copies > 0
    }

    /// Case-insensitive match against title, author or ISBN
    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.title.to_lowercase().contains(&needle)
            || self.author.to_lowercase().contains(&needle)
            || self.isbn.to_lowercase().contains(&needle)
    }
}

/// Catalog search parameters
#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
pub struct BookQuery {
    /// Free text matched against title, author and ISBN
    pub search: Option<String>,
    pub category_id: Option<i32>,
    /// Only books with at least one copy on the shelf
    pub available_only: Option<bool>,
}

/// Create book request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Author is required"))]
    pub author: String,
    #[validate(length(min = 1, message = "ISBN is required"))]
    pub isbn: String,
    pub publication_year: i32,
    pub category_id: Option<i32>,
    #[validate(range(min = 0, message = "Copy count cannot be negative"))]
    pub available_copies: i32,
    pub image_url: Option<String>,
}

/// Update book request; `version` is the one the editor read
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: Option<String>,
    #[validate(length(min = 1, message = "Author is required"))]
    pub author: Option<String>,
    #[validate(length(min = 1, message = "ISBN is required"))]
    pub isbn: Option<String>,
    pub publication_year: Option<i32>,
    pub category_id: Option<i32>,
    #[validate(range(min = 0, message = "Copy count cannot be negative"))]
    pub available_copies: Option<i32>,
    pub image_url: Option<String>,
    pub version: i32,
}

impl UpdateBook {
    /// Apply the changed fields on top of `book`
    pub fn apply(&self, book: &Book) -> Book {
        Book {
            id: book.id,
            title: self.title.clone().unwrap_or_else(|| book.title.clone()),
            author: self.author.clone().unwrap_or_else(|| book.author.clone()),
            isbn: self.isbn.clone().unwrap_or_else(|| book.isbn.clone()),
            publication_year: self.publication_year.unwrap_or(book.publication_year),
            category_id: self.category_id.or(book.category_id),
            available_copies: self.available_copies.unwrap_or(book.available_copies),
            image_url: self.image_url.clone().or_else(|| book.image_url.clone()),
            version: book.version,
        }
    }
}

/// Book category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Category {
    pub id: i32,
    pub name: String,
    pub version: i32,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateCategory {
    #[validate(length(min = 1, message = "Category name is required"))]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateCategory {
    #[validate(length(min = 1, message = "Category name is required"))]
    pub name: String,
    pub version: i32,
}
