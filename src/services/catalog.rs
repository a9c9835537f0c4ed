//! Catalog management service: books and categories

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookQuery, Category, CreateBook, CreateCategory, UpdateBook, UpdateCategory},
        Caller,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Search books with filters
    pub async fn search_books(&self, query: &BookQuery) -> AppResult<Vec<Book>> {
        self.repository.list_books(query).await
    }

    /// Books with at least one copy on the shelf
    pub async fn available_books(&self) -> AppResult<Vec<Book>> {
        self.repository
            .list_books(&BookQuery {
                available_only: Some(true),
                ..BookQuery::default()
            })
            .await
    }

    pub async fn get_book(&self, id: i32) -> AppResult<Book> {
        self.repository
            .get_book(id)
            .await?
            .ok_or(AppError::BookNotFound(id))
    }

    pub async fn create_book(&self, caller: &Caller, request: CreateBook) -> AppResult<Book> {
        caller.require_admin()?;
        request.validate()?;

        let book = self.repository.insert_book(&request).await?;
        tracing::info!("Catalog create: book id={} '{}'", book.id, book.title);
        Ok(book)
    }

    /// Edit a book; `request.version` must be the one the editor read
    pub async fn update_book(&self, caller: &Caller, id: i32, request: UpdateBook) -> AppResult<Book> {
        caller.require_admin()?;
        request.validate()?;

        let current = self.get_book(id).await?;
        if current.version != request.version {
            return Err(AppError::ConcurrencyConflict(format!("book {} was modified", id)));
        }
        self.repository.update_book(&request.apply(&current)).await
    }

    /// Delete a book with its loans and reservations
    pub async fn delete_book(&self, caller: &Caller, id: i32) -> AppResult<()> {
        caller.require_admin()?;
        if !self.repository.delete_book(id).await? {
            return Err(AppError::BookNotFound(id));
        }
        tracing::info!("Catalog delete: book id={}", id);
        Ok(())
    }

    pub async fn list_categories(&self) -> AppResult<Vec<Category>> {
        self.repository.list_categories().await
    }

    pub async fn get_category(&self, id: i32) -> AppResult<Category> {
        self.repository
            .get_category(id)
            .await?
            .ok_or_else(|| category_not_found(id))
    }

    pub async fn create_category(&self, caller: &Caller, request: CreateCategory) -> AppResult<Category> {
        caller.require_admin()?;
        request.validate()?;
        self.repository.insert_category(request.name.trim()).await
    }

    pub async fn update_category(
        &self,
        caller: &Caller,
        id: i32,
        request: UpdateCategory,
    ) -> AppResult<Category> {
        caller.require_admin()?;
        request.validate()?;

        self.repository
            .update_category(&Category {
                id,
                name: request.name.trim().to_string(),
                version: request.version,
            })
            .await
    }

    /// Delete a category; its books become uncategorized
    pub async fn delete_category(&self, caller: &Caller, id: i32) -> AppResult<()> {
        caller.require_admin()?;
        if !self.repository.delete_category(id).await? {
            return Err(category_not_found(id));
        }
        Ok(())
    }
}

fn category_not_found(id: i32) -> AppError {
    AppError::NotFound(format!("Category with id {} not found", id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryStore;
    use std::sync::Arc;

    fn admin() -> Caller {
        Caller::admin("admin@example.org")
    }

    fn book(title: &str, author: &str, copies: i32) -> CreateBook {
        CreateBook {
            title: title.into(),
            author: author.into(),
            isbn: format!("isbn-{}", title.len()),
            publication_year: 1900,
            category_id: None,
            available_copies: copies,
            image_url: None,
        }
    }

    fn service() -> CatalogService {
        CatalogService::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_available_and_search() {
        let catalog = service();
        catalog.create_book(&admin(), book("Nana", "Émile Zola", 0)).await.unwrap();
        catalog.create_book(&admin(), book("Candide", "Voltaire", 2)).await.unwrap();

        let available = catalog.available_books().await.unwrap();
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].title, "Candide");

        let found = catalog
            .search_books(&BookQuery {
                search: Some("zola".into()),
                ..BookQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Nana");
    }

    #[tokio::test]
    async fn test_members_cannot_edit_catalog() {
        let catalog = service();
        let err = catalog
            .create_book(&Caller::member("m@example.org"), book("Nana", "Zola", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotAuthorized(_)));
    }

    #[tokio::test]
    async fn test_stale_update_conflicts() {
        let catalog = service();
        let created = catalog.create_book(&admin(), book("Nana", "Zola", 1)).await.unwrap();

        let edit = |title: &str| UpdateBook {
            title: Some(title.into()),
            author: None,
            isbn: None,
            publication_year: None,
            category_id: None,
            available_copies: None,
            image_url: None,
            version: created.version,
        };

        let updated = catalog.update_book(&admin(), created.id, edit("Nana (1880)")).await.unwrap();
        assert_eq!(updated.version, created.version + 1);

        let err = catalog.update_book(&admin(), created.id, edit("Other")).await.unwrap_err();
        assert!(matches!(err, AppError::ConcurrencyConflict(_)));
    }

    #[tokio::test]
    async fn test_category_delete_uncategorizes_books() {
        let catalog = service();
        let category = catalog
            .create_category(&admin(), CreateCategory { name: "Roman".into() })
            .await
            .unwrap();

        let mut request = book("Nana", "Zola", 1);
        request.category_id = Some(category.id);
        let created = catalog.create_book(&admin(), request).await.unwrap();

        catalog.delete_category(&admin(), category.id).await.unwrap();
        let reloaded = catalog.get_book(created.id).await.unwrap();
        assert_eq!(reloaded.category_id, None);
    }

    #[tokio::test]
    async fn test_negative_stock_rejected() {
        let catalog = service();
        let err = catalog
            .create_book(&admin(), book("Nana", "Zola", -1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
