//! PostgreSQL store

mod books;
mod fines;
mod loans;
mod members;
mod reservations;
mod stats;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Transaction};

use super::{LibraryStore, StoreTx};
use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookQuery, Category, CreateBook},
        dashboard::LibraryStats,
        fine::{Fine, FineFilter, NewFine},
        loan::{Loan, LoanFilter, NewLoan},
        member::{Member, MemberQuery, NewMember},
        reservation::{NewReservation, Reservation, ReservationFilter},
    },
};

/// Store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

/// Turn constraint violations into caller-facing errors
fn constraint_error(err: AppError, what: &str) -> AppError {
    if let AppError::Database(sqlx::Error::Database(db)) = &err {
        if db.is_unique_violation() {
            return AppError::Conflict(format!("{} already exists", what));
        }
        if db.is_foreign_key_violation() {
            return AppError::Validation(format!("{} references a missing record", what));
        }
        if db.is_check_violation() {
            return AppError::Validation(format!("{} violates a constraint", what));
        }
    }
    err
}

#[async_trait]
impl LibraryStore for PgStore {
    async fn begin(&self) -> AppResult<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn get_book(&self, id: i32) -> AppResult<Option<Book>> {
        books::get(&self.pool, id).await
    }

    async fn list_books(&self, query: &BookQuery) -> AppResult<Vec<Book>> {
        books::search(&self.pool, query).await
    }

    async fn insert_book(&self, book: &CreateBook) -> AppResult<Book> {
        books::create(&self.pool, book)
            .await
            .map_err(|e| constraint_error(e, "Book"))
    }

    async fn update_book(&self, book: &Book) -> AppResult<Book> {
        let updated = books::update(&self.pool, book)
            .await
            .map_err(|e| constraint_error(e, "Book"))?;

        match updated {
            Some(book) => Ok(book),
            None if books::get(&self.pool, book.id).await?.is_some() => Err(
                AppError::ConcurrencyConflict(format!("book {} was modified", book.id)),
            ),
            None => Err(AppError::BookNotFound(book.id)),
        }
    }

    async fn delete_book(&self, id: i32) -> AppResult<bool> {
        books::delete(&self.pool, id).await
    }

    async fn get_category(&self, id: i32) -> AppResult<Option<Category>> {
        books::get_category(&self.pool, id).await
    }

    async fn list_categories(&self) -> AppResult<Vec<Category>> {
        books::list_categories(&self.pool).await
    }

    async fn insert_category(&self, name: &str) -> AppResult<Category> {
        books::create_category(&self.pool, name).await
    }

    async fn update_category(&self, category: &Category) -> AppResult<Category> {
        match books::update_category(&self.pool, category).await? {
            Some(category) => Ok(category),
            None if books::get_category(&self.pool, category.id).await?.is_some() => Err(
                AppError::ConcurrencyConflict(format!("category {} was modified", category.id)),
            ),
            None => Err(AppError::NotFound(format!(
                "Category with id {} not found",
                category.id
            ))),
        }
    }

    async fn delete_category(&self, id: i32) -> AppResult<bool> {
        books::delete_category(&self.pool, id).await
    }

    async fn get_member(&self, id: i32) -> AppResult<Option<Member>> {
        members::get(&self.pool, id).await
    }

    async fn find_member_by_email(&self, email: &str) -> AppResult<Option<Member>> {
        members::find_by_email(&self.pool, email).await
    }

    async fn list_members(&self, query: &MemberQuery) -> AppResult<Vec<Member>> {
        members::search(&self.pool, query).await
    }

    async fn insert_member(&self, member: &NewMember) -> AppResult<Member> {
        members::create(&self.pool, member)
            .await
            .map_err(|e| constraint_error(e, "Member email"))
    }

    async fn insert_member_if_absent(&self, member: &NewMember) -> AppResult<Option<Member>> {
        members::create_if_absent(&self.pool, member).await
    }

    async fn update_member(&self, member: &Member) -> AppResult<Member> {
        members::update(&self.pool, member)
            .await
            .map_err(|e| constraint_error(e, "Member email"))?
            .ok_or_else(|| AppError::NotFound(format!("Member with id {} not found", member.id)))
    }

    async fn get_loan(&self, id: i32) -> AppResult<Option<Loan>> {
        loans::get(&self.pool, id).await
    }

    async fn list_loans(&self, filter: &LoanFilter) -> AppResult<Vec<Loan>> {
        loans::list(&self.pool, filter).await
    }

    async fn list_late_loans(&self, now: DateTime<Utc>) -> AppResult<Vec<Loan>> {
        loans::list_late(&self.pool, now).await
    }

    async fn get_reservation(&self, id: i32) -> AppResult<Option<Reservation>> {
        reservations::get(&self.pool, id).await
    }

    async fn list_reservations(&self, filter: &ReservationFilter) -> AppResult<Vec<Reservation>> {
        reservations::list(&self.pool, filter).await
    }

    async fn delete_reservation(&self, id: i32) -> AppResult<bool> {
        reservations::delete(&self.pool, id).await
    }

    async fn get_fine(&self, id: i32) -> AppResult<Option<Fine>> {
        fines::get(&self.pool, id).await
    }

    async fn list_fines(&self, filter: &FineFilter) -> AppResult<Vec<Fine>> {
        fines::list(&self.pool, filter).await
    }

    async fn insert_fine(&self, fine: &NewFine) -> AppResult<Fine> {
        fines::create(&self.pool, fine)
            .await
            .map_err(|e| constraint_error(e, "Fine"))
    }

    async fn mark_fine_paid(&self, id: i32, paid_at: DateTime<Utc>) -> AppResult<Option<Fine>> {
        fines::mark_paid(&self.pool, id, paid_at).await
    }

    async fn delete_fine(&self, id: i32) -> AppResult<bool> {
        fines::delete(&self.pool, id).await
    }

    async fn library_stats(&self, now: DateTime<Utc>) -> AppResult<LibraryStats> {
        stats::library_stats(&self.pool, now).await
    }
}

/// Open PostgreSQL transaction; rolled back on drop unless committed
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn lock_member(&mut self, id: i32) -> AppResult<Option<Member>> {
        members::lock(&mut *self.tx, id).await
    }

    async fn count_active_loans(&mut self, member_id: i32) -> AppResult<i64> {
        loans::count_active_for_member(&mut *self.tx, member_id).await
    }

    async fn has_active_loan(&mut self, member_id: i32, book_id: i32) -> AppResult<bool> {
        loans::has_active(&mut *self.tx, member_id, book_id).await
    }

    async fn lock_active_loans(&mut self, member_id: i32) -> AppResult<Vec<Loan>> {
        loans::lock_active_for_member(&mut *self.tx, member_id).await
    }

    async fn delete_member(&mut self, id: i32) -> AppResult<bool> {
        members::delete(&mut *self.tx, id).await
    }

    async fn lock_book(&mut self, id: i32) -> AppResult<Option<Book>> {
        books::lock(&mut *self.tx, id).await
    }

    async fn set_available_copies(&mut self, book_id: i32, copies: i32) -> AppResult<()> {
        books::set_available_copies(&mut *self.tx, book_id, copies)
            .await
            .map_err(|e| constraint_error(e, "Book stock"))
    }

    async fn first_reservation(&mut self, book_id: i32) -> AppResult<Option<Reservation>> {
        reservations::first_for_book(&mut *self.tx, book_id).await
    }

    async fn insert_reservation(&mut self, reservation: &NewReservation) -> AppResult<Reservation> {
        reservations::create(&mut *self.tx, reservation)
            .await
            .map_err(|e| constraint_error(e, "Reservation"))
    }

    async fn delete_reservation(&mut self, id: i32) -> AppResult<()> {
        reservations::delete(&mut *self.tx, id).await?;
        Ok(())
    }

    async fn insert_loan(&mut self, loan: &NewLoan) -> AppResult<Loan> {
        loans::create(&mut *self.tx, loan)
            .await
            .map_err(|e| constraint_error(e, "Loan"))
    }

    async fn lock_loan(&mut self, id: i32) -> AppResult<Option<Loan>> {
        loans::lock(&mut *self.tx, id).await
    }

    async fn save_loan(&mut self, loan: &Loan) -> AppResult<Loan> {
        loans::save(&mut *self.tx, loan).await
    }

    async fn delete_loan(&mut self, id: i32) -> AppResult<()> {
        loans::delete(&mut *self.tx, id).await?;
        Ok(())
    }

    async fn insert_fine(&mut self, fine: &NewFine) -> AppResult<Fine> {
        fines::create(&mut *self.tx, fine)
            .await
            .map_err(|e| constraint_error(e, "Fine"))
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
