//! Repository layer: the entity store behind the lending engine.
//!
//! [`LibraryStore`] covers plain reads and single-row writes. Anything that
//! must check-then-write atomically goes through a [`StoreTx`] obtained from
//! [`LibraryStore::begin`]: every `lock_*` call holds its row until the
//! transaction commits or is dropped (dropping rolls back).

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::AppResult,
    models::{
        book::{Book, BookQuery, Category, CreateBook},
        dashboard::LibraryStats,
        fine::{Fine, FineFilter, NewFine},
        loan::{Loan, LoanFilter, NewLoan},
        member::{Member, MemberQuery, NewMember},
        reservation::{NewReservation, Reservation, ReservationFilter},
    },
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Shared handle on the configured store
pub type Repository = Arc<dyn LibraryStore>;

#[async_trait]
pub trait LibraryStore: Send + Sync {
    /// Start a transaction
    async fn begin(&self) -> AppResult<Box<dyn StoreTx>>;

    /// Check the store is reachable
    async fn ping(&self) -> AppResult<()>;

    // Books
    async fn get_book(&self, id: i32) -> AppResult<Option<Book>>;
    async fn list_books(&self, query: &BookQuery) -> AppResult<Vec<Book>>;
    async fn insert_book(&self, book: &CreateBook) -> AppResult<Book>;
    /// Write `book` if its version is still current, bumping the version
    async fn update_book(&self, book: &Book) -> AppResult<Book>;
    async fn delete_book(&self, id: i32) -> AppResult<bool>;

    // Categories
    async fn get_category(&self, id: i32) -> AppResult<Option<Category>>;
    async fn list_categories(&self) -> AppResult<Vec<Category>>;
    async fn insert_category(&self, name: &str) -> AppResult<Category>;
    /// Write `category` if its version is still current, bumping the version
    async fn update_category(&self, category: &Category) -> AppResult<Category>;
    async fn delete_category(&self, id: i32) -> AppResult<bool>;

    // Members
    async fn get_member(&self, id: i32) -> AppResult<Option<Member>>;
    async fn find_member_by_email(&self, email: &str) -> AppResult<Option<Member>>;
    async fn list_members(&self, query: &MemberQuery) -> AppResult<Vec<Member>>;
    /// Insert; fails with `Conflict` when the email is taken
    async fn insert_member(&self, member: &NewMember) -> AppResult<Member>;
    /// Insert unless the email is taken; `None` when it was
    async fn insert_member_if_absent(&self, member: &NewMember) -> AppResult<Option<Member>>;
    async fn update_member(&self, member: &Member) -> AppResult<Member>;

    // Loans
    async fn get_loan(&self, id: i32) -> AppResult<Option<Loan>>;
    async fn list_loans(&self, filter: &LoanFilter) -> AppResult<Vec<Loan>>;
    /// Active loans whose due date is before `now`
    async fn list_late_loans(&self, now: DateTime<Utc>) -> AppResult<Vec<Loan>>;

    // Reservations
    async fn get_reservation(&self, id: i32) -> AppResult<Option<Reservation>>;
    /// Matching reservations in queue order
    async fn list_reservations(&self, filter: &ReservationFilter) -> AppResult<Vec<Reservation>>;
    async fn delete_reservation(&self, id: i32) -> AppResult<bool>;

    // Fines
    async fn get_fine(&self, id: i32) -> AppResult<Option<Fine>>;
    async fn list_fines(&self, filter: &FineFilter) -> AppResult<Vec<Fine>>;
    async fn insert_fine(&self, fine: &NewFine) -> AppResult<Fine>;
    /// Flip an unpaid fine to paid; `None` if it does not exist or was already paid
    async fn mark_fine_paid(&self, id: i32, paid_at: DateTime<Utc>) -> AppResult<Option<Fine>>;
    async fn delete_fine(&self, id: i32) -> AppResult<bool>;

    async fn library_stats(&self, now: DateTime<Utc>) -> AppResult<LibraryStats>;
}

/// Unit of work over the store
#[async_trait]
pub trait StoreTx: Send {
    /// Lock the member row; serializes loan creation per member
    async fn lock_member(&mut self, id: i32) -> AppResult<Option<Member>>;
    async fn count_active_loans(&mut self, member_id: i32) -> AppResult<i64>;
    async fn has_active_loan(&mut self, member_id: i32, book_id: i32) -> AppResult<bool>;
    /// Lock the member's unreturned loans
    async fn lock_active_loans(&mut self, member_id: i32) -> AppResult<Vec<Loan>>;
    /// Delete the member; loans, fines and reservations go with it
    async fn delete_member(&mut self, id: i32) -> AppResult<bool>;

    /// Lock the book row; serializes stock changes per book
    async fn lock_book(&mut self, id: i32) -> AppResult<Option<Book>>;
    async fn set_available_copies(&mut self, book_id: i32, copies: i32) -> AppResult<()>;

    /// Head of the book's reservation queue
    async fn first_reservation(&mut self, book_id: i32) -> AppResult<Option<Reservation>>;
    async fn insert_reservation(&mut self, reservation: &NewReservation) -> AppResult<Reservation>;
    async fn delete_reservation(&mut self, id: i32) -> AppResult<()>;

    async fn insert_loan(&mut self, loan: &NewLoan) -> AppResult<Loan>;
    /// Lock the loan row; serializes edits per loan
    async fn lock_loan(&mut self, id: i32) -> AppResult<Option<Loan>>;
    /// Persist `loan`, bumping its version
    async fn save_loan(&mut self, loan: &Loan) -> AppResult<Loan>;
    async fn delete_loan(&mut self, id: i32) -> AppResult<()>;

    async fn insert_fine(&mut self, fine: &NewFine) -> AppResult<Fine>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
}
