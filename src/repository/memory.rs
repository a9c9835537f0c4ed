//! In-process store.
//!
//! One writer at a time: a transaction holds the store mutex from `begin`
//! until it is committed or dropped, and works on a staged copy of the
//! state so a dropped transaction leaves nothing behind. Cascades mirror
//! the foreign keys in `migrations/`.

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{LibraryStore, StoreTx};
use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookQuery, Category, CreateBook},
        dashboard::{AuthorCount, LibraryStats, MonthCount},
        fine::{Fine, FineFilter, NewFine},
        loan::{Loan, LoanFilter, LoanState, NewLoan},
        member::{Member, MemberQuery, NewMember},
        reservation::{queue_order, NewReservation, Reservation, ReservationFilter},
    },
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    books: BTreeMap<i32, Book>,
    categories: BTreeMap<i32, Category>,
    members: BTreeMap<i32, Member>,
    loans: BTreeMap<i32, Loan>,
    reservations: BTreeMap<i32, Reservation>,
    fines: BTreeMap<i32, Fine>,
    last_id: i32,
}

impl MemoryState {
    fn next_id(&mut self) -> i32 {
        self.last_id += 1;
        self.last_id
    }

    fn check_category(&self, category_id: Option<i32>) -> AppResult<()> {
        match category_id {
            Some(id) if !self.categories.contains_key(&id) => Err(AppError::Validation(
                "Book references a missing record".to_string(),
            )),
            _ => Ok(()),
        }
    }

    fn email_taken(&self, email: &str, except: Option<i32>) -> bool {
        self.members
            .values()
            .any(|m| m.email == email && Some(m.id) != except)
    }

    fn insert_member(&mut self, member: &NewMember) -> Member {
        let id = self.next_id();
        let created = Member {
            id,
            first_name: member.first_name.clone(),
            last_name: member.last_name.clone(),
            email: member.email.clone(),
            membership_date: member.membership_date,
        };
        self.members.insert(id, created.clone());
        created
    }

    fn first_reservation(&self, book_id: i32) -> Option<Reservation> {
        self.reservations
            .values()
            .filter(|r| r.book_id == book_id)
            .min_by(|a, b| queue_order(a, b))
            .cloned()
    }

    fn insert_loan(&mut self, loan: &NewLoan) -> AppResult<Loan> {
        if !self.books.contains_key(&loan.book_id) || !self.members.contains_key(&loan.member_id) {
            return Err(AppError::Validation("Loan references a missing record".to_string()));
        }
        let id = self.next_id();
        let created = Loan {
            id,
            book_id: loan.book_id,
            member_id: loan.member_id,
            loan_date: loan.loan_date,
            due_date: loan.due_date,
            state: LoanState::Active,
            version: 0,
        };
        self.loans.insert(id, created.clone());
        Ok(created)
    }

    fn insert_fine(&mut self, fine: &NewFine) -> AppResult<Fine> {
        if !self.loans.contains_key(&fine.loan_id) {
            return Err(AppError::Validation("Fine references a missing record".to_string()));
        }
        let id = self.next_id();
        let created = Fine {
            id,
            loan_id: fine.loan_id,
            amount: fine.amount,
            paid: false,
            created_at: fine.created_at,
            paid_at: None,
        };
        self.fines.insert(id, created.clone());
        Ok(created)
    }

    fn delete_loan(&mut self, id: i32) -> bool {
        let removed = self.loans.remove(&id).is_some();
        self.fines.retain(|_, f| f.loan_id != id);
        removed
    }

    fn delete_member(&mut self, id: i32) -> bool {
        let removed = self.members.remove(&id).is_some();
        self.delete_loans_where(|l| l.member_id == id);
        self.reservations.retain(|_, r| r.member_id != id);
        removed
    }

    fn delete_loans_where(&mut self, pred: impl Fn(&Loan) -> bool) {
        let ids: Vec<i32> = self.loans.values().filter(|l| pred(l)).map(|l| l.id).collect();
        for id in ids {
            self.delete_loan(id);
        }
    }
}

/// Store kept in process memory
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LibraryStore for MemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn StoreTx>> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryTx { guard, staged }))
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    async fn get_book(&self, id: i32) -> AppResult<Option<Book>> {
        Ok(self.state.lock().await.books.get(&id).cloned())
    }

    async fn list_books(&self, query: &BookQuery) -> AppResult<Vec<Book>> {
        let state = self.state.lock().await;
        let search = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty());

        let mut books: Vec<Book> = state
            .books
            .values()
            .filter(|b| search.map_or(true, |s| b.matches(s)))
            .filter(|b| query.category_id.map_or(true, |c| b.category_id == Some(c)))
            .filter(|b| !query.available_only.unwrap_or(false) || b.is_available())
            .cloned()
            .collect();
        books.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
        Ok(books)
    }

    async fn insert_book(&self, book: &CreateBook) -> AppResult<Book> {
        let mut state = self.state.lock().await;
        state.check_category(book.category_id)?;
        if book.available_copies < 0 {
            return Err(AppError::Validation("Book violates a constraint".to_string()));
        }

        let id = state.next_id();
        let created = Book {
            id,
            title: book.title.clone(),
            author: book.author.clone(),
            isbn: book.isbn.clone(),
            publication_year: book.publication_year,
            category_id: book.category_id,
            available_copies: book.available_copies,
            image_url: book.image_url.clone(),
            version: 0,
        };
        state.books.insert(id, created.clone());
        Ok(created)
    }

    async fn update_book(&self, book: &Book) -> AppResult<Book> {
        let mut state = self.state.lock().await;
        state.check_category(book.category_id)?;
        if book.available_copies < 0 {
            return Err(AppError::Validation("Book violates a constraint".to_string()));
        }

        let current = state
            .books
            .get_mut(&book.id)
            .ok_or(AppError::BookNotFound(book.id))?;
        if current.version != book.version {
            return Err(AppError::ConcurrencyConflict(format!("book {} was modified", book.id)));
        }
        *current = Book {
            version: book.version + 1,
            ..book.clone()
        };
        Ok(current.clone())
    }

    async fn delete_book(&self, id: i32) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        let removed = state.books.remove(&id).is_some();
        state.delete_loans_where(|l| l.book_id == id);
        state.reservations.retain(|_, r| r.book_id != id);
        Ok(removed)
    }

    async fn get_category(&self, id: i32) -> AppResult<Option<Category>> {
        Ok(self.state.lock().await.categories.get(&id).cloned())
    }

    async fn list_categories(&self) -> AppResult<Vec<Category>> {
        let state = self.state.lock().await;
        let mut categories: Vec<Category> = state.categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(categories)
    }

    async fn insert_category(&self, name: &str) -> AppResult<Category> {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        let created = Category {
            id,
            name: name.to_string(),
            version: 0,
        };
        state.categories.insert(id, created.clone());
        Ok(created)
    }

    async fn update_category(&self, category: &Category) -> AppResult<Category> {
        let mut state = self.state.lock().await;
        let current = state.categories.get_mut(&category.id).ok_or_else(|| {
            AppError::NotFound(format!("Category with id {} not found", category.id))
        })?;
        if current.version != category.version {
            return Err(AppError::ConcurrencyConflict(format!(
                "category {} was modified",
                category.id
            )));
        }
        current.name = category.name.clone();
        current.version += 1;
        Ok(current.clone())
    }

    async fn delete_category(&self, id: i32) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        let removed = state.categories.remove(&id).is_some();
        for book in state.books.values_mut() {
            if book.category_id == Some(id) {
                book.category_id = None;
            }
        }
        Ok(removed)
    }

    async fn get_member(&self, id: i32) -> AppResult<Option<Member>> {
        Ok(self.state.lock().await.members.get(&id).cloned())
    }

    async fn find_member_by_email(&self, email: &str) -> AppResult<Option<Member>> {
        let state = self.state.lock().await;
        Ok(state.members.values().find(|m| m.email == email).cloned())
    }

    async fn list_members(&self, query: &MemberQuery) -> AppResult<Vec<Member>> {
        let state = self.state.lock().await;
        let search = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty());

        let mut members: Vec<Member> = state
            .members
            .values()
            .filter(|m| search.map_or(true, |s| m.matches(s)))
            .cloned()
            .collect();
        members.sort_by(|a, b| {
            a.last_name
                .cmp(&b.last_name)
                .then(a.first_name.cmp(&b.first_name))
                .then(a.id.cmp(&b.id))
        });
        Ok(members)
    }

    async fn insert_member(&self, member: &NewMember) -> AppResult<Member> {
        let mut state = self.state.lock().await;
        if state.email_taken(&member.email, None) {
            return Err(AppError::Conflict("Member email already exists".to_string()));
        }
        Ok(state.insert_member(member))
    }

    async fn insert_member_if_absent(&self, member: &NewMember) -> AppResult<Option<Member>> {
        let mut state = self.state.lock().await;
        if state.email_taken(&member.email, None) {
            return Ok(None);
        }
        Ok(Some(state.insert_member(member)))
    }

    async fn update_member(&self, member: &Member) -> AppResult<Member> {
        let mut state = self.state.lock().await;
        if state.email_taken(&member.email, Some(member.id)) {
            return Err(AppError::Conflict("Member email already exists".to_string()));
        }
        let current = state
            .members
            .get_mut(&member.id)
            .ok_or_else(|| AppError::NotFound(format!("Member with id {} not found", member.id)))?;
        *current = member.clone();
        Ok(current.clone())
    }

    async fn get_loan(&self, id: i32) -> AppResult<Option<Loan>> {
        Ok(self.state.lock().await.loans.get(&id).cloned())
    }

    async fn list_loans(&self, filter: &LoanFilter) -> AppResult<Vec<Loan>> {
        let state = self.state.lock().await;
        let mut loans: Vec<Loan> = state
            .loans
            .values()
            .filter(|l| filter.member_id.map_or(true, |m| l.member_id == m))
            .filter(|l| filter.book_id.map_or(true, |b| l.book_id == b))
            .filter(|l| !filter.active_only.unwrap_or(false) || !l.is_returned())
            .cloned()
            .collect();
        loans.sort_by(|a, b| b.loan_date.cmp(&a.loan_date).then(b.id.cmp(&a.id)));
        Ok(loans)
    }

    async fn list_late_loans(&self, now: DateTime<Utc>) -> AppResult<Vec<Loan>> {
        let state = self.state.lock().await;
        let mut loans: Vec<Loan> = state.loans.values().filter(|l| l.is_late(now)).cloned().collect();
        loans.sort_by(|a, b| a.due_date.cmp(&b.due_date).then(a.id.cmp(&b.id)));
        Ok(loans)
    }

    async fn get_reservation(&self, id: i32) -> AppResult<Option<Reservation>> {
        Ok(self.state.lock().await.reservations.get(&id).cloned())
    }

    async fn list_reservations(&self, filter: &ReservationFilter) -> AppResult<Vec<Reservation>> {
        let state = self.state.lock().await;
        let mut reservations: Vec<Reservation> = state
            .reservations
            .values()
            .filter(|r| filter.member_id.map_or(true, |m| r.member_id == m))
            .filter(|r| filter.book_id.map_or(true, |b| r.book_id == b))
            .cloned()
            .collect();
        reservations.sort_by(queue_order);
        Ok(reservations)
    }

    async fn delete_reservation(&self, id: i32) -> AppResult<bool> {
        Ok(self.state.lock().await.reservations.remove(&id).is_some())
    }

    async fn get_fine(&self, id: i32) -> AppResult<Option<Fine>> {
        Ok(self.state.lock().await.fines.get(&id).cloned())
    }

    async fn list_fines(&self, filter: &FineFilter) -> AppResult<Vec<Fine>> {
        let state = self.state.lock().await;
        let mut fines: Vec<Fine> = state
            .fines
            .values()
            .filter(|f| {
                filter.member_id.map_or(true, |m| {
                    state.loans.get(&f.loan_id).map_or(false, |l| l.member_id == m)
                })
            })
            .filter(|f| !filter.unpaid_only.unwrap_or(false) || !f.paid)
            .cloned()
            .collect();
        fines.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(fines)
    }

    async fn insert_fine(&self, fine: &NewFine) -> AppResult<Fine> {
        self.state.lock().await.insert_fine(fine)
    }

    async fn mark_fine_paid(&self, id: i32, paid_at: DateTime<Utc>) -> AppResult<Option<Fine>> {
        let mut state = self.state.lock().await;
        match state.fines.get_mut(&id) {
            Some(fine) if !fine.paid => {
                fine.paid = true;
                fine.paid_at = Some(paid_at);
                Ok(Some(fine.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete_fine(&self, id: i32) -> AppResult<bool> {
        Ok(self.state.lock().await.fines.remove(&id).is_some())
    }

    async fn library_stats(&self, now: DateTime<Utc>) -> AppResult<LibraryStats> {
        use chrono::Datelike;

        let state = self.state.lock().await;

        let mut by_author: BTreeMap<String, i64> = BTreeMap::new();
        for book in state.books.values() {
            *by_author.entry(book.author.clone()).or_default() += 1;
        }

        let mut by_month: BTreeMap<u32, i64> = BTreeMap::new();
        for loan in state.loans.values() {
            *by_month.entry(loan.loan_date.month()).or_default() += 1;
        }

        Ok(LibraryStats {
            total_books: state.books.len() as i64,
            total_members: state.members.len() as i64,
            active_loans: state.loans.values().filter(|l| !l.is_returned()).count() as i64,
            late_loans: state.loans.values().filter(|l| l.is_late(now)).count() as i64,
            total_reservations: state.reservations.len() as i64,
            books_by_author: by_author
                .into_iter()
                .map(|(author, count)| AuthorCount { author, count })
                .collect(),
            loans_per_month: by_month
                .into_iter()
                .map(|(month, count)| MonthCount::new(month, count))
                .collect(),
        })
    }
}

/// Exclusive transaction over the in-memory state
pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn lock_member(&mut self, id: i32) -> AppResult<Option<Member>> {
        Ok(self.staged.members.get(&id).cloned())
    }

    async fn count_active_loans(&mut self, member_id: i32) -> AppResult<i64> {
        let count = self
            .staged
            .loans
            .values()
            .filter(|l| l.member_id == member_id && !l.is_returned())
            .count();
        Ok(count as i64)
    }

    async fn has_active_loan(&mut self, member_id: i32, book_id: i32) -> AppResult<bool> {
        Ok(self
            .staged
            .loans
            .values()
            .any(|l| l.member_id == member_id && l.book_id == book_id && !l.is_returned()))
    }

    async fn lock_active_loans(&mut self, member_id: i32) -> AppResult<Vec<Loan>> {
        Ok(self
            .staged
            .loans
            .values()
            .filter(|l| l.member_id == member_id && !l.is_returned())
            .cloned()
            .collect())
    }

    async fn delete_member(&mut self, id: i32) -> AppResult<bool> {
        Ok(self.staged.delete_member(id))
    }

    async fn lock_book(&mut self, id: i32) -> AppResult<Option<Book>> {
        Ok(self.staged.books.get(&id).cloned())
    }

    async fn set_available_copies(&mut self, book_id: i32, copies: i32) -> AppResult<()> {
        if copies < 0 {
            return Err(AppError::Validation("Book stock violates a constraint".to_string()));
        }
        if let Some(book) = self.staged.books.get_mut(&book_id) {
            book.available_copies = copies;
            book.version += 1;
        }
        Ok(())
    }

    async fn first_reservation(&mut self, book_id: i32) -> AppResult<Option<Reservation>> {
        Ok(self.staged.first_reservation(book_id))
    }

    async fn insert_reservation(&mut self, reservation: &NewReservation) -> AppResult<Reservation> {
        if !self.staged.books.contains_key(&reservation.book_id)
            || !self.staged.members.contains_key(&reservation.member_id)
        {
            return Err(AppError::Validation(
                "Reservation references a missing record".to_string(),
            ));
        }
        let id = self.staged.next_id();
        let created = Reservation {
            id,
            book_id: reservation.book_id,
            member_id: reservation.member_id,
            reserved_at: reservation.reserved_at,
        };
        self.staged.reservations.insert(id, created.clone());
        Ok(created)
    }

    async fn delete_reservation(&mut self, id: i32) -> AppResult<()> {
        self.staged.reservations.remove(&id);
        Ok(())
    }

    async fn insert_loan(&mut self, loan: &NewLoan) -> AppResult<Loan> {
        self.staged.insert_loan(loan)
    }

    async fn lock_loan(&mut self, id: i32) -> AppResult<Option<Loan>> {
        Ok(self.staged.loans.get(&id).cloned())
    }

    async fn save_loan(&mut self, loan: &Loan) -> AppResult<Loan> {
        let current = self
            .staged
            .loans
            .get_mut(&loan.id)
            .ok_or(AppError::LoanNotFound(loan.id))?;
        *current = Loan {
            version: current.version + 1,
            ..loan.clone()
        };
        Ok(current.clone())
    }

    async fn delete_loan(&mut self, id: i32) -> AppResult<()> {
        self.staged.delete_loan(id);
        Ok(())
    }

    async fn insert_fine(&mut self, fine: &NewFine) -> AppResult<Fine> {
        self.staged.insert_fine(fine)
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryTx { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_book(copies: i32) -> CreateBook {
        CreateBook {
            title: "Dune".into(),
            author: "Frank Herbert".into(),
            isbn: "978-0441013593".into(),
            publication_year: 1965,
            category_id: None,
            available_copies: copies,
            image_url: None,
        }
    }

    fn new_member(email: &str) -> NewMember {
        NewMember::from_email(email, Utc::now())
    }

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let store = MemoryStore::new();
        let book = store.insert_book(&new_book(1)).await.unwrap();

        {
            let mut tx = store.begin().await.unwrap();
            tx.set_available_copies(book.id, 0).await.unwrap();
        }

        let reloaded = store.get_book(book.id).await.unwrap().unwrap();
        assert_eq!(reloaded.available_copies, 1);
    }

    #[tokio::test]
    async fn test_committed_transaction_is_visible() {
        let store = MemoryStore::new();
        let book = store.insert_book(&new_book(1)).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.set_available_copies(book.id, 0).await.unwrap();
        tx.commit().await.unwrap();

        let reloaded = store.get_book(book.id).await.unwrap().unwrap();
        assert_eq!(reloaded.available_copies, 0);
        assert_eq!(reloaded.version, book.version + 1);
    }

    #[tokio::test]
    async fn test_stale_book_version_conflicts() {
        let store = MemoryStore::new();
        let book = store.insert_book(&new_book(2)).await.unwrap();

        let mut first = book.clone();
        first.title = "Dune Messiah".into();
        store.update_book(&first).await.unwrap();

        let mut second = book.clone();
        second.title = "Children of Dune".into();
        let err = store.update_book(&second).await.unwrap_err();
        assert!(matches!(err, AppError::ConcurrencyConflict(_)));
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = MemoryStore::new();
        store.insert_member(&new_member("a@example.org")).await.unwrap();

        let err = store.insert_member(&new_member("a@example.org")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(store
            .insert_member_if_absent(&new_member("a@example.org"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_member_delete_cascades() {
        let store = MemoryStore::new();
        let book = store.insert_book(&new_book(1)).await.unwrap();
        let member = store.insert_member(&new_member("b@example.org")).await.unwrap();
        let now = Utc::now();

        let mut tx = store.begin().await.unwrap();
        let loan = tx
            .insert_loan(&NewLoan {
                book_id: book.id,
                member_id: member.id,
                loan_date: now,
                due_date: now + Duration::days(14),
            })
            .await
            .unwrap();
        tx.insert_fine(&NewFine {
            loan_id: loan.id,
            amount: rust_decimal::Decimal::new(5, 0),
            created_at: now,
        })
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.lock_active_loans(member.id).await.unwrap().len(), 1);
        assert!(tx.delete_member(member.id).await.unwrap());
        tx.commit().await.unwrap();

        assert!(store.get_member(member.id).await.unwrap().is_none());
        assert!(store.get_loan(loan.id).await.unwrap().is_none());
        assert!(store.list_fines(&FineFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mark_paid_only_once() {
        let store = MemoryStore::new();
        let book = store.insert_book(&new_book(1)).await.unwrap();
        let member = store.insert_member(&new_member("c@example.org")).await.unwrap();
        let now = Utc::now();

        let mut tx = store.begin().await.unwrap();
        let loan = tx
            .insert_loan(&NewLoan {
                book_id: book.id,
                member_id: member.id,
                loan_date: now,
                due_date: now,
            })
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let fine = store
            .insert_fine(&NewFine {
                loan_id: loan.id,
                amount: rust_decimal::Decimal::new(10, 0),
                created_at: now,
            })
            .await
            .unwrap();

        assert!(store.mark_fine_paid(fine.id, now).await.unwrap().is_some());
        assert!(store.mark_fine_paid(fine.id, now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_loans_per_month_use_utc_month() {
        use chrono::TimeZone;

        let store = MemoryStore::new();
        let book = store.insert_book(&new_book(2)).await.unwrap();
        let member = store.insert_member(&new_member("d@example.org")).await.unwrap();
        // late evening UTC on the last day of March; already April east of Greenwich
        let loan_date = Utc.with_ymd_and_hms(2026, 3, 31, 23, 30, 0).unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.insert_loan(&NewLoan {
            book_id: book.id,
            member_id: member.id,
            loan_date,
            due_date: loan_date + Duration::days(14),
        })
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let stats = store.library_stats(Utc::now()).await.unwrap();
        assert_eq!(stats.loans_per_month.len(), 1);
        assert_eq!(stats.loans_per_month[0].month, 3);
        assert_eq!(stats.loans_per_month[0].count, 1);
    }
}
