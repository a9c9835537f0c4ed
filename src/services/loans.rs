//! Loan lifecycle: borrowing, returning and administrative edits.
//!
//! Every check-then-write runs inside one store transaction. The member row
//! is locked before the capacity and duplicate checks and the book row
//! before any stock change, so concurrent requests for the same member or
//! the same book are serialized.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::{
    config::LoanPolicyConfig,
    error::{AppError, AppResult},
    models::{
        fine::{Fine, NewFine},
        loan::{CreateLoan, Loan, LoanFilter, LoanState, NewLoan, Transition, UpdateLoan},
        reservation::Reservation,
        Caller,
    },
    repository::{Repository, StoreTx},
};

use super::{
    fines::calculate_fine,
    members::{ensure_owner, MembersService},
    notifications::{BookAvailableNotice, Notifier},
};

/// Side effects of closing a loan
struct Closing {
    fine: Option<Fine>,
    next_in_line: Option<Reservation>,
}

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
    members: MembersService,
    notifier: Arc<dyn Notifier>,
    policy: LoanPolicyConfig,
}

impl LoansService {
    pub fn new(
        repository: Repository,
        members: MembersService,
        notifier: Arc<dyn Notifier>,
        policy: LoanPolicyConfig,
    ) -> Self {
        Self {
            repository,
            members,
            notifier,
            policy,
        }
    }

    /// Lend a book.
    ///
    /// Checks run in a fixed order and the first failure wins: capacity,
    /// duplicate active loan, book existence, a requested due date in the
    /// past, then stock or reservation.
    /// With stock left a copy is taken off the shelf. With none, only the
    /// member at the head of the book's queue may borrow; their reservation
    /// is consumed and the count stays at zero.
    pub async fn create_loan(&self, caller: &Caller, request: CreateLoan) -> AppResult<Loan> {
        let member_id = self.members.acting_member_id(caller, request.member_id).await?;

        let now = Utc::now();
        let due_date = request
            .due_date
            .unwrap_or_else(|| now + Duration::days(self.policy.loan_duration_days));

        let mut tx = self.repository.begin().await?;

        if tx.lock_member(member_id).await?.is_none() {
            return Err(AppError::NotFound(format!("Member with id {} not found", member_id)));
        }

        let active = tx.count_active_loans(member_id).await?;
        if active >= i64::from(self.policy.max_active_loans) {
            return Err(AppError::CapacityExceeded {
                limit: self.policy.max_active_loans,
            });
        }

        if tx.has_active_loan(member_id, request.book_id).await? {
            return Err(AppError::DuplicateActiveLoan);
        }

        let book = tx
            .lock_book(request.book_id)
            .await?
            .ok_or(AppError::BookNotFound(request.book_id))?;

        if due_date <= now {
            return Err(AppError::Validation("Due date must be in the future".to_string()));
        }

        if book.is_available() {
            tx.set_available_copies(book.id, book.available_copies - 1).await?;
        } else {
            match tx.first_reservation(book.id).await? {
                None => return Err(AppError::OutOfStockNoReservation),
                Some(reservation) if reservation.member_id == member_id => {
                    tx.delete_reservation(reservation.id).await?;
                    tracing::info!(
                        "Reservation {} fulfilled for member {} on book {}",
                        reservation.id,
                        member_id,
                        book.id
                    );
                }
                Some(_) => return Err(AppError::ReservedByOther),
            }
        }

        let loan = tx
            .insert_loan(&NewLoan {
                book_id: book.id,
                member_id,
                loan_date: now,
                due_date,
            })
            .await?;
        tx.commit().await?;

        tracing::info!(
            "Loan created: id={} book={} member={} due={}",
            loan.id,
            loan.book_id,
            loan.member_id,
            loan.due_date
        );
        Ok(loan)
    }

    /// Return a loan now. Owners may return their own loans.
    pub async fn return_loan(&self, caller: &Caller, id: i32) -> AppResult<Loan> {
        // resolved before the transaction opens
        let scope = self.members.scope(caller).await?;

        let mut tx = self.repository.begin().await?;

        let loan = tx.lock_loan(id).await?.ok_or(AppError::LoanNotFound(id))?;
        ensure_owner(scope, loan.member_id)?;
        if loan.is_returned() {
            return Err(AppError::AlreadyReturned(id));
        }

        let returned_at = Utc::now();
        let returned = tx
            .save_loan(&Loan {
                state: LoanState::Returned { returned_at },
                ..loan
            })
            .await?;
        let closing = self.close(tx.as_mut(), &returned, returned_at).await?;
        tx.commit().await?;

        self.after_close(&returned, closing);
        Ok(returned)
    }

    /// Administrative edit of dates.
    ///
    /// The first time a return date appears the loan is closed exactly as
    /// by [`LoansService::return_loan`]. `version` must match the stored one.
    pub async fn update_loan(&self, caller: &Caller, id: i32, request: UpdateLoan) -> AppResult<Loan> {
        caller.require_admin()?;

        let mut tx = self.repository.begin().await?;

        let current = tx.lock_loan(id).await?.ok_or(AppError::LoanNotFound(id))?;
        if current.version != request.version {
            return Err(AppError::ConcurrencyConflict(format!("loan {} was modified", id)));
        }

        let (edited, transition) = request.apply(&current);
        if edited.due_date < edited.loan_date {
            return Err(AppError::Validation(
                "Due date cannot precede the loan date".to_string(),
            ));
        }
        if let Some(returned_at) = edited.state.returned_at() {
            if returned_at < edited.loan_date {
                return Err(AppError::Validation(
                    "Return date cannot precede the loan date".to_string(),
                ));
            }
        }

        let saved = tx.save_loan(&edited).await?;
        let closing = match transition {
            Transition::Returned(returned_at) => Some(self.close(tx.as_mut(), &saved, returned_at).await?),
            Transition::Unchanged => None,
        };
        tx.commit().await?;

        if let Some(closing) = closing {
            self.after_close(&saved, closing);
        }
        Ok(saved)
    }

    /// Delete a loan. An active loan puts its copy back on the shelf.
    pub async fn delete_loan(&self, caller: &Caller, id: i32) -> AppResult<()> {
        caller.require_admin()?;

        let mut tx = self.repository.begin().await?;
        let loan = tx.lock_loan(id).await?.ok_or(AppError::LoanNotFound(id))?;

        if !loan.is_returned() {
            if let Some(book) = tx.lock_book(loan.book_id).await? {
                tx.set_available_copies(book.id, book.available_copies + 1).await?;
            }
        }
        tx.delete_loan(id).await?;
        tx.commit().await?;

        tracing::info!("Loan deleted: id={}", id);
        Ok(())
    }

    pub async fn get_loan(&self, caller: &Caller, id: i32) -> AppResult<Loan> {
        let loan = self
            .repository
            .get_loan(id)
            .await?
            .ok_or(AppError::LoanNotFound(id))?;
        self.members.authorize(caller, loan.member_id).await?;
        Ok(loan)
    }

    /// Loans visible to the caller; members only ever see their own
    pub async fn list_loans(&self, caller: &Caller, filter: LoanFilter) -> AppResult<Vec<Loan>> {
        let filter = if caller.is_admin() {
            filter
        } else {
            let me = self.members.resolve(caller).await?;
            LoanFilter {
                member_id: Some(me.id),
                ..filter
            }
        };
        self.repository.list_loans(&filter).await
    }

    pub async fn loans_by_member(&self, caller: &Caller, member_id: i32) -> AppResult<Vec<Loan>> {
        self.members.authorize(caller, member_id).await?;
        self.repository
            .list_loans(&LoanFilter {
                member_id: Some(member_id),
                ..LoanFilter::default()
            })
            .await
    }

    pub async fn late_loans(&self, caller: &Caller) -> AppResult<Vec<Loan>> {
        caller.require_admin()?;
        self.repository.list_late_loans(Utc::now()).await
    }

    /// Book keeping for a loan that has just been returned: stock back up,
    /// note who is next in line, fine if late.
    async fn close(
        &self,
        tx: &mut dyn StoreTx,
        loan: &Loan,
        returned_at: DateTime<Utc>,
    ) -> AppResult<Closing> {
        if let Some(book) = tx.lock_book(loan.book_id).await? {
            tx.set_available_copies(book.id, book.available_copies + 1).await?;
        }

        let next_in_line = tx.first_reservation(loan.book_id).await?;

        let fine = match calculate_fine(loan.due_date, returned_at, self.policy.fine_per_day) {
            Some(amount) => Some(
                tx.insert_fine(&NewFine {
                    loan_id: loan.id,
                    amount,
                    created_at: returned_at,
                })
                .await?,
            ),
            None => None,
        };

        Ok(Closing { fine, next_in_line })
    }

    fn after_close(&self, loan: &Loan, closing: Closing) {
        tracing::info!("Loan returned: id={} book={}", loan.id, loan.book_id);
        if let Some(fine) = &closing.fine {
            tracing::info!("Fine issued: id={} loan={} amount={}", fine.id, loan.id, fine.amount);
        }
        if let Some(reservation) = closing.next_in_line {
            self.notify_next_in_line(reservation);
        }
    }

    /// Fire-and-forget; failures are logged and never reach the caller
    fn notify_next_in_line(&self, reservation: Reservation) {
        let repository = self.repository.clone();
        let notifier = self.notifier.clone();

        tokio::spawn(async move {
            let notice = async {
                let member = repository.get_member(reservation.member_id).await?;
                let book = repository.get_book(reservation.book_id).await?;
                Ok::<_, AppError>(member.zip(book).map(|(member, book)| BookAvailableNotice {
                    reservation_id: reservation.id,
                    member,
                    book,
                }))
            };

            let result = match notice.await {
                Ok(Some(notice)) => notifier.book_available(&notice).await,
                Ok(None) => Ok(()),
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                tracing::warn!(
                    "Book-available notice for reservation {} failed: {}",
                    reservation.id,
                    e
                );
            }
        });
    }
}
