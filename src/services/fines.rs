//! Late-return fines: calculation and payment

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::{
    error::{AppError, AppResult},
    models::{
        fine::{CreateFine, Fine, FineFilter, NewFine},
        Caller,
    },
    repository::Repository,
};

use super::members::MembersService;

/// Fine owed for a return at `returned_at` against `due_date`.
///
/// Whole days late times `rate`; `None` when the return was on time or
/// less than a full day late.
pub fn calculate_fine(
    due_date: DateTime<Utc>,
    returned_at: DateTime<Utc>,
    rate: Decimal,
) -> Option<Decimal> {
    let days_late = (returned_at - due_date).num_days();
    (days_late > 0).then(|| Decimal::from(days_late) * rate)
}

#[derive(Clone)]
pub struct FinesService {
    repository: Repository,
    members: MembersService,
}

impl FinesService {
    pub fn new(repository: Repository, members: MembersService) -> Self {
        Self { repository, members }
    }

    /// Record payment of a fine. Paying twice fails with `AlreadyPaid`.
    pub async fn mark_paid(&self, caller: &Caller, id: i32) -> AppResult<Fine> {
        caller.require_admin()?;

        if let Some(fine) = self.repository.mark_fine_paid(id, Utc::now()).await? {
            tracing::info!("Fine paid: id={} amount={}", fine.id, fine.amount);
            return Ok(fine);
        }

        match self.repository.get_fine(id).await? {
            Some(_) => Err(AppError::AlreadyPaid(id)),
            None => Err(AppError::FineNotFound(id)),
        }
    }

    pub async fn get(&self, caller: &Caller, id: i32) -> AppResult<Fine> {
        let fine = self
            .repository
            .get_fine(id)
            .await?
            .ok_or(AppError::FineNotFound(id))?;

        if !caller.is_admin() {
            let loan = self
                .repository
                .get_loan(fine.loan_id)
                .await?
                .ok_or(AppError::LoanNotFound(fine.loan_id))?;
            self.members.authorize(caller, loan.member_id).await?;
        }
        Ok(fine)
    }

    /// Fines visible to the caller; members only ever see their own
    pub async fn list(&self, caller: &Caller, filter: FineFilter) -> AppResult<Vec<Fine>> {
        let filter = if caller.is_admin() {
            filter
        } else {
            let me = self.members.resolve(caller).await?;
            FineFilter {
                member_id: Some(me.id),
                ..filter
            }
        };
        self.repository.list_fines(&filter).await
    }

    pub async fn fines_by_member(&self, caller: &Caller, member_id: i32) -> AppResult<Vec<Fine>> {
        self.members.authorize(caller, member_id).await?;
        self.repository
            .list_fines(&FineFilter {
                member_id: Some(member_id),
                unpaid_only: None,
            })
            .await
    }

    pub async fn unpaid_fines(&self, caller: &Caller) -> AppResult<Vec<Fine>> {
        caller.require_admin()?;
        self.repository
            .list_fines(&FineFilter {
                member_id: None,
                unpaid_only: Some(true),
            })
            .await
    }

    /// Manual fine against a loan
    pub async fn create(&self, caller: &Caller, request: CreateFine) -> AppResult<Fine> {
        caller.require_admin()?;

        if request.amount <= Decimal::ZERO {
            return Err(AppError::Validation("Fine amount must be positive".to_string()));
        }
        if self.repository.get_loan(request.loan_id).await?.is_none() {
            return Err(AppError::LoanNotFound(request.loan_id));
        }

        let fine = self
            .repository
            .insert_fine(&NewFine {
                loan_id: request.loan_id,
                amount: request.amount,
                created_at: Utc::now(),
            })
            .await?;
        tracing::info!("Fine issued: id={} loan={} amount={}", fine.id, fine.loan_id, fine.amount);
        Ok(fine)
    }

    pub async fn delete(&self, caller: &Caller, id: i32) -> AppResult<()> {
        caller.require_admin()?;
        if !self.repository.delete_fine(id).await? {
            return Err(AppError::FineNotFound(id));
        }
        Ok(())
    }
}
