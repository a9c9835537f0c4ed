//! Loan (borrow) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

/// Whether the copy is still out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoanState {
    Active,
    Returned { returned_at: DateTime<Utc> },
}

impl LoanState {
    pub fn returned_at(&self) -> Option<DateTime<Utc>> {
        match self {
            LoanState::Active => None,
            LoanState::Returned { returned_at } => Some(*returned_at),
        }
    }
}

impl From<Option<DateTime<Utc>>> for LoanState {
    fn from(returned_at: Option<DateTime<Utc>>) -> Self {
        match returned_at {
            Some(returned_at) => LoanState::Returned { returned_at },
            None => LoanState::Active,
        }
    }
}

/// Loan model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    pub id: i32,
    pub book_id: i32,
    pub member_id: i32,
    pub loan_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub state: LoanState,
    pub version: i32,
}

impl Loan {
    pub fn is_returned(&self) -> bool {
        matches!(self.state, LoanState::Returned { .. })
    }

    /// Still out and past its due date
    pub fn is_late(&self, now: DateTime<Utc>) -> bool {
        !self.is_returned() && now > self.due_date
    }

    /// Returned after its due date
    pub fn was_returned_late(&self) -> bool {
        matches!(self.state, LoanState::Returned { returned_at } if returned_at > self.due_date)
    }
}

/// Database row for `loans`
#[derive(Debug, Clone, FromRow)]
pub struct LoanRow {
    pub id: i32,
    pub book_id: i32,
    pub member_id: i32,
    pub loan_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub version: i32,
}

impl From<LoanRow> for Loan {
    fn from(row: LoanRow) -> Self {
        Self {
            id: row.id,
            book_id: row.book_id,
            member_id: row.member_id,
            loan_date: row.loan_date,
            due_date: row.due_date,
            state: row.returned_at.into(),
            version: row.version,
        }
    }
}

/// Fields for a loan row about to be inserted
#[derive(Debug, Clone)]
pub struct NewLoan {
    pub book_id: i32,
    pub member_id: i32,
    pub loan_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
}

/// Create loan request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateLoan {
    pub book_id: i32,
    /// Required for admins; members borrow for themselves
    pub member_id: Option<i32>,
    /// Defaults to the configured loan duration
    pub due_date: Option<DateTime<Utc>>,
}

/// Administrative loan edit. Absent fields are left as they are;
/// setting `returned_at` on an active loan returns it.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateLoan {
    pub loan_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub returned_at: Option<DateTime<Utc>>,
    pub version: i32,
}

/// What an edit does to the loan's state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Unchanged,
    Returned(DateTime<Utc>),
}

impl UpdateLoan {
    /// Apply the edit on top of `loan` and report whether it is the return
    pub fn apply(&self, loan: &Loan) -> (Loan, Transition) {
        let (state, transition) = match (loan.state, self.returned_at) {
            (LoanState::Active, Some(returned_at)) => (
                LoanState::Returned { returned_at },
                Transition::Returned(returned_at),
            ),
            (LoanState::Returned { .. }, Some(returned_at)) => {
                (LoanState::Returned { returned_at }, Transition::Unchanged)
            }
            (state, None) => (state, Transition::Unchanged),
        };

        let updated = Loan {
            loan_date: self.loan_date.unwrap_or(loan.loan_date),
            due_date: self.due_date.unwrap_or(loan.due_date),
            state,
            ..loan.clone()
        };

        (updated, transition)
    }
}

/// Loan listing filter
#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
pub struct LoanFilter {
    pub member_id: Option<i32>,
    pub book_id: Option<i32>,
    /// Only loans not yet returned
    pub active_only: Option<bool>,
}

/// Loan as exposed over the API
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LoanResponse {
    pub id: i32,
    pub book_id: i32,
    pub member_id: i32,
    pub loan_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub is_returned: bool,
    pub is_late: bool,
    pub version: i32,
}

impl LoanResponse {
    pub fn new(loan: Loan, now: DateTime<Utc>) -> Self {
        Self {
            is_returned: loan.is_returned(),
            is_late: loan.is_late(now),
            returned_at: loan.state.returned_at(),
            id: loan.id,
            book_id: loan.book_id,
            member_id: loan.member_id,
            loan_date: loan.loan_date,
            due_date: loan.due_date,
            version: loan.version,
        }
    }
}
