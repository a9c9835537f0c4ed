//! Fine (late-return penalty) model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

/// Fine model from database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Fine {
    pub id: i32,
    pub loan_id: i32,
    pub amount: Decimal,
    pub paid: bool,
    pub created_at: DateTime<Utc>,
    /// Set once when paid, never cleared
    pub paid_at: Option<DateTime<Utc>>,
}

/// Fields for a fine row about to be inserted
#[derive(Debug, Clone)]
pub struct NewFine {
    pub loan_id: i32,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Manual fine created by an admin
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateFine {
    pub loan_id: i32,
    pub amount: Decimal,
}

/// Fine listing filter
#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
pub struct FineFilter {
    pub member_id: Option<i32>,
    pub unpaid_only: Option<bool>,
}
