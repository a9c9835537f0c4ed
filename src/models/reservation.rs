//! Reservation model: a member's claim on the next freed copy of a book

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

/// Reservation model from database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Reservation {
    pub id: i32,
    pub book_id: i32,
    pub member_id: i32,
    pub reserved_at: DateTime<Utc>,
}

/// Fields for a reservation row about to be inserted
#[derive(Debug, Clone)]
pub struct NewReservation {
    pub book_id: i32,
    pub member_id: i32,
    pub reserved_at: DateTime<Utc>,
}

/// Create reservation request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateReservation {
    pub book_id: i32,
    /// Required for admins; members reserve for themselves
    pub member_id: Option<i32>,
}

/// Reservation listing filter
#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
pub struct ReservationFilter {
    pub member_id: Option<i32>,
    pub book_id: Option<i32>,
}

/// Queue order: oldest first, ids break timestamp ties
pub fn queue_order(a: &Reservation, b: &Reservation) -> std::cmp::Ordering {
    a.reserved_at.cmp(&b.reserved_at).then(a.id.cmp(&b.id))
}
