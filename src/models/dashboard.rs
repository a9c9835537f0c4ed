//! Read-only dashboard projections

use serde::Serialize;
use utoipa::ToSchema;

use super::{book::Book, fine::Fine, loan::LoanResponse, member::Member, reservation::Reservation};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct AuthorCount {
    pub author: String,
    pub count: i64,
}

/// Loans started in a calendar month, all years combined
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct MonthCount {
    pub month: u32,
    pub name: String,
    pub count: i64,
}

impl MonthCount {
    pub fn new(month: u32, count: i64) -> Self {
        let name = u8::try_from(month)
            .ok()
            .and_then(|m| chrono::Month::try_from(m).ok())
            .map(|m| m.name().to_string())
            .unwrap_or_default();
        Self { month, name, count }
    }
}

/// Library-wide figures for the admin dashboard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct LibraryStats {
    pub total_books: i64,
    pub total_members: i64,
    pub active_loans: i64,
    pub late_loans: i64,
    pub total_reservations: i64,
    pub books_by_author: Vec<AuthorCount>,
    pub loans_per_month: Vec<MonthCount>,
}

/// Everything a member sees on their home page
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MemberDashboard {
    pub member: Member,
    pub available_books: Vec<Book>,
    pub loans: Vec<LoanResponse>,
    pub reservations: Vec<Reservation>,
    pub late_loans: Vec<LoanResponse>,
    pub unpaid_fines: Vec<Fine>,
    pub active_loans_count: usize,
    pub late_loans_count: usize,
    pub reservations_count: usize,
    pub unpaid_fines_count: usize,
}
