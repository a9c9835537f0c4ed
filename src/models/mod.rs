//! Data models for Biblio

pub mod book;
pub mod caller;
pub mod dashboard;
pub mod fine;
pub mod loan;
pub mod member;
pub mod reservation;

// Re-export commonly used types
pub use book::{Book, Category};
pub use caller::{Caller, Role};
pub use fine::Fine;
pub use loan::{Loan, LoanState};
pub use member::Member;
pub use reservation::Reservation;
