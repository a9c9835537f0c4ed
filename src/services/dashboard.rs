//! Dashboard projections

use chrono::Utc;

use crate::{
    error::AppResult,
    models::{
        book::BookQuery,
        dashboard::{LibraryStats, MemberDashboard},
        fine::FineFilter,
        loan::{LoanFilter, LoanResponse},
        reservation::ReservationFilter,
        Caller,
    },
    repository::Repository,
};

use super::members::MembersService;

#[derive(Clone)]
pub struct DashboardService {
    repository: Repository,
    members: MembersService,
}

impl DashboardService {
    pub fn new(repository: Repository, members: MembersService) -> Self {
        Self { repository, members }
    }

    pub async fn library_stats(&self, caller: &Caller) -> AppResult<LibraryStats> {
        caller.require_admin()?;
        self.repository.library_stats(Utc::now()).await
    }

    pub async fn member_dashboard(&self, caller: &Caller) -> AppResult<MemberDashboard> {
        let member = self.members.resolve(caller).await?;
        let now = Utc::now();

        let available_books = self
            .repository
            .list_books(&BookQuery {
                available_only: Some(true),
                ..BookQuery::default()
            })
            .await?;

        let loans: Vec<LoanResponse> = self
            .repository
            .list_loans(&LoanFilter {
                member_id: Some(member.id),
                ..LoanFilter::default()
            })
            .await?
            .into_iter()
            .map(|loan| LoanResponse::new(loan, now))
            .collect();

        let reservations = self
            .repository
            .list_reservations(&ReservationFilter {
                member_id: Some(member.id),
                book_id: None,
            })
            .await?;

        let unpaid_fines = self
            .repository
            .list_fines(&FineFilter {
                member_id: Some(member.id),
                unpaid_only: Some(true),
            })
            .await?;

        let late_loans: Vec<LoanResponse> = loans.iter().filter(|l| l.is_late).cloned().collect();
        let active_loans_count = loans.iter().filter(|l| !l.is_returned).count();

        Ok(MemberDashboard {
            member,
            available_books,
            active_loans_count,
            late_loans_count: late_loans.len(),
            reservations_count: reservations.len(),
            unpaid_fines_count: unpaid_fines.len(),
            loans,
            reservations,
            late_loans,
            unpaid_fines,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::LoanPolicyConfig,
        models::{book::CreateBook, loan::CreateLoan},
        repository::{LibraryStore, MemoryStore},
        services::{loans::LoansService, notifications::LogNotifier},
    };
    use std::sync::Arc;

    #[tokio::test]
    async fn test_member_dashboard_counts() {
        let store = Arc::new(MemoryStore::new());
        let book = store
            .insert_book(&CreateBook {
                title: "Madame Bovary".into(),
                author: "Gustave Flaubert".into(),
                isbn: "978-2070413119".into(),
                publication_year: 1857,
                category_id: None,
                available_copies: 2,
                image_url: None,
            })
            .await
            .unwrap();

        let repository: Repository = store;
        let members = MembersService::new(repository.clone());
        let loans = LoansService::new(
            repository.clone(),
            members.clone(),
            Arc::new(LogNotifier),
            LoanPolicyConfig::default(),
        );
        let dashboard = DashboardService::new(repository, members);

        let caller = Caller::member("emma@example.org");
        loans
            .create_loan(&caller, CreateLoan { book_id: book.id, member_id: None, due_date: None })
            .await
            .unwrap();

        let view = dashboard.member_dashboard(&caller).await.unwrap();
        assert_eq!(view.member.email, "emma@example.org");
        assert_eq!(view.active_loans_count, 1);
        assert_eq!(view.late_loans_count, 0);
        assert_eq!(view.available_books.len(), 1);
        assert_eq!(view.unpaid_fines_count, 0);

        let stats = dashboard
            .library_stats(&Caller::admin("admin@example.org"))
            .await
            .unwrap();
        assert_eq!(stats.total_books, 1);
        assert_eq!(stats.total_members, 1);
        assert_eq!(stats.active_loans, 1);
        assert_eq!(stats.books_by_author[0].author, "Gustave Flaubert");
        assert_eq!(stats.loans_per_month.iter().map(|m| m.count).sum::<i64>(), 1);
    }

    #[tokio::test]
    async fn test_stats_are_admin_only() {
        let repository: Repository = Arc::new(MemoryStore::new());
        let dashboard = DashboardService::new(repository.clone(), MembersService::new(repository));
        assert!(dashboard
            .library_stats(&Caller::member("m@example.org"))
            .await
            .is_err());
    }
}
