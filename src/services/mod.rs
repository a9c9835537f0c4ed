//! Business logic services

pub mod catalog;
pub mod dashboard;
pub mod fines;
pub mod loans;
pub mod members;
pub mod notifications;
pub mod reservations;

use std::sync::Arc;

use crate::{config::AppConfig, config::LoanPolicyConfig, repository::Repository};

use notifications::Notifier;

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub members: members::MembersService,
    pub loans: loans::LoansService,
    pub reservations: reservations::ReservationsService,
    pub fines: fines::FinesService,
    pub dashboard: dashboard::DashboardService,
    repository: Repository,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, config: &AppConfig) -> Self {
        Self::with_notifier(
            repository,
            config.loans.clone(),
            notifications::from_config(&config.email),
        )
    }

    pub fn with_notifier(
        repository: Repository,
        policy: LoanPolicyConfig,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let members = members::MembersService::new(repository.clone());

        Self {
            catalog: catalog::CatalogService::new(repository.clone()),
            loans: loans::LoansService::new(repository.clone(), members.clone(), notifier, policy),
            reservations: reservations::ReservationsService::new(repository.clone(), members.clone()),
            fines: fines::FinesService::new(repository.clone(), members.clone()),
            dashboard: dashboard::DashboardService::new(repository.clone(), members.clone()),
            members,
            repository,
        }
    }

    /// Store reachability, for the readiness check
    pub async fn ping(&self) -> crate::error::AppResult<()> {
        self.repository.ping().await
    }
}
