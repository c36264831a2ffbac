//! Business logic services

pub mod balance;
pub mod borrowing;
pub mod catalog;
pub mod email;
pub mod fine_policy;
pub mod fines;
pub mod loans;
pub mod overdue;

use std::sync::Arc;

use crate::{clock::Clock, config::AppConfig, repository::Store};

use self::email::{EmailNotifier, LogNotifier, Notifier};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub borrowing: borrowing::BorrowingWorkflow,
    pub fines: fines::FineService,
    pub overdue: overdue::OverdueScanner,
    pub policy: Arc<fine_policy::FinePolicyRegistry>,
}

impl Services {
    /// Wire every ledger over one store, clock and notifier
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        config: &AppConfig,
    ) -> Self {
        let policy = Arc::new(fine_policy::FinePolicyRegistry::from_config(&config.circulation));
        let catalog = catalog::MediaCatalog::new();
        let loans = loans::LoanLedger::new(catalog);
        let balance = balance::BalanceAccount::new();
        let fine_ledger = fines::FineLedger::new(balance, loans);

        Self {
            borrowing: borrowing::BorrowingWorkflow::new(
                store.clone(),
                clock.clone(),
                policy.clone(),
                catalog,
                loans,
                balance,
                fine_ledger,
            ),
            fines: fines::FineService::new(store.clone(), clock.clone(), fine_ledger, balance),
            overdue: overdue::OverdueScanner::new(
                store,
                clock,
                policy.clone(),
                catalog,
                loans,
                balance,
                fine_ledger,
                notifier,
            ),
            policy,
        }
    }

    /// Notifier selected by configuration
    pub fn notifier_from_config(config: &AppConfig) -> Arc<dyn Notifier> {
        if config.email.enabled {
            Arc::new(EmailNotifier::new(config.email.clone()))
        } else {
            Arc::new(LogNotifier)
        }
    }
}
