//! Overdue detection and fine accrual.
//!
//! A scan lists every candidate loan, then processes each one in its own
//! transaction: a failure on one loan is logged and counted, the rest of
//! the batch carries on. A scan is therefore not atomic, but re-running it
//! is safe: a fine touched today is never accrued again the same day.
//!
//! Fine amounts:
//! - first detection: daily rate of the media type times days past due
//! - later scans: one unit per day elapsed since the fine was last touched,
//!   whatever the media type

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::{
    clock::Clock,
    error::AppResult,
    models::{Borrowing, BorrowingStatus, Caller},
    repository::Store,
};

use super::{
    balance::BalanceAccount,
    catalog::MediaCatalog,
    email::{overdue_message, Notifier},
    fine_policy::FinePolicyRegistry,
    fines::FineLedger,
    loans::LoanLedger,
};

/// Summary of one scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct ScanReport {
    pub examined: usize,
    pub issued: usize,
    pub accrued: usize,
    pub skipped: usize,
    pub failed: usize,
    pub notified: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Issued,
    Accrued,
    Skipped,
}

#[derive(Clone)]
pub struct OverdueScanner {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    policy: Arc<FinePolicyRegistry>,
    catalog: MediaCatalog,
    loans: LoanLedger,
    balance: BalanceAccount,
    fines: FineLedger,
    notifier: Arc<dyn Notifier>,
}

impl OverdueScanner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        policy: Arc<FinePolicyRegistry>,
        catalog: MediaCatalog,
        loans: LoanLedger,
        balance: BalanceAccount,
        fines: FineLedger,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            clock,
            policy,
            catalog,
            loans,
            balance,
            fines,
            notifier,
        }
    }

    /// Flag late loans overdue, issue or accrue their fines, then notify
    /// each affected user
    pub async fn detect_and_issue(&self, caller: &Caller) -> AppResult<ScanReport> {
        caller.require_librarian()?;
        let today = self.clock.today();

        let candidates = self.candidates(today).await?;
        let mut report = ScanReport {
            examined: candidates.len(),
            ..ScanReport::default()
        };
        let mut affected = BTreeSet::new();

        for candidate in &candidates {
            affected.insert(candidate.user_id);
            match self.process(candidate.id, today).await {
                Ok(Outcome::Issued) => report.issued += 1,
                Ok(Outcome::Accrued) => report.accrued += 1,
                Ok(Outcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    tracing::warn!(borrow_id = candidate.id, "Overdue processing failed: {}", e);
                    report.failed += 1;
                }
            }
        }

        report.notified = self.notify_users(affected, today).await;

        tracing::info!(
            examined = report.examined,
            issued = report.issued,
            accrued = report.accrued,
            skipped = report.skipped,
            failed = report.failed,
            notified = report.notified,
            "Overdue scan completed"
        );

        Ok(report)
    }

    /// Remind every user holding late loans, without touching any fine
    pub async fn send_overdue_reminders(&self, caller: &Caller) -> AppResult<usize> {
        caller.require_librarian()?;
        let today = self.clock.today();

        let users: BTreeSet<i32> = self
            .candidates(today)
            .await?
            .iter()
            .map(|b| b.user_id)
            .collect();
        let notified = self.notify_users(users, today).await;

        tracing::info!(notified, "Overdue reminders sent");
        Ok(notified)
    }

    async fn candidates(&self, today: NaiveDate) -> AppResult<Vec<Borrowing>> {
        let mut tx = self.store.begin().await?;
        let candidates = self.loans.overdue_candidates(tx.as_mut(), today).await?;
        tx.commit().await?;
        Ok(candidates)
    }

    async fn process(&self, borrow_id: i32, today: NaiveDate) -> AppResult<Outcome> {
        let mut tx = self.store.begin().await?;

        // May have been returned or paid off since the candidates were listed
        let borrowing = self.loans.get(tx.as_mut(), borrow_id).await?;
        let still_late = match borrowing.status {
            BorrowingStatus::Borrowed => borrowing.is_overdue(today),
            BorrowingStatus::Overdue => true,
            BorrowingStatus::Returned => false,
        };
        if !still_late {
            return Ok(Outcome::Skipped);
        }

        let fine = self.fines.find_for_borrowing(tx.as_mut(), borrow_id).await?;

        let outcome = match (borrowing.status, fine) {
            (BorrowingStatus::Overdue, Some(fine)) => {
                let Some(last_activity) = fine.fine_date else {
                    tracing::warn!(fine_id = fine.id, "Fine has no activity date, not accrued");
                    return Ok(Outcome::Skipped);
                };
                let days = (today - last_activity).num_days();
                if days < 1 {
                    tracing::debug!(fine_id = fine.id, "Fine already accrued today");
                    return Ok(Outcome::Skipped);
                }
                self.fines
                    .accrue(tx.as_mut(), &fine, Decimal::from(days), today)
                    .await?;
                tracing::info!(fine_id = fine.id, borrow_id, days, "Fine accrued");
                Outcome::Accrued
            }
            _ => {
                let Some(media) = self
                    .catalog
                    .find_by_id(tx.as_mut(), borrowing.media_id)
                    .await?
                else {
                    tracing::debug!(
                        borrow_id,
                        media_id = borrowing.media_id,
                        "Media missing, loan skipped"
                    );
                    return Ok(Outcome::Skipped);
                };

                let overdue_days = borrowing.overdue_days(today);
                if overdue_days <= 0 {
                    return Ok(Outcome::Skipped);
                }

                let amount = self.policy.initial_fine(media.media_type, overdue_days);
                let fine = self
                    .fines
                    .issue(tx.as_mut(), borrow_id, borrowing.user_id, amount, today)
                    .await?;
                if borrowing.status == BorrowingStatus::Borrowed {
                    self.loans.mark_overdue(tx.as_mut(), &borrowing).await?;
                }
                tracing::info!(
                    fine_id = fine.id,
                    borrow_id,
                    user_id = borrowing.user_id,
                    amount = %amount,
                    "Fine issued"
                );
                Outcome::Issued
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    /// Send the overdue count to each user that has one. Returns how many
    /// notifications went out; failures are logged and skipped.
    async fn notify_users(&self, users: BTreeSet<i32>, today: NaiveDate) -> usize {
        let mut notified = 0;
        for user_id in users {
            match self.notify_user(user_id, today).await {
                Ok(true) => notified += 1,
                Ok(false) => {}
                Err(e) => tracing::warn!(user_id, "Overdue notification failed: {}", e),
            }
        }
        notified
    }

    async fn notify_user(&self, user_id: i32, today: NaiveDate) -> AppResult<bool> {
        let mut tx = self.store.begin().await?;
        let account = self.balance.account(tx.as_mut(), user_id).await?;
        let count = self
            .loans
            .count_overdue_for_user(tx.as_mut(), user_id, today)
            .await?;
        tx.commit().await?;

        if count == 0 {
            return Ok(false);
        }

        self.notifier
            .notify(&account, &overdue_message(count))
            .await?;
        Ok(true)
    }
}
