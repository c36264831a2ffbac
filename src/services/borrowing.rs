//! Borrow and return workflows.
//!
//! Each call runs in a single transaction spanning the catalog, the loan
//! ledger, the balance gate and (on return) the fine ledger. Any error
//! drops the transaction uncommitted, leaving loans and availability as
//! they were.

use rust_decimal::Decimal;
use std::sync::Arc;

use crate::{
    clock::Clock,
    error::{AppError, AppResult},
    models::{Borrowing, Caller, Media},
    repository::Store,
};

use super::{
    balance::BalanceAccount, catalog::MediaCatalog, fine_policy::FinePolicyRegistry,
    fines::FineLedger, loans::LoanLedger,
};

#[derive(Clone)]
pub struct BorrowingWorkflow {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    policy: Arc<FinePolicyRegistry>,
    catalog: MediaCatalog,
    loans: LoanLedger,
    balance: BalanceAccount,
    fines: FineLedger,
}

impl BorrowingWorkflow {
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        policy: Arc<FinePolicyRegistry>,
        catalog: MediaCatalog,
        loans: LoanLedger,
        balance: BalanceAccount,
        fines: FineLedger,
    ) -> Self {
        Self {
            store,
            clock,
            policy,
            catalog,
            loans,
            balance,
            fines,
        }
    }

    /// Lend a media to a user
    pub async fn borrow(&self, caller: &Caller, user_id: i32, media_id: i32) -> AppResult<Borrowing> {
        caller.require_acting_for(user_id)?;
        let today = self.clock.today();

        let mut tx = self.store.begin().await?;

        let media = self.catalog.get(tx.as_mut(), media_id).await?;
        if !media.available {
            return Err(AppError::MediaUnavailable(media_id));
        }

        let balance = self.balance.balance(tx.as_mut(), user_id).await?;
        if balance > Decimal::ZERO {
            return Err(AppError::OutstandingBalance(balance));
        }

        // A late loan blocks borrowing even before a fine was issued for it
        let overdue = self
            .loans
            .count_overdue_for_user(tx.as_mut(), user_id, today)
            .await?;
        if overdue > 0 {
            return Err(AppError::HasOverdueItems(overdue));
        }

        let loan_days = self.policy.borrow_duration_days(media.media_type);
        let borrowing = self
            .loans
            .open(tx.as_mut(), user_id, media_id, today, loan_days)
            .await?;

        tx.commit().await?;

        tracing::info!(
            borrow_id = borrowing.id,
            user_id,
            media_id,
            due_date = %borrowing.due_date,
            "Media borrowed"
        );

        Ok(borrowing)
    }

    /// Bring a borrowed media back.
    ///
    /// A late loan can only be returned once its fine exists and is fully
    /// paid; in practice full payment already closes the loan.
    pub async fn return_media(
        &self,
        caller: &Caller,
        user_id: i32,
        media_id: i32,
    ) -> AppResult<Borrowing> {
        caller.require_acting_for(user_id)?;
        let today = self.clock.today();

        let mut tx = self.store.begin().await?;

        let borrowing = self
            .loans
            .find_active(tx.as_mut(), user_id, media_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "No active borrowing of media {} by user {}",
                    media_id, user_id
                ))
            })?;

        if borrowing.blocks_return(today) {
            let settled = self
                .fines
                .find_for_borrowing(tx.as_mut(), borrowing.id)
                .await?
                .map(|fine| fine.paid)
                .unwrap_or(false);
            if !settled {
                return Err(AppError::UnpaidFine(borrowing.id));
            }
        }

        self.loans.close(tx.as_mut(), &borrowing, today).await?;
        let returned = self.loans.get(tx.as_mut(), borrowing.id).await?;

        tx.commit().await?;

        tracing::info!(
            borrow_id = returned.id,
            user_id,
            media_id,
            "Media returned"
        );

        Ok(returned)
    }

    pub async fn loans_for_user(&self, caller: &Caller, user_id: i32) -> AppResult<Vec<Borrowing>> {
        caller.require_acting_for(user_id)?;

        let mut tx = self.store.begin().await?;
        self.balance.account(tx.as_mut(), user_id).await?;
        let loans = self.loans.list_for_user(tx.as_mut(), user_id).await?;
        tx.commit().await?;

        Ok(loans)
    }

    pub async fn media(&self, id: i32) -> AppResult<Media> {
        let mut tx = self.store.begin().await?;
        let media = self.catalog.get(tx.as_mut(), id).await?;
        tx.commit().await?;

        Ok(media)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::FixedClock,
        models::{BorrowingStatus, MediaType, NewMedia},
        repository::{memory::WriteOp, MemoryStore},
    };
    use chrono::{Duration, NaiveDate};

    fn day(n: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(n)
    }

    fn workflow(store: &MemoryStore, clock: Arc<FixedClock>) -> BorrowingWorkflow {
        let catalog = MediaCatalog::new();
        let loans = LoanLedger::new(catalog);
        let balance = BalanceAccount::new();
        BorrowingWorkflow::new(
            Arc::new(store.clone()),
            clock,
            Arc::new(FinePolicyRegistry::default()),
            catalog,
            loans,
            balance,
            FineLedger::new(balance, loans),
        )
    }

    #[tokio::test]
    async fn test_borrow_then_return_on_time() {
        let store = MemoryStore::new();
        let user = store.add_account("Ada", None).await;
        let book = store
            .add_media(NewMedia::new("Dune", "Herbert", "isbn", MediaType::Book))
            .await;
        let clock = Arc::new(FixedClock::new(day(0)));
        let workflow = workflow(&store, clock.clone());
        let caller = Caller::patron(user.id);

        let loan = workflow.borrow(&caller, user.id, book.id).await.unwrap();
        assert_eq!(loan.due_date, day(28));
        assert!(!store.snapshot().await.media[&book.id].available);

        clock.set(day(10));
        let returned = workflow.return_media(&caller, user.id, book.id).await.unwrap();
        assert_eq!(returned.status, BorrowingStatus::Returned);
        assert_eq!(returned.return_date, Some(day(10)));
        assert!(store.snapshot().await.media[&book.id].available);
    }

    #[tokio::test]
    async fn test_borrow_rejections() {
        let store = MemoryStore::new();
        let ada = store.add_account("Ada", None).await;
        let bob = store.add_account("Bob", None).await;
        let book = store
            .add_media(NewMedia::new("Dune", "Herbert", "isbn", MediaType::Book))
            .await;
        let workflow = workflow(&store, Arc::new(FixedClock::new(day(0))));

        let err = workflow
            .borrow(&Caller::patron(ada.id), ada.id, 404)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        workflow.borrow(&Caller::patron(ada.id), ada.id, book.id).await.unwrap();
        let err = workflow
            .borrow(&Caller::patron(bob.id), bob.id, book.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::MediaUnavailable(id) if id == book.id));

        let err = workflow
            .borrow(&Caller::patron(bob.id), ada.id, book.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotAuthenticated(_)));
    }

    #[tokio::test]
    async fn test_unscanned_overdue_loan_blocks_borrow() {
        let store = MemoryStore::new();
        let user = store.add_account("Ada", None).await;
        let cd = store
            .add_media(NewMedia::new("Blue", "Mitchell", "a", MediaType::Cd))
            .await;
        let book = store
            .add_media(NewMedia::new("Dune", "Herbert", "b", MediaType::Book))
            .await;
        let clock = Arc::new(FixedClock::new(day(0)));
        let workflow = workflow(&store, clock.clone());
        let caller = Caller::patron(user.id);

        workflow.borrow(&caller, user.id, cd.id).await.unwrap();
        clock.set(day(9));

        let err = workflow.borrow(&caller, user.id, book.id).await.unwrap_err();
        assert!(matches!(err, AppError::HasOverdueItems(1)));
    }

    #[tokio::test]
    async fn test_late_return_without_fine_is_unpaid_fine() {
        let store = MemoryStore::new();
        let user = store.add_account("Ada", None).await;
        let cd = store
            .add_media(NewMedia::new("Blue", "Mitchell", "a", MediaType::Cd))
            .await;
        let clock = Arc::new(FixedClock::new(day(0)));
        let workflow = workflow(&store, clock.clone());
        let caller = Caller::patron(user.id);

        let loan = workflow.borrow(&caller, user.id, cd.id).await.unwrap();
        clock.set(day(8));

        let err = workflow.return_media(&caller, user.id, cd.id).await.unwrap_err();
        assert!(matches!(err, AppError::UnpaidFine(id) if id == loan.id));
        assert!(!store.snapshot().await.media[&cd.id].available);
    }

    #[tokio::test]
    async fn test_return_without_loan_is_not_found() {
        let store = MemoryStore::new();
        let user = store.add_account("Ada", None).await;
        let cd = store
            .add_media(NewMedia::new("Blue", "Mitchell", "a", MediaType::Cd))
            .await;
        let workflow = workflow(&store, Arc::new(FixedClock::new(day(0))));

        let err = workflow
            .return_media(&Caller::patron(user.id), user.id, cd.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_failed_borrow_leaves_no_trace() {
        let store = MemoryStore::new();
        let user = store.add_account("Ada", None).await;
        let book = store
            .add_media(NewMedia::new("Dune", "Herbert", "isbn", MediaType::Book))
            .await;
        let workflow = workflow(&store, Arc::new(FixedClock::new(day(0))));
        store.fail_next_write(WriteOp::UpdateMedia);

        let err = workflow
            .borrow(&Caller::patron(user.id), user.id, book.id)
            .await
            .unwrap_err();
        assert!(err.is_storage_failure());

        let tables = store.snapshot().await;
        assert!(tables.borrowings.is_empty());
        assert!(tables.media[&book.id].available);
        assert_eq!(tables.accounts[&user.id].balance, Decimal::ZERO);
    }
}
