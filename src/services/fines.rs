//! Fine ledger: issue, accrual and payment.
//!
//! Every amount change is paired with the same delta on the user's
//! balance inside the caller's transaction, so the balance always equals
//! the sum of the user's unpaid fines.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::{
    clock::Clock,
    error::{AppError, AppResult},
    models::{Caller, Fine, FinePayment, NewFine},
    repository::{Store, StoreTx},
};

use super::{balance::BalanceAccount, loans::LoanLedger};

#[derive(Debug, Clone, Copy, Default)]
pub struct FineLedger {
    balance: BalanceAccount,
    loans: LoanLedger,
}

impl FineLedger {
    pub fn new(balance: BalanceAccount, loans: LoanLedger) -> Self {
        Self { balance, loans }
    }

    pub async fn get(&self, tx: &mut dyn StoreTx, id: i32) -> AppResult<Fine> {
        tx.fetch_fine(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Fine with id {} not found", id)))
    }

    pub async fn find_for_borrowing(
        &self,
        tx: &mut dyn StoreTx,
        borrow_id: i32,
    ) -> AppResult<Option<Fine>> {
        tx.fetch_fine_for_borrowing(borrow_id).await
    }

    pub async fn list_for_user(&self, tx: &mut dyn StoreTx, user_id: i32) -> AppResult<Vec<Fine>> {
        tx.list_fines_for_user(user_id).await
    }

    /// Create the unpaid fine of a borrowing and charge it to the user.
    /// Fails if the borrowing already has a fine.
    pub async fn issue(
        &self,
        tx: &mut dyn StoreTx,
        borrow_id: i32,
        user_id: i32,
        amount: Decimal,
        today: NaiveDate,
    ) -> AppResult<Fine> {
        if amount.is_sign_negative() {
            return Err(AppError::BadRequest(format!(
                "Fine amount must not be negative: {}",
                amount
            )));
        }

        let fine = tx
            .insert_fine(&NewFine {
                user_id,
                borrow_id,
                amount,
                fine_date: today,
            })
            .await?;
        self.balance.increment(tx, user_id, amount).await?;

        Ok(fine)
    }

    /// Grow an existing fine by `delta` and stamp today's date on it
    pub async fn accrue(
        &self,
        tx: &mut dyn StoreTx,
        fine: &Fine,
        delta: Decimal,
        today: NaiveDate,
    ) -> AppResult<Fine> {
        if delta.is_sign_negative() {
            return Err(AppError::BadRequest(format!(
                "Accrual must not be negative: {}",
                delta
            )));
        }

        let amount = fine.amount + delta;
        let paid = amount.is_zero();
        if !tx.update_fine(fine.id, amount, paid, Some(today)).await? {
            return Err(AppError::NotFound(format!("Fine with id {} not found", fine.id)));
        }
        self.balance.increment(tx, fine.user_id, delta).await?;

        Ok(Fine {
            amount,
            paid,
            fine_date: Some(today),
            ..fine.clone()
        })
    }

    /// Apply a payment to a fine.
    ///
    /// The applied amount is capped at the outstanding amount; any excess
    /// is dropped. Full payment also closes the fined loan and puts its
    /// media back in circulation.
    pub async fn pay(
        &self,
        tx: &mut dyn StoreTx,
        fine_id: i32,
        user_id: i32,
        amount: Decimal,
        today: NaiveDate,
    ) -> AppResult<FinePayment> {
        if amount <= Decimal::ZERO {
            return Err(AppError::BadRequest(format!(
                "Payment must be positive: {}",
                amount
            )));
        }

        // Lock the borrowing before the fine
        let borrow_id = tx
            .fine_borrow_id(fine_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Fine with id {} not found", fine_id)))?;
        let borrowing = tx.fetch_borrowing(borrow_id).await?;
        let fine = self.get(tx, fine_id).await?;
        if fine.user_id != user_id {
            return Err(AppError::NotFound(format!(
                "Fine with id {} not found for user {}",
                fine_id, user_id
            )));
        }

        if fine.amount.is_zero() {
            return Err(AppError::AlreadyPaid(fine_id));
        }

        let applied = amount.min(fine.amount);
        let remaining = fine.amount - applied;
        let paid = remaining <= Decimal::ZERO;
        let remaining = remaining.max(Decimal::ZERO);

        if !tx
            .update_fine(fine.id, remaining, paid, fine.fine_date)
            .await?
        {
            return Err(AppError::NotFound(format!("Fine with id {} not found", fine.id)));
        }
        self.balance.decrement(tx, user_id, applied).await?;

        let mut returned_borrow_id = None;
        if paid {
            let borrowing = borrowing.ok_or_else(|| {
                AppError::NotFound(format!("Borrowing with id {} not found", fine.borrow_id))
            })?;
            if borrowing.status.is_active() {
                self.loans.close(tx, &borrowing, today).await?;
                returned_borrow_id = Some(borrowing.id);
            }
        }

        Ok(FinePayment {
            fine_id,
            applied,
            remaining,
            paid,
            returned_borrow_id,
        })
    }
}

/// Transactional entry points for fine payment and balance reads
#[derive(Clone)]
pub struct FineService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    fines: FineLedger,
    balance: BalanceAccount,
}

impl FineService {
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        fines: FineLedger,
        balance: BalanceAccount,
    ) -> Self {
        Self {
            store,
            clock,
            fines,
            balance,
        }
    }

    /// Pay (part of) a fine in one transaction
    pub async fn pay(
        &self,
        caller: &Caller,
        fine_id: i32,
        user_id: i32,
        amount: Decimal,
    ) -> AppResult<FinePayment> {
        caller.require_acting_for(user_id)?;
        let today = self.clock.today();

        let mut tx = self.store.begin().await?;
        let payment = self
            .fines
            .pay(tx.as_mut(), fine_id, user_id, amount, today)
            .await?;
        tx.commit().await?;

        tracing::info!(
            fine_id,
            user_id,
            applied = %payment.applied,
            remaining = %payment.remaining,
            paid = payment.paid,
            "Fine payment applied"
        );
        if let Some(borrow_id) = payment.returned_borrow_id {
            tracing::info!(borrow_id, "Loan closed by full fine payment");
        }

        Ok(payment)
    }

    pub async fn fines_for_user(&self, caller: &Caller, user_id: i32) -> AppResult<Vec<Fine>> {
        caller.require_acting_for(user_id)?;

        let mut tx = self.store.begin().await?;
        self.balance.account(tx.as_mut(), user_id).await?;
        let fines = self.fines.list_for_user(tx.as_mut(), user_id).await?;
        tx.commit().await?;

        Ok(fines)
    }

    pub async fn balance(&self, caller: &Caller, user_id: i32) -> AppResult<Decimal> {
        caller.require_acting_for(user_id)?;

        let mut tx = self.store.begin().await?;
        let balance = self.balance.balance(tx.as_mut(), user_id).await?;
        tx.commit().await?;

        Ok(balance)
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
    use chrono::Duration;

    fn day(n: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(n)
    }

    /// A cd borrowed on day 0, fined 60 on day 10
    async fn fined_cd(store: &MemoryStore) -> (i32, i32, i32) {
        let user = store.add_account("Ada", None).await;
        let media = store
            .add_media(NewMedia::new("Blue", "Mitchell", "isbn", MediaType::Cd))
            .await;
        let ledger = FineLedger::default();
        let loans = LoanLedger::default();

        let mut tx = store.begin().await.unwrap();
        let loan = loans.open(tx.as_mut(), user.id, media.id, day(0), 7).await.unwrap();
        let fine = ledger
            .issue(tx.as_mut(), loan.id, user.id, Decimal::from(60), day(10))
            .await
            .unwrap();
        loans.mark_overdue(tx.as_mut(), &loan).await.unwrap();
        tx.commit().await.unwrap();

        (user.id, media.id, fine.id)
    }

    fn service(store: &MemoryStore, today: NaiveDate) -> FineService {
        FineService::new(
            Arc::new(store.clone()),
            Arc::new(FixedClock::new(today)),
            FineLedger::default(),
            BalanceAccount::default(),
        )
    }

    #[tokio::test]
    async fn test_issue_charges_balance() {
        let store = MemoryStore::new();
        let (user_id, _, fine_id) = fined_cd(&store).await;

        let tables = store.snapshot().await;
        assert_eq!(tables.fines[&fine_id].amount, Decimal::from(60));
        assert!(!tables.fines[&fine_id].paid);
        assert_eq!(tables.fines[&fine_id].fine_date, Some(day(10)));
        assert_eq!(tables.accounts[&user_id].balance, Decimal::from(60));
    }

    #[tokio::test]
    async fn test_accrue_adds_to_fine_and_balance() {
        let store = MemoryStore::new();
        let (user_id, _, fine_id) = fined_cd(&store).await;
        let ledger = FineLedger::default();

        let mut tx = store.begin().await.unwrap();
        let fine = ledger.get(tx.as_mut(), fine_id).await.unwrap();
        let fine = ledger
            .accrue(tx.as_mut(), &fine, Decimal::from(2), day(12))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(fine.amount, Decimal::from(62));
        assert_eq!(fine.fine_date, Some(day(12)));
        assert_eq!(store.snapshot().await.accounts[&user_id].balance, Decimal::from(62));
    }

    #[tokio::test]
    async fn test_partial_payment() {
        let store = MemoryStore::new();
        let (user_id, media_id, fine_id) = fined_cd(&store).await;

        let payment = service(&store, day(11))
            .pay(&Caller::patron(user_id), fine_id, user_id, Decimal::from(20))
            .await
            .unwrap();
        assert_eq!(payment.applied, Decimal::from(20));
        assert_eq!(payment.remaining, Decimal::from(40));
        assert!(!payment.paid);
        assert_eq!(payment.returned_borrow_id, None);

        let tables = store.snapshot().await;
        assert_eq!(tables.accounts[&user_id].balance, Decimal::from(40));
        assert!(!tables.media[&media_id].available);
        assert_eq!(tables.borrowings[&1].status, BorrowingStatus::Overdue);
    }

    #[tokio::test]
    async fn test_overpayment_is_capped() {
        let store = MemoryStore::new();
        let (user_id, media_id, fine_id) = fined_cd(&store).await;

        let payment = service(&store, day(11))
            .pay(&Caller::librarian(99), fine_id, user_id, Decimal::from(500))
            .await
            .unwrap();
        assert_eq!(payment.applied, Decimal::from(60));
        assert_eq!(payment.remaining, Decimal::ZERO);
        assert!(payment.paid);

        let tables = store.snapshot().await;
        assert_eq!(tables.accounts[&user_id].balance, Decimal::ZERO);
        assert!(tables.media[&media_id].available);
        assert_eq!(tables.borrowings[&1].status, BorrowingStatus::Returned);
        assert_eq!(tables.borrowings[&1].return_date, Some(day(11)));
    }

    #[tokio::test]
    async fn test_paid_fine_rejects_further_payment() {
        let store = MemoryStore::new();
        let (user_id, _, fine_id) = fined_cd(&store).await;
        let service = service(&store, day(11));
        let caller = Caller::patron(user_id);

        service.pay(&caller, fine_id, user_id, Decimal::from(60)).await.unwrap();
        let err = service
            .pay(&caller, fine_id, user_id, Decimal::from(1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AlreadyPaid(id) if id == fine_id));
    }

    #[tokio::test]
    async fn test_payment_for_other_user_rejected() {
        let store = MemoryStore::new();
        let (user_id, _, fine_id) = fined_cd(&store).await;
        let service = service(&store, day(11));

        let err = service
            .pay(&Caller::patron(user_id + 1), fine_id, user_id, Decimal::from(10))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotAuthenticated(_)));

        let err = service
            .pay(&Caller::librarian(50), fine_id, user_id + 1, Decimal::from(10))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_failed_payment_rolls_back() {
        let store = MemoryStore::new();
        let (user_id, media_id, fine_id) = fined_cd(&store).await;
        store.fail_next_write(WriteOp::UpdateMedia);

        let err = service(&store, day(11))
            .pay(&Caller::patron(user_id), fine_id, user_id, Decimal::from(60))
            .await
            .unwrap_err();
        assert!(err.is_storage_failure());

        let tables = store.snapshot().await;
        assert_eq!(tables.fines[&fine_id].amount, Decimal::from(60));
        assert!(!tables.fines[&fine_id].paid);
        assert_eq!(tables.accounts[&user_id].balance, Decimal::from(60));
        assert_eq!(tables.borrowings[&1].status, BorrowingStatus::Overdue);
        assert!(!tables.media[&media_id].available);
    }
}
