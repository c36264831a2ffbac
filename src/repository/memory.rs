//! In-memory transactional backend.
//!
//! `begin()` takes an owned lock over all tables and works on a private
//! copy; `commit()` swaps the copy in. Transactions are therefore fully
//! serialized, which gives the same outcome as serializable isolation:
//! of two racing borrows of one media, the second observes it unavailable.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{Store, StoreTx};
use crate::{
    error::{AppError, AppResult},
    models::{
        Borrowing, BorrowingStatus, Fine, Media, NewBorrowing, NewFine, NewMedia, UserAccount,
    },
};

/// Write operations that can be made to fail on purpose
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    UpdateMedia,
    InsertBorrowing,
    UpdateBorrowing,
    InsertFine,
    UpdateFine,
    AdjustBalance,
}

/// Table contents
#[derive(Debug, Clone, Default)]
pub struct MemoryTables {
    pub media: BTreeMap<i32, Media>,
    pub borrowings: BTreeMap<i32, Borrowing>,
    pub fines: BTreeMap<i32, Fine>,
    pub accounts: BTreeMap<i32, UserAccount>,
}

impl MemoryTables {
    fn next_id<T>(map: &BTreeMap<i32, T>) -> i32 {
        map.keys().next_back().map(|id| id + 1).unwrap_or(1)
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<MemoryTables>>,
    fail_on: Arc<StdMutex<Option<WriteOp>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog provisioning: new media start available
    pub async fn add_media(&self, media: NewMedia) -> Media {
        let mut tables = self.tables.lock().await;
        let record = Media {
            id: MemoryTables::next_id(&tables.media),
            title: media.title,
            author: media.author,
            isbn: media.isbn,
            media_type: media.media_type,
            available: true,
        };
        tables.media.insert(record.id, record.clone());
        record
    }

    /// Account provisioning: new accounts start with a zero balance
    pub async fn add_account(&self, name: &str, email: Option<&str>) -> UserAccount {
        let mut tables = self.tables.lock().await;
        let account = UserAccount {
            id: MemoryTables::next_id(&tables.accounts),
            name: name.to_string(),
            email: email.map(str::to_string),
            balance: Decimal::ZERO,
        };
        tables.accounts.insert(account.id, account.clone());
        account
    }

    /// Copy of the committed state
    pub async fn snapshot(&self) -> MemoryTables {
        self.tables.lock().await.clone()
    }

    /// Make the next write of kind `op` fail with a storage error
    pub fn fail_next_write(&self, op: WriteOp) {
        *self.fail_on.lock().unwrap_or_else(|e| e.into_inner()) = Some(op);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn StoreTx>> {
        let guard = self.tables.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx {
            guard,
            working,
            fail_on: self.fail_on.clone(),
        }))
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryTables>,
    working: MemoryTables,
    fail_on: Arc<StdMutex<Option<WriteOp>>>,
}

impl MemoryTx {
    fn check_write(&self, op: WriteOp) -> AppResult<()> {
        let mut fail_on = self.fail_on.lock().unwrap_or_else(|e| e.into_inner());
        if *fail_on == Some(op) {
            *fail_on = None;
            return Err(AppError::Storage(format!("injected failure on {:?}", op)));
        }
        Ok(())
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn fetch_media(&mut self, id: i32) -> AppResult<Option<Media>> {
        Ok(self.working.media.get(&id).cloned())
    }

    async fn update_media_availability(&mut self, id: i32, available: bool) -> AppResult<bool> {
        self.check_write(WriteOp::UpdateMedia)?;
        Ok(match self.working.media.get_mut(&id) {
            Some(media) => {
                media.available = available;
                true
            }
            None => false,
        })
    }

    async fn insert_borrowing(&mut self, borrowing: &NewBorrowing) -> AppResult<Borrowing> {
        self.check_write(WriteOp::InsertBorrowing)?;
        let record = Borrowing {
            id: MemoryTables::next_id(&self.working.borrowings),
            user_id: borrowing.user_id,
            media_id: borrowing.media_id,
            borrow_date: borrowing.borrow_date,
            due_date: borrowing.due_date,
            return_date: None,
            status: BorrowingStatus::Borrowed,
        };
        self.working.borrowings.insert(record.id, record.clone());
        Ok(record)
    }

    async fn fetch_borrowing(&mut self, id: i32) -> AppResult<Option<Borrowing>> {
        Ok(self.working.borrowings.get(&id).cloned())
    }

    async fn fetch_active_borrowing(
        &mut self,
        user_id: i32,
        media_id: i32,
    ) -> AppResult<Option<Borrowing>> {
        Ok(self
            .working
            .borrowings
            .values()
            .find(|b| b.user_id == user_id && b.media_id == media_id && b.status.is_active())
            .cloned())
    }

    async fn list_borrowings_for_user(&mut self, user_id: i32) -> AppResult<Vec<Borrowing>> {
        Ok(self
            .working
            .borrowings
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_overdue_candidates(&mut self, today: NaiveDate) -> AppResult<Vec<Borrowing>> {
        Ok(self
            .working
            .borrowings
            .values()
            .filter(|b| match b.status {
                BorrowingStatus::Borrowed => b.due_date < today,
                BorrowingStatus::Overdue => true,
                BorrowingStatus::Returned => false,
            })
            .cloned()
            .collect())
    }

    async fn update_borrowing_status(
        &mut self,
        id: i32,
        status: BorrowingStatus,
        return_date: Option<NaiveDate>,
    ) -> AppResult<bool> {
        self.check_write(WriteOp::UpdateBorrowing)?;
        Ok(match self.working.borrowings.get_mut(&id) {
            Some(borrowing) => {
                borrowing.status = status;
                borrowing.return_date = return_date;
                true
            }
            None => false,
        })
    }

    async fn insert_fine(&mut self, fine: &NewFine) -> AppResult<Fine> {
        self.check_write(WriteOp::InsertFine)?;
        if self
            .working
            .fines
            .values()
            .any(|f| f.borrow_id == fine.borrow_id)
        {
            return Err(AppError::Storage(format!(
                "unique violation: fine for borrowing {} already exists",
                fine.borrow_id
            )));
        }
        let record = Fine {
            id: MemoryTables::next_id(&self.working.fines),
            user_id: fine.user_id,
            borrow_id: fine.borrow_id,
            amount: fine.amount,
            paid: fine.amount.is_zero(),
            fine_date: Some(fine.fine_date),
        };
        self.working.fines.insert(record.id, record.clone());
        Ok(record)
    }

    async fn fetch_fine(&mut self, id: i32) -> AppResult<Option<Fine>> {
        Ok(self.working.fines.get(&id).cloned())
    }

    async fn fine_borrow_id(&mut self, id: i32) -> AppResult<Option<i32>> {
        Ok(self.working.fines.get(&id).map(|f| f.borrow_id))
    }

    async fn fetch_fine_for_borrowing(&mut self, borrow_id: i32) -> AppResult<Option<Fine>> {
        Ok(self
            .working
            .fines
            .values()
            .find(|f| f.borrow_id == borrow_id)
            .cloned())
    }

    async fn update_fine(
        &mut self,
        id: i32,
        amount: Decimal,
        paid: bool,
        fine_date: Option<NaiveDate>,
    ) -> AppResult<bool> {
        self.check_write(WriteOp::UpdateFine)?;
        Ok(match self.working.fines.get_mut(&id) {
            Some(fine) => {
                fine.amount = amount;
                fine.paid = paid;
                fine.fine_date = fine_date;
                true
            }
            None => false,
        })
    }

    async fn list_fines_for_user(&mut self, user_id: i32) -> AppResult<Vec<Fine>> {
        Ok(self
            .working
            .fines
            .values()
            .filter(|f| f.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn fetch_account(&mut self, user_id: i32) -> AppResult<Option<UserAccount>> {
        Ok(self.working.accounts.get(&user_id).cloned())
    }

    async fn adjust_balance(&mut self, user_id: i32, delta: Decimal) -> AppResult<bool> {
        self.check_write(WriteOp::AdjustBalance)?;
        Ok(match self.working.accounts.get_mut(&user_id) {
            Some(account) => {
                account.balance += delta;
                true
            }
            None => false,
        })
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryTx {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaType;

    #[tokio::test]
    async fn test_uncommitted_changes_are_discarded() {
        let store = MemoryStore::new();
        let media = store
            .add_media(NewMedia::new("Dune", "Herbert", "isbn-1", MediaType::Book))
            .await;

        let mut tx = store.begin().await.unwrap();
        tx.update_media_availability(media.id, false).await.unwrap();
        drop(tx);

        assert!(store.snapshot().await.media[&media.id].available);

        let mut tx = store.begin().await.unwrap();
        tx.update_media_availability(media.id, false).await.unwrap();
        tx.commit().await.unwrap();

        assert!(!store.snapshot().await.media[&media.id].available);
    }

    #[tokio::test]
    async fn test_injected_failure_fires_once() {
        let store = MemoryStore::new();
        let media = store
            .add_media(NewMedia::new("Blue", "Mitchell", "isbn-2", MediaType::Cd))
            .await;
        store.fail_next_write(WriteOp::UpdateMedia);

        let mut tx = store.begin().await.unwrap();
        let err = tx.update_media_availability(media.id, false).await.unwrap_err();
        assert!(err.is_storage_failure());
        assert!(tx.update_media_availability(media.id, false).await.unwrap());
    }

    #[tokio::test]
    async fn test_second_fine_for_same_borrowing_rejected() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let fine = NewFine {
            user_id: 1,
            borrow_id: 9,
            amount: Decimal::from(10),
            fine_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        };
        tx.insert_fine(&fine).await.unwrap();
        assert!(tx.insert_fine(&fine).await.is_err());
    }
}
