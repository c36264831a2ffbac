//! Storage layer.
//!
//! The engine never holds a global connection. Each operation opens a
//! transaction through [`Store::begin`] and hands the resulting
//! [`StoreTx`] to every ledger it touches, then commits once. Dropping a
//! transaction without committing rolls it back.
//!
//! Backends:
//! - [`postgres::PgStore`]: sqlx / PostgreSQL, row locks via `SELECT ... FOR UPDATE`
//! - [`memory::MemoryStore`]: in-process tables, transactions fully serialized

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::{
    error::AppResult,
    models::{
        Borrowing, BorrowingStatus, Fine, Media, NewBorrowing, NewFine, UserAccount,
    },
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Transactional store
#[async_trait]
pub trait Store: Send + Sync {
    /// Open a new transaction
    async fn begin(&self) -> AppResult<Box<dyn StoreTx>>;
}

/// One open transaction.
///
/// Single-row fetches lock the row for the remainder of the transaction
/// (where the backend supports row locks), so callers must fetch in the
/// order borrowing, fine, media, account to stay deadlock free.
#[async_trait]
pub trait StoreTx: Send {
    // Media
    async fn fetch_media(&mut self, id: i32) -> AppResult<Option<Media>>;
    /// Returns false when no such media exists
    async fn update_media_availability(&mut self, id: i32, available: bool) -> AppResult<bool>;

    // Borrowings
    async fn insert_borrowing(&mut self, borrowing: &NewBorrowing) -> AppResult<Borrowing>;
    async fn fetch_borrowing(&mut self, id: i32) -> AppResult<Option<Borrowing>>;
    /// The borrowed/overdue loan for this (user, media) pair, if any
    async fn fetch_active_borrowing(
        &mut self,
        user_id: i32,
        media_id: i32,
    ) -> AppResult<Option<Borrowing>>;
    async fn list_borrowings_for_user(&mut self, user_id: i32) -> AppResult<Vec<Borrowing>>;
    /// Borrowed loans past due as of `today`, plus every overdue loan
    async fn list_overdue_candidates(&mut self, today: NaiveDate) -> AppResult<Vec<Borrowing>>;
    async fn update_borrowing_status(
        &mut self,
        id: i32,
        status: BorrowingStatus,
        return_date: Option<NaiveDate>,
    ) -> AppResult<bool>;

    // Fines
    async fn insert_fine(&mut self, fine: &NewFine) -> AppResult<Fine>;
    async fn fetch_fine(&mut self, id: i32) -> AppResult<Option<Fine>>;
    /// Borrowing a fine belongs to, read without locking the fine
    async fn fine_borrow_id(&mut self, id: i32) -> AppResult<Option<i32>>;
    async fn fetch_fine_for_borrowing(&mut self, borrow_id: i32) -> AppResult<Option<Fine>>;
    async fn update_fine(
        &mut self,
        id: i32,
        amount: Decimal,
        paid: bool,
        fine_date: Option<NaiveDate>,
    ) -> AppResult<bool>;
    async fn list_fines_for_user(&mut self, user_id: i32) -> AppResult<Vec<Fine>>;

    // Accounts
    async fn fetch_account(&mut self, user_id: i32) -> AppResult<Option<UserAccount>>;
    /// Add `delta` (may be negative) to the stored balance
    async fn adjust_balance(&mut self, user_id: i32, delta: Decimal) -> AppResult<bool>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
    async fn rollback(self: Box<Self>) -> AppResult<()>;
}
