//! Per-user running fine balance.
//!
//! Maintained incrementally: every fine mutation applies the matching
//! delta here inside the same transaction. Only the fine ledger writes.

use rust_decimal::Decimal;

use crate::{
    error::{AppError, AppResult},
    models::UserAccount,
    repository::StoreTx,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct BalanceAccount;

impl BalanceAccount {
    pub fn new() -> Self {
        Self
    }

    pub async fn account(&self, tx: &mut dyn StoreTx, user_id: i32) -> AppResult<UserAccount> {
        tx.fetch_account(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", user_id)))
    }

    pub async fn balance(&self, tx: &mut dyn StoreTx, user_id: i32) -> AppResult<Decimal> {
        Ok(self.account(tx, user_id).await?.balance)
    }

    pub(crate) async fn increment(
        &self,
        tx: &mut dyn StoreTx,
        user_id: i32,
        amount: Decimal,
    ) -> AppResult<()> {
        self.apply(tx, user_id, amount).await
    }

    pub(crate) async fn decrement(
        &self,
        tx: &mut dyn StoreTx,
        user_id: i32,
        amount: Decimal,
    ) -> AppResult<()> {
        self.apply(tx, user_id, -amount).await
    }

    async fn apply(&self, tx: &mut dyn StoreTx, user_id: i32, delta: Decimal) -> AppResult<()> {
        if tx.adjust_balance(user_id, delta).await? {
            Ok(())
        } else {
            Err(AppError::NotFound(format!("User with id {} not found", user_id)))
        }
    }
}
