//! Loan ledger: borrowing records and their status transitions.
//!
//! Every transition that changes whether a loan is active also flips the
//! media availability flag in the same transaction.

use chrono::{Duration, NaiveDate};

use crate::{
    error::{AppError, AppResult},
    models::{Borrowing, BorrowingStatus, NewBorrowing},
    repository::StoreTx,
};

use super::catalog::MediaCatalog;

#[derive(Debug, Clone, Copy, Default)]
pub struct LoanLedger {
    catalog: MediaCatalog,
}

impl LoanLedger {
    pub fn new(catalog: MediaCatalog) -> Self {
        Self { catalog }
    }

    /// Not returned and past its due date
    pub fn is_overdue(borrowing: &Borrowing, today: NaiveDate) -> bool {
        borrowing.is_overdue(today)
    }

    pub async fn get(&self, tx: &mut dyn StoreTx, id: i32) -> AppResult<Borrowing> {
        tx.fetch_borrowing(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Borrowing with id {} not found", id)))
    }

    pub async fn find_active(
        &self,
        tx: &mut dyn StoreTx,
        user_id: i32,
        media_id: i32,
    ) -> AppResult<Option<Borrowing>> {
        tx.fetch_active_borrowing(user_id, media_id).await
    }

    /// Insert a `borrowed` loan due `loan_days` after `today` and take the
    /// media out of circulation
    pub async fn open(
        &self,
        tx: &mut dyn StoreTx,
        user_id: i32,
        media_id: i32,
        today: NaiveDate,
        loan_days: i64,
    ) -> AppResult<Borrowing> {
        let borrowing = tx
            .insert_borrowing(&NewBorrowing {
                user_id,
                media_id,
                borrow_date: today,
                due_date: today + Duration::days(loan_days),
            })
            .await?;

        if !self.catalog.set_available(tx, media_id, false).await? {
            return Err(AppError::NotFound(format!(
                "Media with id {} not found",
                media_id
            )));
        }

        Ok(borrowing)
    }

    pub async fn mark_overdue(&self, tx: &mut dyn StoreTx, borrowing: &Borrowing) -> AppResult<()> {
        self.transition(tx, borrowing, BorrowingStatus::Overdue, None)
            .await
    }

    /// Close the loan and put the media back in circulation
    pub async fn close(
        &self,
        tx: &mut dyn StoreTx,
        borrowing: &Borrowing,
        today: NaiveDate,
    ) -> AppResult<()> {
        self.transition(tx, borrowing, BorrowingStatus::Returned, Some(today))
            .await?;

        if !self.catalog.set_available(tx, borrowing.media_id, true).await? {
            return Err(AppError::NotFound(format!(
                "Media with id {} not found",
                borrowing.media_id
            )));
        }

        Ok(())
    }

    async fn transition(
        &self,
        tx: &mut dyn StoreTx,
        borrowing: &Borrowing,
        next: BorrowingStatus,
        return_date: Option<NaiveDate>,
    ) -> AppResult<()> {
        if !borrowing.status.can_transition_to(next) {
            return Err(AppError::BadRequest(format!(
                "Borrowing {} cannot move from {} to {}",
                borrowing.id, borrowing.status, next
            )));
        }

        if !tx
            .update_borrowing_status(borrowing.id, next, return_date)
            .await?
        {
            return Err(AppError::NotFound(format!(
                "Borrowing with id {} not found",
                borrowing.id
            )));
        }

        Ok(())
    }

    /// All loans of a user, returned ones included
    pub async fn list_for_user(
        &self,
        tx: &mut dyn StoreTx,
        user_id: i32,
    ) -> AppResult<Vec<Borrowing>> {
        tx.list_borrowings_for_user(user_id).await
    }

    /// Borrowed loans past due plus loans already flagged overdue
    pub async fn overdue_candidates(
        &self,
        tx: &mut dyn StoreTx,
        today: NaiveDate,
    ) -> AppResult<Vec<Borrowing>> {
        tx.list_overdue_candidates(today).await
    }

    /// Active loans of the user that are flagged overdue or past due
    pub async fn count_overdue_for_user(
        &self,
        tx: &mut dyn StoreTx,
        user_id: i32,
        today: NaiveDate,
    ) -> AppResult<i64> {
        let count = self
            .list_for_user(tx, user_id)
            .await?
            .iter()
            .filter(|b| b.status.is_active() && b.blocks_return(today))
            .count();

        Ok(count as i64)
    }
}
