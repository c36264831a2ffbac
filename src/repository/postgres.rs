//! PostgreSQL backend

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{Pool, Postgres, Transaction};

use super::{Store, StoreTx};
use crate::{
    error::AppResult,
    models::{Borrowing, BorrowingStatus, Fine, Media, NewBorrowing, NewFine, UserAccount},
};

const BORROWING_COLUMNS: &str =
    "id, user_id, media_id, borrow_date, due_date, return_date, status";

const FINE_COLUMNS: &str = "id, user_id, borrow_id, amount, paid, fine_date";

/// Store backed by a PostgreSQL connection pool
#[derive(Clone)]
pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> AppResult<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }
}

/// Open PostgreSQL transaction. Rolled back by sqlx when dropped uncommitted.
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn fetch_media(&mut self, id: i32) -> AppResult<Option<Media>> {
        let media = sqlx::query_as::<_, Media>(
            r#"
            SELECT id, title, author, isbn, media_type, available
            FROM media
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(media)
    }

    async fn update_media_availability(&mut self, id: i32, available: bool) -> AppResult<bool> {
        let result = sqlx::query("UPDATE media SET available = $2 WHERE id = $1")
            .bind(id)
            .bind(available)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_borrowing(&mut self, borrowing: &NewBorrowing) -> AppResult<Borrowing> {
        let record = sqlx::query_as::<_, Borrowing>(&format!(
            r#"
            INSERT INTO borrowings (user_id, media_id, borrow_date, due_date, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            BORROWING_COLUMNS
        ))
        .bind(borrowing.user_id)
        .bind(borrowing.media_id)
        .bind(borrowing.borrow_date)
        .bind(borrowing.due_date)
        .bind(BorrowingStatus::Borrowed)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(record)
    }

    async fn fetch_borrowing(&mut self, id: i32) -> AppResult<Option<Borrowing>> {
        let borrowing = sqlx::query_as::<_, Borrowing>(&format!(
            "SELECT {} FROM borrowings WHERE id = $1 FOR UPDATE",
            BORROWING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(borrowing)
    }

    async fn fetch_active_borrowing(
        &mut self,
        user_id: i32,
        media_id: i32,
    ) -> AppResult<Option<Borrowing>> {
        let borrowing = sqlx::query_as::<_, Borrowing>(&format!(
            r#"
            SELECT {}
            FROM borrowings
            WHERE user_id = $1 AND media_id = $2 AND status IN ('borrowed', 'overdue')
            FOR UPDATE
            "#,
            BORROWING_COLUMNS
        ))
        .bind(user_id)
        .bind(media_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(borrowing)
    }

    async fn list_borrowings_for_user(&mut self, user_id: i32) -> AppResult<Vec<Borrowing>> {
        let borrowings = sqlx::query_as::<_, Borrowing>(&format!(
            "SELECT {} FROM borrowings WHERE user_id = $1 ORDER BY borrow_date, id",
            BORROWING_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(borrowings)
    }

    async fn list_overdue_candidates(&mut self, today: NaiveDate) -> AppResult<Vec<Borrowing>> {
        let borrowings = sqlx::query_as::<_, Borrowing>(&format!(
            r#"
            SELECT {}
            FROM borrowings
            WHERE (status = 'borrowed' AND due_date < $1) OR status = 'overdue'
            ORDER BY id
            "#,
            BORROWING_COLUMNS
        ))
        .bind(today)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(borrowings)
    }

    async fn update_borrowing_status(
        &mut self,
        id: i32,
        status: BorrowingStatus,
        return_date: Option<NaiveDate>,
    ) -> AppResult<bool> {
        let result =
            sqlx::query("UPDATE borrowings SET status = $2, return_date = $3 WHERE id = $1")
                .bind(id)
                .bind(status)
                .bind(return_date)
                .execute(&mut *self.tx)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_fine(&mut self, fine: &NewFine) -> AppResult<Fine> {
        let record = sqlx::query_as::<_, Fine>(&format!(
            r#"
            INSERT INTO fines (user_id, borrow_id, amount, paid, fine_date)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            FINE_COLUMNS
        ))
        .bind(fine.user_id)
        .bind(fine.borrow_id)
        .bind(fine.amount)
        .bind(fine.amount.is_zero())
        .bind(fine.fine_date)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(record)
    }

    async fn fetch_fine(&mut self, id: i32) -> AppResult<Option<Fine>> {
        let fine = sqlx::query_as::<_, Fine>(&format!(
            "SELECT {} FROM fines WHERE id = $1 FOR UPDATE",
            FINE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(fine)
    }

    async fn fine_borrow_id(&mut self, id: i32) -> AppResult<Option<i32>> {
        let borrow_id: Option<i32> = sqlx::query_scalar("SELECT borrow_id FROM fines WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(borrow_id)
    }

    async fn fetch_fine_for_borrowing(&mut self, borrow_id: i32) -> AppResult<Option<Fine>> {
        let fine = sqlx::query_as::<_, Fine>(&format!(
            "SELECT {} FROM fines WHERE borrow_id = $1 FOR UPDATE",
            FINE_COLUMNS
        ))
        .bind(borrow_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(fine)
    }

    async fn update_fine(
        &mut self,
        id: i32,
        amount: Decimal,
        paid: bool,
        fine_date: Option<NaiveDate>,
    ) -> AppResult<bool> {
        let result =
            sqlx::query("UPDATE fines SET amount = $2, paid = $3, fine_date = $4 WHERE id = $1")
                .bind(id)
                .bind(amount)
                .bind(paid)
                .bind(fine_date)
                .execute(&mut *self.tx)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_fines_for_user(&mut self, user_id: i32) -> AppResult<Vec<Fine>> {
        let fines = sqlx::query_as::<_, Fine>(&format!(
            "SELECT {} FROM fines WHERE user_id = $1 ORDER BY id",
            FINE_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(fines)
    }

    async fn fetch_account(&mut self, user_id: i32) -> AppResult<Option<UserAccount>> {
        let account = sqlx::query_as::<_, UserAccount>(
            "SELECT id, name, email, balance FROM user_accounts WHERE id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(account)
    }

    async fn adjust_balance(&mut self, user_id: i32, delta: Decimal) -> AppResult<bool> {
        let result = sqlx::query("UPDATE user_accounts SET balance = balance + $2 WHERE id = $1")
            .bind(user_id)
            .bind(delta)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let PgTx { tx } = *self;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        let PgTx { tx } = *self;
        tx.rollback().await?;
        Ok(())
    }
}
