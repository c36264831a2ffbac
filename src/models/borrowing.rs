//! Borrowing (loan) model and its state machine

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::ToSchema;

/// Loan state.
///
/// ```text
/// borrowed ──(due date passed, scan)──> overdue
///    │                                     │
///    └──(return)──> returned <──(fine paid)┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BorrowingStatus {
    Borrowed,
    Overdue,
    Returned,
}

impl BorrowingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BorrowingStatus::Borrowed => "borrowed",
            BorrowingStatus::Overdue => "overdue",
            BorrowingStatus::Returned => "returned",
        }
    }

    /// Borrowed or overdue
    pub fn is_active(&self) -> bool {
        !matches!(self, BorrowingStatus::Returned)
    }

    /// Whether the state machine allows moving from `self` to `next`
    pub fn can_transition_to(&self, next: BorrowingStatus) -> bool {
        matches!(
            (self, next),
            (BorrowingStatus::Borrowed, BorrowingStatus::Overdue)
                | (BorrowingStatus::Borrowed, BorrowingStatus::Returned)
                | (BorrowingStatus::Overdue, BorrowingStatus::Returned)
        )
    }
}

impl std::fmt::Display for BorrowingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BorrowingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "borrowed" => Ok(BorrowingStatus::Borrowed),
            "overdue" => Ok(BorrowingStatus::Overdue),
            "returned" => Ok(BorrowingStatus::Returned),
            _ => Err(format!("Invalid borrowing status: {}", s)),
        }
    }
}

impl sqlx::Type<Postgres> for BorrowingStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for BorrowingStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for BorrowingStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.as_str(), buf)
    }
}

/// Borrowing record. Never deleted; returned loans remain as history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Borrowing {
    pub id: i32,
    pub user_id: i32,
    pub media_id: i32,
    pub borrow_date: NaiveDate,
    pub due_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub status: BorrowingStatus,
}

impl Borrowing {
    /// Not returned and past its due date
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.return_date.is_none() && self.due_date < today
    }

    /// Already flagged overdue, or past due without having been scanned yet
    pub fn blocks_return(&self, today: NaiveDate) -> bool {
        self.status == BorrowingStatus::Overdue || self.is_overdue(today)
    }

    /// Whole days elapsed since the due date (zero or negative when not late)
    pub fn overdue_days(&self, today: NaiveDate) -> i64 {
        (today - self.due_date).num_days()
    }
}

/// Insert payload for a new loan
#[derive(Debug, Clone)]
pub struct NewBorrowing {
    pub user_id: i32,
    pub media_id: i32,
    pub borrow_date: NaiveDate,
    pub due_date: NaiveDate,
}

/// Borrow / return request (user + media pair)
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoanRequest {
    pub user_id: i32,
    pub media_id: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn loan(status: BorrowingStatus, return_date: Option<NaiveDate>) -> Borrowing {
        Borrowing {
            id: 1,
            user_id: 1,
            media_id: 1,
            borrow_date: date(1),
            due_date: date(8),
            return_date,
            status,
        }
    }

    #[test]
    fn test_is_overdue() {
        let active = loan(BorrowingStatus::Borrowed, None);
        assert!(!active.is_overdue(date(8)));
        assert!(active.is_overdue(date(9)));

        let returned = loan(BorrowingStatus::Returned, Some(date(9)));
        assert!(!returned.is_overdue(date(20)));
    }

    #[test]
    fn test_overdue_status_blocks_return() {
        let flagged = loan(BorrowingStatus::Overdue, None);
        assert!(flagged.blocks_return(date(2)));
        assert!(!loan(BorrowingStatus::Borrowed, None).blocks_return(date(8)));
    }

    #[test]
    fn test_transitions() {
        use BorrowingStatus::*;
        assert!(Borrowed.can_transition_to(Overdue));
        assert!(Borrowed.can_transition_to(Returned));
        assert!(Overdue.can_transition_to(Returned));
        assert!(!Overdue.can_transition_to(Borrowed));
        assert!(!Returned.can_transition_to(Borrowed));
        assert!(!Returned.can_transition_to(Overdue));
    }

    #[test]
    fn test_overdue_days() {
        assert_eq!(loan(BorrowingStatus::Borrowed, None).overdue_days(date(11)), 3);
        assert_eq!(loan(BorrowingStatus::Borrowed, None).overdue_days(date(5)), -3);
    }
}
