//! Fine model

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

/// Fine attached to exactly one borrowing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Fine {
    pub id: i32,
    pub user_id: i32,
    pub borrow_id: i32,
    /// Outstanding amount, never negative
    pub amount: Decimal,
    /// True iff `amount` is zero
    pub paid: bool,
    /// Last day an issue or accrual touched this fine
    pub fine_date: Option<NaiveDate>,
}

/// Insert payload for a new fine
#[derive(Debug, Clone)]
pub struct NewFine {
    pub user_id: i32,
    pub borrow_id: i32,
    pub amount: Decimal,
    pub fine_date: NaiveDate,
}

/// Fine payment request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct PayFine {
    pub user_id: i32,
    #[validate(custom(function = "validate_positive_amount"))]
    pub amount: Decimal,
}

fn validate_positive_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if amount.is_sign_positive() && !amount.is_zero() {
        Ok(())
    } else {
        Err(ValidationError::new("amount_not_positive"))
    }
}

/// Outcome of a payment
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct FinePayment {
    pub fine_id: i32,
    /// Amount actually applied (capped at the outstanding amount)
    pub applied: Decimal,
    pub remaining: Decimal,
    pub paid: bool,
    /// Set when full payment closed the loan
    pub returned_borrow_id: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pay_fine_rejects_non_positive() {
        let zero = PayFine {
            user_id: 1,
            amount: Decimal::ZERO,
        };
        assert!(zero.validate().is_err());

        let negative = PayFine {
            user_id: 1,
            amount: Decimal::from(-5),
        };
        assert!(negative.validate().is_err());

        let ok = PayFine {
            user_id: 1,
            amount: Decimal::from(5),
        };
        assert!(ok.validate().is_ok());
    }
}
