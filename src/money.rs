//! Fixed-point helpers. Amounts and percentages carry two fractional digits.

use crate::error::{Error, Result};
use rust_decimal::{Decimal, RoundingStrategy};

/// Largest difference between two totals that is still treated as equal.
pub const TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// One cent.
pub const CENT: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

pub fn round_to_2_decimals(n: Decimal) -> Decimal {
    n.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn within_tolerance(a: Decimal, b: Decimal) -> bool {
    (a - b).abs() <= TOLERANCE
}

/// Share of `total` that `part` represents, in percent.
pub fn percentage_of(part: Decimal, total: Decimal) -> Decimal {
    if total.is_zero() {
        return Decimal::ZERO;
    }
    round_to_2_decimals(part / total * Decimal::ONE_HUNDRED)
}

/// Expense and transaction amounts must be positive and expressible in cents.
pub fn validate_amount(amount: Decimal) -> Result<Decimal> {
    if amount <= Decimal::ZERO {
        return Err(Error::Validation(format!(
            "amount must be greater than zero, got {amount}"
        )));
    }
    if amount.normalize().scale() > 2 {
        return Err(Error::Validation(format!(
            "amount {amount} has more than two decimal places"
        )));
    }
    Ok(amount.round_dp(2))
}
