//! Money helpers. All balances and prices are `BigDecimal` quantized to two
//! decimal places; rounding is half-up.

use bigdecimal::BigDecimal;
use bigdecimal::rounding::RoundingMode;

pub const SCALE: i64 = 2;

/// Quantizes an amount to two decimal places, rounding half-up.
pub fn quantize(amount: &BigDecimal) -> BigDecimal {
    amount.with_scale_round(SCALE, RoundingMode::HalfUp)
}

pub fn zero() -> BigDecimal {
    BigDecimal::from(0).with_scale(SCALE)
}

pub fn is_negative(amount: &BigDecimal) -> bool {
    *amount < BigDecimal::from(0)
}

pub fn is_positive(amount: &BigDecimal) -> bool {
    *amount > BigDecimal::from(0)
}
