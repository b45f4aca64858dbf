//! Exact fractional rates for tax calculations.
//!
//! UC amounts are integers, but tax rates are fractions. Rates wrap
//! `rust_decimal` so that `floor(amount × rate)` is computed exactly and
//! never drifts the way binary floating point does (`0.22 * 100.0` is not
//! `22.0`).

use crate::error::{Result, SettlementError};
use crate::types::Uc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A fraction in `[0, 1]` applied to UC amounts.
///
/// # Examples
///
/// ```
/// use tourney_settlement::Rate;
///
/// let rate = Rate::percent(22);
/// assert_eq!(rate.floor_of(100), 22);
/// assert_eq!(rate.to_string(), "0.22");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Rate(Decimal);

impl Rate {
    /// Zero rate.
    pub const ZERO: Self = Rate(Decimal::ZERO);

    /// Creates a rate, rejecting values outside `[0, 1]`.
    pub fn new(value: Decimal) -> Result<Self> {
        if value < Decimal::ZERO || value > Decimal::ONE {
            return Err(SettlementError::InvalidConfig(format!(
                "rate {} is outside [0, 1]",
                value
            )));
        }
        Ok(Rate(value.normalize()))
    }

    /// Creates a rate from a whole percentage. Values above 100 are clamped.
    pub fn percent(pct: u32) -> Self {
        Rate((Decimal::from(pct.min(100)) / dec!(100)).normalize())
    }

    /// Returns `floor(amount × rate)`.
    pub fn floor_of(&self, amount: Uc) -> Uc {
        self.apply(amount).floor().to_i64().unwrap_or_default()
    }

    /// Returns `ceil(amount × rate)`.
    pub fn ceil_of(&self, amount: Uc) -> Uc {
        self.apply(amount).ceil().to_i64().unwrap_or_default()
    }

    /// Returns the rate as a decimal fraction.
    pub fn value(&self) -> Decimal {
        self.0
    }

    // |amount × rate| <= |amount| for a rate in [0, 1], so the product always
    // converts back to i64.
    fn apply(&self, amount: Uc) -> Decimal {
        Decimal::from(amount) * self.0
    }
}

impl FromStr for Rate {
    type Err = SettlementError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        let decimal = Decimal::from_str(trimmed)
            .map_err(|e| SettlementError::InvalidConfig(format!("rate {:?}: {}", trimmed, e)))?;
        Rate::new(decimal)
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Rate {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Rate {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Rate::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_normalizes() {
        assert_eq!(Rate::percent(22).to_string(), "0.22");
        assert_eq!(Rate::percent(30).to_string(), "0.3");
        assert_eq!(Rate::percent(0), Rate::ZERO);
        assert_eq!(Rate::percent(250), Rate::percent(100));
    }

    #[test]
    fn test_floor_and_ceil() {
        let rate = Rate::percent(40);
        assert_eq!(rate.floor_of(13), 5);
        assert_eq!(rate.ceil_of(13), 6);
        assert_eq!(rate.floor_of(10), 4);
        assert_eq!(rate.ceil_of(10), 4);
    }

    #[test]
    fn test_exact_where_floats_drift() {
        // 0.22 * 100.0 in f64 is 22.000000000000004, 0.29 * 100.0 is 28.999999999999996
        assert_eq!(Rate::percent(22).floor_of(100), 22);
        assert_eq!(Rate::percent(29).floor_of(100), 29);
    }

    #[test]
    fn test_from_str_rejects_out_of_range() {
        assert!(Rate::from_str("1.5").is_err());
        assert!(Rate::from_str("-0.1").is_err());
        assert!(Rate::from_str("abc").is_err());
        assert_eq!(Rate::from_str(" 0.2 ").unwrap(), Rate::percent(20));
    }

    #[test]
    fn test_large_amount_does_not_overflow() {
        assert_eq!(Rate::percent(100).floor_of(i64::MAX), i64::MAX);
        assert_eq!(Rate::percent(50).floor_of(-3), -2);
    }
}
