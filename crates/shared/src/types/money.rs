//! Money type with fixed two-decimal precision.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! This type wraps `rust_decimal::Decimal` and pins the scale to exactly
//! two fractional digits so amounts round-trip storage byte-for-byte.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of fractional digits carried by every [`Money`] value.
pub const MONEY_SCALE: u32 = 2;

/// Errors raised when admitting a raw decimal as [`Money`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// The value carries more than two significant fractional digits.
    #[error("amount {0} has more than {MONEY_SCALE} decimal places")]
    ExcessPrecision(Decimal),
}

/// A signed monetary amount with exactly two decimal places.
///
/// All arithmetic is exact decimal arithmetic; values with more than two
/// significant fractional digits are rejected at the boundary rather than
/// rounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    /// Zero amount.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Admits a raw decimal as money.
    ///
    /// Trailing zeros beyond two places are tolerated (`2.500` is `2.50`);
    /// genuine sub-cent precision is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::ExcessPrecision`] if the value has more than
    /// two significant fractional digits.
    pub fn new(amount: Decimal) -> Result<Self, MoneyError> {
        let mut normalized = amount;
        if normalized.scale() > MONEY_SCALE {
            normalized = normalized.normalize();
            if normalized.scale() > MONEY_SCALE {
                return Err(MoneyError::ExcessPrecision(amount));
            }
        }
        normalized.rescale(MONEY_SCALE);
        Ok(Self(normalized))
    }

    /// Returns the inner decimal (always scale 2).
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Returns true if the amount is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the amount is strictly positive.
    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Returns true if the amount is strictly negative.
    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::ZERO
    }
}

impl TryFrom<Decimal> for Money {
    type Error = MoneyError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl std::ops::Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl std::ops::Neg for Money {
    type Output = Self;

    fn neg(self) -> Self {
        Self(-self.0)
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl std::ops::SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, m| acc + m)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Money {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decimal: Decimal = s.parse().map_err(|e| format!("invalid amount: {e}"))?;
        Self::new(decimal).map_err(|e| e.to_string())
    }
}
