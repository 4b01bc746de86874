//! Fixed-point currency amounts.
//!
//! `Money` counts minor units (1/100 of the major unit, e.g. paise or cents) in an
//! `i64`. Balances never go negative, but the type itself is signed so that the
//! arithmetic helpers can report underflow instead of wrapping.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Number of minor units in one major unit.
pub const MINOR_PER_MAJOR: i64 = 100;

/// Fixed-point currency amount in minor units.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// Whole major units (e.g. `Money::from_major(100)` is 100.00).
    pub fn from_major(major: i64) -> DomainResult<Self> {
        major
            .checked_mul(MINOR_PER_MAJOR)
            .map(Self)
            .ok_or_else(|| DomainError::invalid_amount(format!("{major} is out of range")))
    }

    pub const fn minor_units(self) -> i64 {
        self.0
    }

    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }

    pub const fn saturating_add(self, other: Money) -> Money {
        Money(self.0.saturating_add(other.0))
    }

    pub const fn saturating_sub(self, other: Money) -> Money {
        Money(self.0.saturating_sub(other.0))
    }

    /// Parse a caller-supplied transaction amount.
    ///
    /// Accepts plain decimal text with at most two fractional digits
    /// (`"100"`, `"40.5"`, `"0.01"`). The result must be strictly positive.
    pub fn parse_amount(input: &str) -> DomainResult<Self> {
        let text = input.trim();
        if text.is_empty() {
            return Err(DomainError::invalid_amount("amount is empty"));
        }

        let (whole, frac) = match text.split_once('.') {
            Some((w, f)) => (w, Some(f)),
            None => (text, None),
        };

        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DomainError::invalid_amount(format!("'{text}' is not a number")));
        }

        let frac_minor = match frac {
            None => 0,
            Some(f) if f.is_empty() || f.len() > 2 || !f.bytes().all(|b| b.is_ascii_digit()) => {
                return Err(DomainError::invalid_amount(format!(
                    "'{text}' must have one or two decimal places"
                )));
            }
            Some(f) => {
                let digits: i64 = f
                    .parse()
                    .map_err(|_| DomainError::invalid_amount(format!("'{text}' is not a number")))?;
                if f.len() == 1 { digits * 10 } else { digits }
            }
        };

        let whole_major: i64 = whole
            .parse()
            .map_err(|_| DomainError::invalid_amount(format!("'{text}' is out of range")))?;

        let minor = whole_major
            .checked_mul(MINOR_PER_MAJOR)
            .and_then(|m| m.checked_add(frac_minor))
            .ok_or_else(|| DomainError::invalid_amount(format!("'{text}' is out of range")))?;

        Money(minor).ensure_positive()
    }

    /// Convert a floating-point major-unit amount (e.g. form input already parsed
    /// as `f64`) into `Money`.
    pub fn try_from_major(value: f64) -> DomainResult<Self> {
        if !value.is_finite() {
            return Err(DomainError::invalid_amount("amount must be finite"));
        }

        let scaled = value * MINOR_PER_MAJOR as f64;
        let rounded = scaled.round();
        if (scaled - rounded).abs() > 1e-6 {
            return Err(DomainError::invalid_amount(format!(
                "{value} has more than two decimal places"
            )));
        }
        if rounded.abs() >= i64::MAX as f64 {
            return Err(DomainError::invalid_amount(format!("{value} is out of range")));
        }

        Money(rounded as i64).ensure_positive()
    }

    /// Reject zero and negative amounts.
    pub fn ensure_positive(self) -> DomainResult<Self> {
        if self.is_positive() {
            Ok(self)
        } else {
            Err(DomainError::invalid_amount(format!(
                "amount must be positive (got {self})"
            )))
        }
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let per = MINOR_PER_MAJOR as u64;
        write!(f, "{sign}{}.{:02}", abs / per, abs % per)
    }
}
