//! # Fixed-Point Amounts
//!
//! Every amount, fee and reward is quantised to 8 decimal places and stored
//! as an `i64` count of the smallest unit. Parsing accepts plain decimals
//! (`"12.5"`, `"-0.00000001"`, `".5"`) and scientific notation (`"1e-3"`),
//! rounding extra digits half-to-even. Rendering always prints exactly 8
//! decimals, which is the form that is signed and persisted.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::TypesError;

/// Number of decimal places kept.
pub const AMOUNT_DECIMALS: usize = 8;

/// Smallest units per whole coin.
pub const UNITS_PER_COIN: i64 = 100_000_000;

/// Signed 8-decimal fixed-point amount.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(i64);

impl Amount {
    /// Zero.
    pub const ZERO: Amount = Amount(0);

    /// Build from smallest units.
    pub const fn from_units(units: i64) -> Self {
        Self(units)
    }

    /// Build from whole coins.
    pub const fn from_coins(coins: i64) -> Self {
        Self(coins * UNITS_PER_COIN)
    }

    /// Raw smallest-unit count.
    pub const fn units(self) -> i64 {
        self.0
    }

    /// True if strictly below zero.
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// `numerator / denominator` coins, quantised half-to-even.
    ///
    /// Used for the per-byte openfield fee (`len / 100000`).
    pub fn from_ratio(numerator: u64, denominator: u64) -> Self {
        if denominator == 0 {
            return Self::ZERO;
        }
        let scaled = u128::from(numerator) * UNITS_PER_COIN as u128;
        let d = u128::from(denominator);
        let mut q = scaled / d;
        let r = scaled % d;
        if r * 2 > d || (r * 2 == d && q % 2 == 1) {
            q += 1;
        }
        Self(i64::try_from(q).unwrap_or(i64::MAX))
    }

    /// Lossy conversion for logging and size heuristics.
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / UNITS_PER_COIN as f64
    }

    /// Checked addition.
    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    /// Checked subtraction.
    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    fn parse_scientific(input: &str) -> Result<Self, TypesError> {
        let value: f64 = input.parse().map_err(|_| TypesError::InvalidAmount {
            input: input.to_string(),
            reason: "not a number",
        })?;
        if !value.is_finite() {
            return Err(TypesError::InvalidAmount {
                input: input.to_string(),
                reason: "not finite",
            });
        }
        let units = (value * UNITS_PER_COIN as f64).round_ties_even();
        if units.abs() >= i64::MAX as f64 {
            return Err(TypesError::AmountOverflow(input.to_string()));
        }
        Ok(Self(units as i64))
    }

    fn parse_decimal(input: &str) -> Result<Self, TypesError> {
        let invalid = |reason| TypesError::InvalidAmount {
            input: input.to_string(),
            reason,
        };
        let (negative, body) = match input.as_bytes().first() {
            Some(b'-') => (true, &input[1..]),
            Some(b'+') => (false, &input[1..]),
            _ => (false, input),
        };
        let (int_part, frac_part) = match body.split_once('.') {
            Some((i, f)) => (i, f),
            None => (body, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid("no digits"));
        }
        if !int_part.bytes().all(|b| b.is_ascii_digit())
            || !frac_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid("unexpected character"));
        }

        let overflow = || TypesError::AmountOverflow(input.to_string());
        let mut units: i64 = 0;
        for b in int_part.bytes() {
            units = units
                .checked_mul(10)
                .and_then(|u| u.checked_add(i64::from(b - b'0')))
                .ok_or_else(overflow)?;
        }
        units = units.checked_mul(UNITS_PER_COIN).ok_or_else(overflow)?;

        let kept = &frac_part[..frac_part.len().min(AMOUNT_DECIMALS)];
        let mut frac: i64 = 0;
        for b in kept.bytes() {
            frac = frac * 10 + i64::from(b - b'0');
        }
        for _ in kept.len()..AMOUNT_DECIMALS {
            frac *= 10;
        }

        // half-to-even on the dropped digits
        if frac_part.len() > AMOUNT_DECIMALS {
            let dropped = &frac_part.as_bytes()[AMOUNT_DECIMALS..];
            let first = dropped[0];
            let rest_nonzero = dropped[1..].iter().any(|&b| b != b'0');
            let round_up = first > b'5'
                || (first == b'5' && (rest_nonzero || frac % 2 == 1));
            if round_up {
                frac += 1;
            }
        }

        units = units.checked_add(frac).ok_or_else(overflow)?;
        Ok(Self(if negative { -units } else { units }))
    }
}

impl FromStr for Amount {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(TypesError::InvalidAmount {
                input: s.to_string(),
                reason: "empty",
            });
        }
        if trimmed.contains(['e', 'E']) {
            Self::parse_scientific(trimmed)
        } else {
            Self::parse_decimal(trimmed)
        }
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let per = UNITS_PER_COIN as u64;
        write!(f, "{}{}.{:08}", sign, abs / per, abs % per)
    }
}

impl Add for Amount {
    type Output = Amount;
    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Amount {
    type Output = Amount;
    fn sub(self, rhs: Amount) -> Amount {
        Amount(self.0.saturating_sub(rhs.0))
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Amount) {
        *self = *self + rhs;
    }
}

impl SubAssign for Amount {
    fn sub_assign(&mut self, rhs: Amount) {
        *self = *self - rhs;
    }
}

impl Neg for Amount {
    type Output = Amount;
    fn neg(self) -> Amount {
        Amount(self.0.saturating_neg())
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Amount {
        iter.fold(Amount::ZERO, Add::add)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AmountVisitor;

        impl Visitor<'_> for AmountVisitor {
            type Value = Amount;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a decimal amount as string or number")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
                v.parse().map_err(E::custom)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
                v.checked_mul(UNITS_PER_COIN)
                    .map(Amount)
                    .ok_or_else(|| E::custom("amount out of range"))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
                i64::try_from(v)
                    .map_err(|_| E::custom("amount out of range"))
                    .and_then(|v| self.visit_i64(v))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Amount, E> {
                format!("{:e}", v).parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}
