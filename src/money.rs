//! Fixed-point money in minor units.
//!
//! Every monetary column is a `BIGINT` of minor units (two implied fractional
//! digits). Arithmetic stays in integers; the decimal form only appears when a
//! value is rendered to or parsed from JSON and gateway payloads.

use std::fmt;
use std::ops::{Add, AddAssign, Sub};
use std::str::FromStr;

use sea_orm::DeriveValueType;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Minor units per major unit.
pub const MINOR_PER_MAJOR: i64 = 100;

/// Basis points in 100 %.
pub const BPS_SCALE: i64 = 10_000;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, DeriveValueType)]
pub struct Money(pub i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    pub fn from_major(major: i64) -> Self {
        Money(major * MINOR_PER_MAJOR)
    }

    pub fn minor(self) -> i64 {
        self.0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    pub fn checked_mul(self, factor: i64) -> Option<Money> {
        self.0.checked_mul(factor).map(Money)
    }

    /// `self × bps / 10 000`, rounded half-to-even to the minor unit.
    pub fn percentage_bps(self, bps: i64) -> Money {
        let scaled = i128::from(self.0) * i128::from(bps);
        let rounded = div_round_half_even(scaled, i128::from(BPS_SCALE));
        // |bps| ≤ BPS_SCALE keeps the result inside the input's range.
        Money(rounded as i64)
    }

    /// Split into `parts` equal shares; the last share absorbs the remainder
    /// so the shares always sum to `self`.
    pub fn split(self, parts: usize) -> Vec<Money> {
        if parts == 0 {
            return Vec::new();
        }
        let n = parts as i64;
        let share = self.0 / n;
        let mut shares = vec![Money(share); parts];
        if let Some(last) = shares.last_mut() {
            last.0 = self.0 - share * (n - 1);
        }
        shares
    }
}

fn div_round_half_even(numerator: i128, denominator: i128) -> i128 {
    let quotient = numerator.div_euclid(denominator);
    let twice_remainder = 2 * numerator.rem_euclid(denominator);
    if twice_remainder > denominator || (twice_remainder == denominator && quotient % 2 != 0) {
        quotient + 1
    } else {
        quotient
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let per = MINOR_PER_MAJOR as u64;
        write!(f, "{sign}{}.{:02}", abs / per, abs % per)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid money amount: {0:?}")]
pub struct ParseMoneyError(pub String);

impl FromStr for Money {
    type Err = ParseMoneyError;

    /// Accepts `"630000"`, `"630000.5"` and `"630000.00"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseMoneyError(s.to_string());
        let trimmed = s.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let (whole, frac) = match digits.split_once('.') {
            Some((whole, frac)) => (whole, frac),
            None => (digits, ""),
        };
        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err());
        }
        if frac.len() > 2 || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err());
        }
        let major: i64 = whole.parse().map_err(|_| err())?;
        let minor: i64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| err())? * 10,
            _ => frac.parse().map_err(|_| err())?,
        };
        let value = major
            .checked_mul(MINOR_PER_MAJOR)
            .and_then(|v| v.checked_add(minor))
            .ok_or_else(err)?;
        Ok(Money(if negative { -value } else { value }))
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

struct MoneyVisitor;

impl Visitor<'_> for MoneyVisitor {
    type Value = Money;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a decimal string or an integer amount in major units")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Money, E> {
        v.parse().map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Money, E> {
        v.checked_mul(MINOR_PER_MAJOR)
            .map(Money)
            .ok_or_else(|| E::custom("amount out of range"))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Money, E> {
        i64::try_from(v)
            .map_err(|_| E::custom("amount out of range"))
            .and_then(|v| self.visit_i64(v))
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(MoneyVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_renders_two_decimals() {
        assert_eq!(Money::from_major(630_000).to_string(), "630000.00");
        assert_eq!(Money(5).to_string(), "0.05");
        assert_eq!(Money(-150).to_string(), "-1.50");
    }

    #[test]
    fn test_parse_accepts_gateway_forms() {
        assert_eq!("630000.00".parse::<Money>().unwrap(), Money::from_major(630_000));
        assert_eq!("630000".parse::<Money>().unwrap(), Money::from_major(630_000));
        assert_eq!("12.5".parse::<Money>().unwrap(), Money(1250));
        assert!("12.345".parse::<Money>().is_err());
        assert!("abc".parse::<Money>().is_err());
        assert!(".50".parse::<Money>().is_err());
    }

    #[test]
    fn test_fee_uses_bankers_rounding() {
        // 5 % of 600 000.00
        assert_eq!(
            Money::from_major(600_000).percentage_bps(500),
            Money::from_major(30_000)
        );
        // 0.5 minor rounds to the even neighbour.
        assert_eq!(Money(10).percentage_bps(500), Money(0));
        assert_eq!(Money(30).percentage_bps(500), Money(2));
        // 0.55 minor rounds up.
        assert_eq!(Money(11).percentage_bps(500), Money(1));
    }

    #[test]
    fn test_split_gives_remainder_to_last() {
        let shares = Money(100).split(3);
        assert_eq!(shares, vec![Money(33), Money(33), Money(34)]);
        assert_eq!(shares.into_iter().sum::<Money>(), Money(100));
        assert!(Money(100).split(0).is_empty());
    }

    #[test]
    fn test_serde_uses_decimal_strings() {
        let json = serde_json::to_string(&Money::from_major(300_000)).unwrap();
        assert_eq!(json, "\"300000.00\"");
        let back: Money = serde_json::from_str("\"300000.00\"").unwrap();
        assert_eq!(back, Money::from_major(300_000));
        let from_int: Money = serde_json::from_str("250").unwrap();
        assert_eq!(from_int, Money::from_major(250));
    }
}
