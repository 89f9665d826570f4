//! Amount type for handling rupiah values.
//!
//! The backend does not agree with itself about amounts: some rows hold a plain number, others a
//! display string such as `"Rp150.000"`, and some hold nothing at all. `Amount` normalizes all of
//! these once, when a row is deserialized, so that every sum in the program sees the same value.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::convert::Infallible;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::str::FromStr;
use tracing::warn;

/// Represents a rupiah amount.
///
/// # Examples
///
/// Formatted strings and plain numbers normalize to the same value:
/// ```
/// # use amil::model::Amount;
/// # use std::str::FromStr;
/// let a = Amount::from_str("Rp150.000").unwrap();
/// let b = Amount::from_rupiah(150000);
/// assert_eq!(a, b);
/// assert_eq!(a.to_string(), "Rp150.000");
/// ```
///
/// Anything that has no digits is zero:
/// ```
/// # use amil::model::Amount;
/// # use std::str::FromStr;
/// assert!(Amount::from_str("n/a").unwrap().is_zero());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount {
    value: Decimal,
}

impl Amount {
    pub const ZERO: Amount = Amount {
        value: Decimal::ZERO,
    };

    /// Creates a new Amount from a Decimal value.
    pub const fn new(value: Decimal) -> Self {
        Self { value }
    }

    /// Creates a new Amount from a whole number of rupiah.
    pub fn from_rupiah(rupiah: i64) -> Self {
        Self::new(Decimal::from(rupiah))
    }

    /// Returns the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.value
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    /// Returns the value as an `f64`, for renderers that only take floating point numbers.
    pub fn to_f64(&self) -> f64 {
        self.value.to_f64().unwrap_or_default()
    }

    /// Adds two amounts, clamping at the largest or smallest representable value instead of
    /// overflowing.
    pub fn saturating_add(self, rhs: Self) -> Self {
        match self.value.checked_add(rhs.value) {
            Some(value) => Amount::new(value),
            None => {
                warn!("The sum of {} and {} is out of range, using the limit", self.value, rhs.value);
                Amount::new(self.value.saturating_add(rhs.value))
            }
        }
    }

    /// Normalizes an amount as it appears in a backend row.
    ///
    /// - Numbers are used as they are. Numbers beyond the representable range are clamped to it.
    /// - Strings have every character that is not a decimal digit removed and the remainder is
    ///   parsed as an integer. If no digits remain the amount is zero; more digits than fit are
    ///   clamped to the largest representable value.
    /// - Anything else (null, booleans, objects, arrays) is zero.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Amount::new(Decimal::from(i))
                } else if let Some(u) = n.as_u64() {
                    Amount::new(Decimal::from(u))
                } else {
                    match n.as_f64() {
                        Some(f) => Decimal::from_f64(f)
                            .map(Amount::new)
                            .unwrap_or_else(|| clamp(f, &n.to_string())),
                        None => Amount::ZERO,
                    }
                }
            }
            Value::String(s) => normalize_str(s),
            _ => Amount::ZERO,
        }
    }
}

/// The limit on the side of `f`, for numbers too large to represent.
fn clamp(f: f64, raw: &str) -> Amount {
    if f.is_nan() {
        return Amount::ZERO;
    }
    warn!("The amount {raw} is out of range, using the limit");
    if f.is_sign_negative() {
        Amount::new(Decimal::MIN)
    } else {
        Amount::new(Decimal::MAX)
    }
}

/// Strips all non-digit characters and parses the remainder as an integer, or returns zero.
fn normalize_str(s: &str) -> Amount {
    let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
    let significant = digits.trim_start_matches('0');
    if significant.is_empty() {
        return Amount::ZERO;
    }
    Decimal::from_str(significant)
        .map(Amount::new)
        .unwrap_or_else(|_| clamp(f64::INFINITY, s))
}

impl FromStr for Amount {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(normalize_str(s))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.value.is_sign_negative() && !self.is_zero() {
            "-"
        } else {
            ""
        };
        let whole = self.value.abs().round().to_f64().unwrap_or_default();
        // format_num groups with commas; rupiah are grouped with dots.
        let grouped = format_num::format_num!(",.0", whole).replace(',', ".");
        write!(f, "{sign}Rp{grouped}")
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if self.value.fract().is_zero() {
            if let Some(i) = self.value.to_i64() {
                return serializer.serialize_i64(i);
            }
        }
        serializer.serialize_f64(self.to_f64())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(Amount::from_json(&value))
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Amount::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.value()
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Self) -> Self::Output {
        self.saturating_add(rhs)
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Self) {
        *self = self.saturating_add(rhs);
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, |acc, a| acc + a)
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Amount>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, |acc, a| acc + *a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_number_and_formatted_string_agree() {
        let number = Amount::from_json(&json!(150000));
        let string = Amount::from_json(&json!("Rp150.000"));
        assert_eq!(number, string);
        assert_eq!(number.value(), Decimal::from(150000));
    }

    #[test]
    fn test_string_with_commas_and_spaces() {
        let amount = Amount::from_str(" Rp 1,250,000 ").unwrap();
        assert_eq!(amount, Amount::from_rupiah(1_250_000));
    }

    #[test]
    fn test_plain_digit_string() {
        let amount = Amount::from_json(&json!("100000"));
        assert_eq!(amount, Amount::from_rupiah(100_000));
    }

    #[test]
    fn test_string_without_digits_is_zero() {
        assert!(Amount::from_json(&json!("Rp")).is_zero());
        assert!(Amount::from_json(&json!("")).is_zero());
    }

    #[test]
    fn test_non_numeric_values_are_zero() {
        assert!(Amount::from_json(&Value::Null).is_zero());
        assert!(Amount::from_json(&json!(true)).is_zero());
        assert!(Amount::from_json(&json!({"jumlah": 5})).is_zero());
        assert!(Amount::from_json(&json!([1, 2])).is_zero());
    }

    #[test]
    fn test_too_many_digits_is_clamped() {
        let s = "9".repeat(40);
        assert_eq!(Amount::from_str(&s).unwrap().value(), Decimal::MAX);
        let ones = "1".repeat(30);
        assert_eq!(Amount::from_json(&json!(ones)).value(), Decimal::MAX);
    }

    #[test]
    fn test_leading_zeros() {
        let s = format!("{}42", "0".repeat(40));
        assert_eq!(Amount::from_str(&s).unwrap(), Amount::from_rupiah(42));
        assert!(Amount::from_str("Rp000").unwrap().is_zero());
    }

    #[test]
    fn test_huge_number_is_clamped() {
        assert_eq!(Amount::from_json(&json!(1e30)).value(), Decimal::MAX);
        assert_eq!(Amount::from_json(&json!(-1e30)).value(), Decimal::MIN);
    }

    #[test]
    fn test_add_saturates() {
        let max = Amount::new(Decimal::MAX);
        assert_eq!(max + Amount::from_rupiah(1), max);
        let mut sum = max;
        sum += max;
        assert_eq!(sum, max);
        let min = Amount::new(Decimal::MIN);
        assert_eq!(min + Amount::from_rupiah(-1), min);
        let total: Amount = [max, max, Amount::from_rupiah(5)].iter().sum();
        assert_eq!(total, max);
    }

    #[test]
    fn test_float_number_is_used_as_is() {
        let amount = Amount::from_json(&json!(2500.5));
        assert_eq!(amount.value(), Decimal::from_str("2500.5").unwrap());
    }

    #[test]
    fn test_display() {
        assert_eq!(Amount::from_rupiah(0).to_string(), "Rp0");
        assert_eq!(Amount::from_rupiah(950).to_string(), "Rp950");
        assert_eq!(Amount::from_rupiah(425_000).to_string(), "Rp425.000");
        assert_eq!(Amount::from_rupiah(12_345_678).to_string(), "Rp12.345.678");
        assert_eq!(Amount::from_rupiah(-75_000).to_string(), "-Rp75.000");
    }

    #[test]
    fn test_serialize_as_integer() {
        let json = serde_json::to_string(&Amount::from_rupiah(75000)).unwrap();
        assert_eq!(json, "75000");
    }

    #[test]
    fn test_deserialize_mixed() {
        let amounts: Vec<Amount> =
            serde_json::from_str(r#"[100000, "Rp50.000", null, "abc"]"#).unwrap();
        let total: Amount = amounts.iter().sum();
        assert_eq!(total, Amount::from_rupiah(150_000));
    }

    #[test]
    fn test_add_assign() {
        let mut a = Amount::from_rupiah(10);
        a += Amount::from_rupiah(5);
        assert_eq!(a, Amount::from_rupiah(15));
    }
}
