//! Monetary amounts
//!
//! Prices are kept as integer cents and travel over the wire as two-decimal
//! strings (`"49.99"`). Input accepts a JSON number or a decimal string.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::Add;
use std::str::FromStr;

/// A non-negative amount with two decimal places (DECIMAL(10,2)).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Price(i64);

impl Price {
    /// Largest amount that fits ten significant digits
    pub const MAX_CENTS: i64 = 9_999_999_999;

    pub const ZERO: Price = Price(0);

    /// Build from cents. Callers reading from the database pass stored values.
    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub fn cents(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl FromStr for Price {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (whole, frac) = match s.split_once('.') {
            Some((whole, frac)) => (whole, frac),
            None => (s, ""),
        };

        let digits_only = |part: &str| part.chars().all(|c| c.is_ascii_digit());
        if whole.is_empty() || !digits_only(whole) || !digits_only(frac) {
            return Err(anyhow::anyhow!("A valid number is required."));
        }
        if frac.len() > 2 {
            return Err(anyhow::anyhow!(
                "Ensure that there are no more than 2 decimal places."
            ));
        }

        let whole: i64 = whole
            .parse()
            .map_err(|_| anyhow::anyhow!("Ensure that there are no more than 10 digits in total."))?;
        let frac: i64 = if frac.is_empty() {
            0
        } else {
            format!("{:0<2}", frac).parse()?
        };

        let cents = whole
            .checked_mul(100)
            .and_then(|c| c.checked_add(frac))
            .filter(|c| *c <= Self::MAX_CENTS)
            .ok_or_else(|| {
                anyhow::anyhow!("Ensure that there are no more than 10 digits in total.")
            })?;

        Ok(Price(cents))
    }
}

impl Add for Price {
    type Output = Price;

    fn add(self, rhs: Price) -> Price {
        Price(self.0.saturating_add(rhs.0))
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Price>>(iter: I) -> Price {
        iter.fold(Price::ZERO, Add::add)
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PriceVisitor;

        impl<'de> Visitor<'de> for PriceVisitor {
            type Value = Price;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a non-negative decimal amount")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Price, E> {
                v.parse().map_err(|e: anyhow::Error| E::custom(e))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Price, E> {
                self.visit_str(&v.to_string())
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Price, E> {
                self.visit_str(&v.to_string())
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Price, E> {
                if !v.is_finite() {
                    return Err(E::custom("A valid number is required."));
                }
                self.visit_str(&v.to_string())
            }
        }

        deserializer.deserialize_any(PriceVisitor)
    }
}
