//! Coin amounts with exact integer arithmetic

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::common::Error;

/// An amount of a single denomination
///
/// Amounts are `u128` so balance assertions never round.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    #[serde(deserialize_with = "amount_from_string", serialize_with = "amount_to_string")]
    pub amount: u128,
}

impl Coin {
    pub fn new(amount: u128, denom: impl Into<String>) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }

    /// Zero amount of `denom`
    pub fn zero(denom: impl Into<String>) -> Self {
        Self::new(0, denom)
    }

    pub fn checked_add(&self, other: &Coin) -> Option<Coin> {
        self.same_denom(other)?;
        self.amount
            .checked_add(other.amount)
            .map(|amount| Coin::new(amount, &self.denom))
    }

    pub fn checked_sub(&self, other: &Coin) -> Option<Coin> {
        self.same_denom(other)?;
        self.amount
            .checked_sub(other.amount)
            .map(|amount| Coin::new(amount, &self.denom))
    }

    /// Apply a signed change, as used by balance-delta assertions
    pub fn checked_apply(&self, change: i128) -> Option<Coin> {
        let amount = if change >= 0 {
            self.amount.checked_add(change.unsigned_abs())?
        } else {
            self.amount.checked_sub(change.unsigned_abs())?
        };
        Some(Coin::new(amount, &self.denom))
    }

    fn same_denom(&self, other: &Coin) -> Option<()> {
        (self.denom == other.denom).then_some(())
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

impl FromStr for Coin {
    type Err = Error;

    /// Parse `<amount><denom>`, e.g. `1000stake` or `25ibc/27A6...`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| Error::decode("coin", format!("missing denom in '{}'", s)))?;
        let (amount, denom) = s.split_at(split);
        if amount.is_empty() {
            return Err(Error::decode("coin", format!("missing amount in '{}'", s)));
        }
        if !denom.starts_with(|c: char| c.is_ascii_alphabetic()) {
            return Err(Error::decode("coin", format!("invalid denom in '{}'", s)));
        }
        let amount = amount
            .parse::<u128>()
            .map_err(|e| Error::decode("coin", format!("'{}': {}", s, e)))?;
        Ok(Coin::new(amount, denom))
    }
}

fn amount_from_string<'de, D>(deserializer: D) -> Result<u128, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.parse::<u128>().map_err(serde::de::Error::custom)
}

fn amount_to_string<S>(amount: &u128, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&amount.to_string())
}
