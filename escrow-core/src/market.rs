//! Marketplace records (items, transactions) and the read-only [`Catalog`] used during dispatch.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::error::StoreError;

const MICROS_PER_UNIT: i64 = 1_000_000;
const MAX_FRACTION_DIGITS: usize = 6;

/// USDT amount in micro units (6 decimal places, like TRC20 USDT).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(i64);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("empty amount")]
    Empty,
    #[error("not a decimal number: {0}")]
    Invalid(String),
    #[error("more than 6 decimal places")]
    TooPrecise,
    #[error("amount must be positive")]
    NotPositive,
    #[error("amount too large")]
    Overflow,
}

impl Amount {
    pub fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    pub fn micros(self) -> i64 {
        self.0
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(AmountError::Empty);
        }
        let (whole, fraction) = s.split_once('.').unwrap_or((s, ""));
        if whole.is_empty() && fraction.is_empty() {
            return Err(AmountError::Invalid(s.to_string()));
        }
        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(whole) || !all_digits(fraction) {
            return Err(AmountError::Invalid(s.to_string()));
        }
        if fraction.len() > MAX_FRACTION_DIGITS {
            return Err(AmountError::TooPrecise);
        }

        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| AmountError::Overflow)?
        };
        let fraction_micros: i64 = if fraction.is_empty() {
            0
        } else {
            let padded = format!("{:0<width$}", fraction, width = MAX_FRACTION_DIGITS);
            padded.parse().map_err(|_| AmountError::Invalid(s.to_string()))?
        };
        let micros = whole
            .checked_mul(MICROS_PER_UNIT)
            .and_then(|m| m.checked_add(fraction_micros))
            .ok_or(AmountError::Overflow)?;
        if micros <= 0 {
            return Err(AmountError::NotPositive);
        }
        Ok(Self(micros))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / MICROS_PER_UNIT;
        let fraction = (self.0 % MICROS_PER_UNIT).abs();
        if fraction == 0 {
            write!(f, "{}", whole)
        } else {
            let digits = format!("{:06}", fraction);
            write!(f, "{}.{}", whole, digits.trim_end_matches('0'))
        }
    }
}

/// Digital goods or physical goods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Digital,
    Physical,
}

impl ItemKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemKind::Digital => "digital",
            ItemKind::Physical => "physical",
        }
    }

    /// Accepts the English names and the Korean labels the marketplace was launched with.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "digital" | "디지털" => Some(ItemKind::Digital),
            "physical" | "현물" => Some(ItemKind::Physical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Available,
    Reserved,
    Sold,
}

impl ItemStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Available => "available",
            ItemStatus::Reserved => "reserved",
            ItemStatus::Sold => "sold",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "available" => Some(ItemStatus::Available),
            "reserved" => Some(ItemStatus::Reserved),
            "sold" => Some(ItemStatus::Sold),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
}

impl TransactionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TransactionStatus::Pending),
            "completed" => Some(TransactionStatus::Completed),
            _ => None,
        }
    }
}

/// An item listed for sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub name: String,
    pub price: Amount,
    pub seller_id: i64,
    pub status: ItemStatus,
    pub kind: ItemKind,
}

/// A purchase request held in escrow until the seller confirms payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub item_id: i64,
    pub buyer_id: i64,
    pub seller_id: i64,
    pub status: TransactionStatus,
    pub amount: Amount,
}

/// Read-only view of the marketplace. Handlers query it; all writes go through [`crate::Write`] effects.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Items with status `available`, oldest first.
    async fn available_items(&self) -> Result<Vec<Item>, StoreError>;
    async fn item(&self, item_id: i64) -> Result<Option<Item>, StoreError>;
    /// The `pending` transaction on `item_id`, if any.
    async fn pending_transaction_for_item(
        &self,
        item_id: i64,
    ) -> Result<Option<Transaction>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_parse() {
        assert_eq!("12".parse::<Amount>().unwrap().micros(), 12_000_000);
        assert_eq!("12.5".parse::<Amount>().unwrap().micros(), 12_500_000);
        assert_eq!("0.000001".parse::<Amount>().unwrap().micros(), 1);
        assert_eq!(".5".parse::<Amount>().unwrap().micros(), 500_000);
    }

    #[test]
    fn test_amount_parse_rejects() {
        assert_eq!("".parse::<Amount>(), Err(AmountError::Empty));
        assert_eq!("0".parse::<Amount>(), Err(AmountError::NotPositive));
        assert_eq!("1.0000001".parse::<Amount>(), Err(AmountError::TooPrecise));
        assert!(matches!("-3".parse::<Amount>(), Err(AmountError::Invalid(_))));
        assert!(matches!("abc".parse::<Amount>(), Err(AmountError::Invalid(_))));
        assert!(matches!(".".parse::<Amount>(), Err(AmountError::Invalid(_))));
        assert_eq!(
            "99999999999999999999".parse::<Amount>(),
            Err(AmountError::Overflow)
        );
    }

    #[test]
    fn test_amount_display() {
        assert_eq!(Amount::from_micros(12_000_000).to_string(), "12");
        assert_eq!(Amount::from_micros(12_500_000).to_string(), "12.5");
        assert_eq!(Amount::from_micros(1).to_string(), "0.000001");
    }

    #[test]
    fn test_item_kind_parse() {
        assert_eq!(ItemKind::parse("Digital"), Some(ItemKind::Digital));
        assert_eq!(ItemKind::parse("현물"), Some(ItemKind::Physical));
        assert_eq!(ItemKind::parse("service"), None);
    }
}
