//! One schema struct per collection in the document tree.
//!
//! Documents serialize with camelCase field names, matching the wire
//! format of the document database. Dotted field paths used in partial
//! updates are collected in [`fields`] so call sites never hand-write
//! them.

use chrono::{DateTime, Utc};
use common::Username;
use doc_store::DocPath;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::value_objects::{CollectibleKind, Money, Stock};

/// Dotted field paths used in partial updates.
pub mod fields {
    pub const STOCK_REMAINING: &str = "stock.remaining";
    pub const BALANCE: &str = "balance";
    pub const COLLECTIBLE_COUNT: &str = "collectibleCount";
    pub const IS_CONSUMED: &str = "isConsumed";
    pub const CONSUMED_TIME: &str = "consumedTime";
    pub const CONSUMER: &str = "consumer";
    pub const COLLECTIBLE: &str = "collectible";
}

/// A finite-stock digital item tied to a post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collectible {
    /// The collectible's own document id.
    pub id: String,
    pub creator: Username,
    pub post_path: DocPath,
    pub kind: CollectibleKind,
    /// Present and positive iff `kind` is [`CollectibleKind::Trade`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Money>,
    pub stock: Stock,
    pub created_at: DateTime<Utc>,
}

impl Collectible {
    /// Creates a trade collectible.
    pub fn trade(
        id: impl Into<String>,
        creator: Username,
        post_path: DocPath,
        price: Money,
        stock: Stock,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            creator,
            post_path,
            kind: CollectibleKind::Trade,
            price: Some(price),
            stock,
            created_at,
        }
    }

    /// Creates an event collectible.
    pub fn event(
        id: impl Into<String>,
        creator: Username,
        post_path: DocPath,
        stock: Stock,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            creator,
            post_path,
            kind: CollectibleKind::Event,
            price: None,
            stock,
            created_at,
        }
    }

    /// Checks the schema invariants.
    pub fn validate(&self) -> Result<(), DomainError> {
        self.stock.validate()?;
        match self.kind {
            CollectibleKind::Trade => match self.price {
                Some(price) if price.is_positive() => Ok(()),
                _ => Err(DomainError::PriceRequired),
            },
            CollectibleKind::Event => {
                if self.price.is_some() {
                    Err(DomainError::UnexpectedPrice)
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// A post's reference to its collectible, if any.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectibleRef {
    pub is_collectible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collectible_path: Option<DocPath>,
}

impl CollectibleRef {
    /// A post without a collectible.
    pub fn none() -> Self {
        Self::default()
    }

    /// A post referencing the given collectible.
    pub fn to(path: DocPath) -> Self {
        Self {
            is_collectible: true,
            collectible_path: Some(path),
        }
    }
}

/// A user-authored post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub author: Username,
    #[serde(default)]
    pub caption: String,
    #[serde(default)]
    pub collectible: CollectibleRef,
    pub created_at: DateTime<Utc>,
}

impl Post {
    /// Returns the collectible path when the post is flagged as a
    /// collectible, `None` when it isn't, and an error when flag and
    /// reference disagree.
    pub fn collectible_path(&self) -> Result<Option<&DocPath>, DomainError> {
        match (
            self.collectible.is_collectible,
            self.collectible.collectible_path.as_ref(),
        ) {
            (true, Some(path)) => Ok(Some(path)),
            (false, None) => Ok(None),
            _ => Err(DomainError::InconsistentCollectibleRef),
        }
    }
}

/// One record per (collectible, acquiring user) pair, stored under the
/// collectible's `collectors` sub-collection. Its existence is the
/// single-acquisition guard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectorRecord {
    pub username: Username,
    pub collected_at: DateTime<Utc>,
}

/// Platform account profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub username: Username,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub collectible_count: i64,
}

/// A user's wallet. The balance is mutated only through atomic
/// increments, never read-modify-write.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub balance: Money,
}

/// Which side of a trade a payment-intent entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerDirection {
    Purchase,
    Sale,
}

/// Append-only receipt record written into each party's payment-intent
/// ledger, keyed by `"{millis}-{counterparty}"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentEntry {
    pub counterparty: Username,
    pub amount: Money,
    pub direction: LedgerDirection,
    pub timestamp: DateTime<Utc>,
}

impl PaymentIntentEntry {
    /// Document id of an entry: shared timestamp plus counterparty.
    pub fn key(timestamp: &DateTime<Utc>, counterparty: &Username) -> String {
        format!("{}-{}", timestamp.timestamp_millis(), counterparty)
    }
}

/// Per-user record of one acquisition, sale, creation, or collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeLedgerEntry {
    pub post_path: DocPath,
    pub collectible_path: DocPath,
    pub timestamp: DateTime<Utc>,
}

/// Single-use redemption token for an event collectible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionCode {
    /// The code value, equal to the document's own id.
    pub code: String,
    pub collectible_path: DocPath,
    pub post_path: DocPath,
    pub creator: Username,
    pub is_consumed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumed_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumer: Option<Username>,
}

impl RedemptionCode {
    /// Creates an unconsumed code.
    pub fn fresh(
        code: impl Into<String>,
        collectible_path: DocPath,
        post_path: DocPath,
        creator: Username,
    ) -> Self {
        Self {
            code: code.into(),
            collectible_path,
            post_path,
            creator,
            is_consumed: false,
            consumed_time: None,
            consumer: None,
        }
    }
}

/// Identity-verified trade receipt in the global `receipts` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub buyer: Username,
    pub buyer_legal_name: String,
    pub seller: Username,
    pub seller_legal_name: String,
    pub amount: Money,
    pub collectible_path: DocPath,
    pub timestamp: DateTime<Utc>,
}

/// Global record of one event-collectible redemption, with the
/// collector's rank in claim order (1 = first claim).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectedEntry {
    pub collectible_path: DocPath,
    pub collector: Username,
    pub rank: u32,
    pub timestamp: DateTime<Utc>,
}

/// Global marketplace configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketConfig {
    pub max_stock: u32,
    pub denominations: Vec<Money>,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            max_stock: 1000,
            denominations: [1, 5, 10, 20, 50, 100]
                .into_iter()
                .map(Money::from_dollars)
                .collect(),
        }
    }
}

impl MarketConfig {
    /// Returns true when the price is one of the allowed denominations.
    pub fn allows_price(&self, price: Money) -> bool {
        self.denominations.contains(&price)
    }
}
