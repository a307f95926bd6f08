//! Domain layer: typed document schemas, value objects, and canonical
//! path constructors for the collectible marketplace.
//!
//! Every collection in the document tree has exactly one schema struct
//! here; the store adapter deserializes into these at its boundary so
//! the transaction logic never handles duck-typed maps.

pub mod error;
pub mod paths;
pub mod schemas;
pub mod value_objects;

pub use error::DomainError;
pub use schemas::{
    CollectedEntry, Collectible, CollectibleRef, CollectorRecord, LedgerDirection, MarketConfig,
    PaymentIntentEntry, Post, Receipt, RedemptionCode, TradeLedgerEntry, UserProfile, Wallet,
};
pub use value_objects::{CollectibleKind, Money, Stock};
