//! Marketplace error taxonomy.
//!
//! Validation failures never mutate state and are reported directly.
//! Mutation-phase failures always trigger best-effort compensation and
//! surface as [`MarketError::StepFailed`] regardless of rollback outcome.

use common::Username;
use doc_store::DocStoreError;
use domain::{CollectibleKind, DomainError, Money};
use thiserror::Error;

/// Errors that can occur during marketplace saga operations.
#[derive(Debug, Error)]
pub enum MarketError {
    /// The caller credential could not be resolved to an account.
    #[error("Caller credential could not be resolved")]
    Unauthorized,

    /// Missing or malformed input.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The referenced post does not exist.
    #[error("Post not found: {0}")]
    PostNotFound(String),

    /// The referenced post carries no collectible.
    #[error("Post is not a collectible")]
    NotCollectible,

    /// The collectible's kind does not match the flow being executed.
    #[error("Expected a {expected} collectible, found {actual}")]
    WrongKind {
        expected: CollectibleKind,
        actual: CollectibleKind,
    },

    /// A creator may not acquire their own collectible.
    #[error("Creator may not acquire their own collectible")]
    SelfPurchase,

    /// No stock left.
    #[error("Collectible is out of stock")]
    OutOfStock,

    /// The caller already owns this collectible.
    #[error("Collectible already acquired by caller")]
    AlreadyCollected,

    /// The buyer's balance does not cover the price.
    #[error("Insufficient funds: price {required}, balance {available}")]
    InsufficientFunds { required: Money, available: Money },

    /// A verified-identity record is required and missing.
    #[error("No verified identity on record for {0}")]
    UnverifiedIdentity(Username),

    /// The caller does not own the target post.
    #[error("Caller does not own the post")]
    NotPostOwner,

    /// The post already references a collectible.
    #[error("Post already has a collectible")]
    AlreadyCollectible,

    /// Only verified creators may create trade collectibles.
    #[error("Creator is not verified for trade collectibles")]
    CreatorNotVerified,

    /// Requested stock exceeds the configured limit.
    #[error("Requested stock {requested} exceeds the limit {limit}")]
    StockLimitExceeded { requested: u32, limit: u32 },

    /// The price is not one of the configured denominations.
    #[error("Price {0} is not an allowed denomination")]
    PriceNotAllowed(Money),

    /// The redemption code does not exist.
    #[error("Unknown redemption code")]
    InvalidCode,

    /// The redemption code was already consumed.
    #[error("Redemption code already used")]
    CodeUsed,

    /// Lock acquisition timed out.
    #[error("Timed out waiting for lock '{0}'")]
    LockTimeout(String),

    /// A mutation step failed; compensation has been attempted.
    #[error("Saga step '{step}' failed: {reason}")]
    StepFailed { step: &'static str, reason: String },

    /// Notification dispatch failed where dispatch is mandatory.
    #[error("Notification dispatch failed: {0}")]
    Notification(String),

    /// Document store error.
    #[error("Document store error: {0}")]
    Store(#[from] DocStoreError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Domain invariant violation in stored data.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, MarketError>;
