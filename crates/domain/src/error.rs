//! Domain error types.

use thiserror::Error;

/// Errors raised by schema invariant checks.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    /// `stock.remaining` exceeded `stock.initial`.
    #[error("Stock remaining {remaining} exceeds initial {initial}")]
    StockExceedsInitial { initial: u32, remaining: u32 },

    /// A trade collectible was missing a positive price.
    #[error("A trade collectible requires a positive price")]
    PriceRequired,

    /// An event collectible carried a price.
    #[error("An event collectible carries no price")]
    UnexpectedPrice,

    /// A post claimed to be a collectible without referencing one, or
    /// referenced one without being flagged.
    #[error("Post collectible flag and reference disagree")]
    InconsistentCollectibleRef,
}
