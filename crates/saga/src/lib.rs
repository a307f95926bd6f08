//! Marketplace transaction sagas for the collectible platform.
//!
//! This crate provides the multi-document transaction core: each flow
//! updates several independent documents (balances, stock counters,
//! ledgers, collector rosters) that cannot share a native transaction,
//! so it runs them as a saga with explicit compensating actions:
//!
//! 1. Trade purchase — buy a priced collectible from its creator
//! 2. Event collection — redeem a single-use code for a free collectible
//! 3. Collectible creation — attach a collectible to a post
//!
//! If any mutation fails, previously completed mutations are compensated
//! in reverse order. Overlapping attempts on the same resource are
//! serialized by a keyed async mutex.

pub mod collect;
pub mod compensation;
pub mod coordinator;
pub mod create;
pub mod error;
pub mod lock;
pub mod purchase;
pub mod services;
pub mod state;

pub use compensation::SagaExecution;
pub use coordinator::{
    CollectOutcome, CreateCollectibleRequest, CreateOutcome, MarketCoordinator, PurchaseOutcome,
};
pub use error::MarketError;
pub use lock::KeyedMutex;
pub use services::{
    AuthResolver, IdentityVerifier, InMemoryAuthResolver, InMemoryIdentityVerifier,
    InMemoryNotificationService, NotificationEvent, NotificationService, VerifiedIdentity,
};
pub use state::SagaState;
