//! Shared identifier types for the collectible marketplace.

mod types;

pub use types::Username;
