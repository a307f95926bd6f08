//! External collaborator traits and in-memory implementations.

pub mod auth;
pub mod identity;
pub mod notifications;

pub use auth::{AuthResolver, InMemoryAuthResolver};
pub use identity::{IdentityVerifier, InMemoryIdentityVerifier, VerifiedIdentity};
pub use notifications::{InMemoryNotificationService, NotificationEvent, NotificationService};
