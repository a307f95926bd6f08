//! Identity/payment verification provider.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::Username;

use crate::error::MarketError;

/// A legal identity confirmed by the external verification provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    /// Legal name as recorded by the provider; printed on receipts.
    pub legal_name: String,
}

/// Looks up verified-identity records with the external provider.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Returns the verified identity for a user, or `None` when the user
    /// has not completed verification.
    async fn verified_identity(
        &self,
        username: &Username,
    ) -> Result<Option<VerifiedIdentity>, MarketError>;
}

/// In-memory identity verifier for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryIdentityVerifier {
    identities: Arc<RwLock<HashMap<Username, VerifiedIdentity>>>,
}

impl InMemoryIdentityVerifier {
    /// Creates a new in-memory verifier with no verified identities.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a verified identity for a username.
    pub fn register(&self, username: Username, legal_name: impl Into<String>) {
        self.identities.write().unwrap().insert(
            username,
            VerifiedIdentity {
                legal_name: legal_name.into(),
            },
        );
    }

    /// Removes a user's verified identity.
    pub fn revoke(&self, username: &Username) {
        self.identities.write().unwrap().remove(username);
    }
}

#[async_trait]
impl IdentityVerifier for InMemoryIdentityVerifier {
    async fn verified_identity(
        &self,
        username: &Username,
    ) -> Result<Option<VerifiedIdentity>, MarketError> {
        Ok(self.identities.read().unwrap().get(username).cloned())
    }
}
