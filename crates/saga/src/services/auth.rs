//! Caller identity resolution.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::Username;

use crate::error::MarketError;

/// Resolves an opaque caller credential to a canonical username.
///
/// Implementations fail closed: an unknown credential or a disabled
/// account resolves to `None`, never to a guess.
#[async_trait]
pub trait AuthResolver: Send + Sync {
    /// Resolves a bearer credential. `None` means the caller could not be
    /// identified or the account is disabled.
    async fn resolve(&self, credential: &str) -> Result<Option<Username>, MarketError>;
}

#[derive(Debug, Default)]
struct InMemoryAuthState {
    tokens: HashMap<String, Username>,
    disabled: HashSet<Username>,
}

/// In-memory credential resolver for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAuthResolver {
    state: Arc<RwLock<InMemoryAuthState>>,
}

impl InMemoryAuthResolver {
    /// Creates a new in-memory resolver with no registered credentials.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a credential for a username.
    pub fn register(&self, credential: impl Into<String>, username: Username) {
        self.state
            .write()
            .unwrap()
            .tokens
            .insert(credential.into(), username);
    }

    /// Marks an account disabled or re-enabled.
    pub fn set_disabled(&self, username: Username, disabled: bool) {
        let mut state = self.state.write().unwrap();
        if disabled {
            state.disabled.insert(username);
        } else {
            state.disabled.remove(&username);
        }
    }
}

#[async_trait]
impl AuthResolver for InMemoryAuthResolver {
    async fn resolve(&self, credential: &str) -> Result<Option<Username>, MarketError> {
        let state = self.state.read().unwrap();
        Ok(state
            .tokens
            .get(credential)
            .filter(|username| !state.disabled.contains(username))
            .cloned())
    }
}
