//! Coordinator owning the store, collaborator services, and resource locks.

use chrono::{DateTime, Utc};
use common::Username;
use doc_store::{DocPath, DocStoreError, DocumentStore, DocumentStoreExt};
use domain::{Collectible, CollectibleKind, MarketConfig, Money, Post, paths};

use crate::error::{MarketError, Result};
use crate::lock::KeyedMutex;
use crate::services::{AuthResolver, IdentityVerifier, NotificationEvent, NotificationService};

/// Orchestrates the marketplace transaction sagas.
///
/// Holds the document store, the external collaborators, and the keyed
/// mutex serializing attempts that contend on one resource. Constructed
/// once per process and shared behind the HTTP handlers.
pub struct MarketCoordinator<S, A, V, N>
where
    S: DocumentStore,
    A: AuthResolver,
    V: IdentityVerifier,
    N: NotificationService,
{
    pub(crate) store: S,
    pub(crate) auth: A,
    pub(crate) identity: V,
    pub(crate) notifier: N,
    pub(crate) locks: KeyedMutex,
}

/// Result of a committed trade purchase.
#[derive(Debug, Clone)]
pub struct PurchaseOutcome {
    pub collectible_path: DocPath,
    pub price: Money,
    pub remaining_stock: u32,
    pub receipt_path: Option<DocPath>,
    pub timestamp: DateTime<Utc>,
}

/// Result of a committed event-code collection.
#[derive(Debug, Clone)]
pub struct CollectOutcome {
    pub collectible_path: DocPath,
    /// Claim-order rank: 1 for the first redeemed unit.
    pub rank: u32,
    pub timestamp: DateTime<Utc>,
}

/// Parameters for creating a collectible on a post.
#[derive(Debug, Clone)]
pub struct CreateCollectibleRequest {
    pub post_path: DocPath,
    pub kind: CollectibleKind,
    pub stock: u32,
    /// Required for trade collectibles, absent for event collectibles.
    pub price: Option<Money>,
}

/// Result of a committed collectible creation.
#[derive(Debug, Clone)]
pub struct CreateOutcome {
    pub collectible_path: DocPath,
    /// Generated single-use codes (event collectibles only).
    pub codes: Vec<String>,
}

impl<S, A, V, N> MarketCoordinator<S, A, V, N>
where
    S: DocumentStore + Clone + 'static,
    A: AuthResolver,
    V: IdentityVerifier,
    N: NotificationService,
{
    /// Creates a coordinator with the default lock acquisition deadline.
    pub fn new(store: S, auth: A, identity: V, notifier: N) -> Self {
        Self::with_locks(store, auth, identity, notifier, KeyedMutex::new())
    }

    /// Creates a coordinator with an injected keyed mutex.
    pub fn with_locks(store: S, auth: A, identity: V, notifier: N, locks: KeyedMutex) -> Self {
        Self {
            store,
            auth,
            identity,
            notifier,
            locks,
        }
    }

    /// Resolves the bearer credential to a username, failing closed.
    pub(crate) async fn resolve_caller(&self, credential: &str) -> Result<Username> {
        match self.auth.resolve(credential).await {
            Ok(Some(username)) => Ok(username),
            Ok(None) => Err(MarketError::Unauthorized),
            Err(err) => {
                tracing::warn!(error = %err, "credential resolution failed");
                Err(MarketError::Unauthorized)
            }
        }
    }

    pub(crate) async fn load_post(&self, path: &DocPath) -> Result<Post> {
        self.store
            .get_as::<Post>(path)
            .await?
            .ok_or_else(|| MarketError::PostNotFound(path.to_string()))
    }

    /// Resolves the collectible path a post references, rejecting posts
    /// that are not flagged as collectibles.
    pub(crate) fn referenced_collectible(post: &Post) -> Result<DocPath> {
        post.collectible_path()?
            .cloned()
            .ok_or(MarketError::NotCollectible)
    }

    /// Loads a collectible a post points at. A dangling reference is a
    /// data inconsistency, not a client error.
    pub(crate) async fn load_collectible(&self, path: &DocPath) -> Result<Collectible> {
        let collectible: Collectible = self
            .store
            .get_as(path)
            .await?
            .ok_or_else(|| MarketError::Store(DocStoreError::NotFound(path.clone())))?;
        collectible.validate()?;
        Ok(collectible)
    }

    pub(crate) fn ensure_kind(collectible: &Collectible, expected: CollectibleKind) -> Result<()> {
        if collectible.kind != expected {
            return Err(MarketError::WrongKind {
                expected,
                actual: collectible.kind,
            });
        }
        Ok(())
    }

    /// Single-acquisition guard: the collector record for this caller
    /// must not exist yet.
    pub(crate) async fn ensure_not_collected(
        &self,
        collectible_path: &DocPath,
        username: &Username,
    ) -> Result<()> {
        let collector = paths::collector_doc(collectible_path, username);
        if self.store.get(&collector).await?.is_some() {
            return Err(MarketError::AlreadyCollected);
        }
        Ok(())
    }

    pub(crate) async fn load_market_config(&self) -> Result<MarketConfig> {
        Ok(self
            .store
            .get_as(&paths::market_config())
            .await?
            .unwrap_or_default())
    }

    /// Fire-and-forget notification: a dispatch failure is logged and
    /// does not affect the committed saga.
    pub(crate) async fn notify_best_effort(&self, event: NotificationEvent) {
        let kind = event.kind.clone();
        if let Err(err) = self.notifier.send(event).await {
            tracing::warn!(kind, error = %err, "notification dispatch failed");
        }
    }
}
