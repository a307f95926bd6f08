//! Collectible creation saga: attach a trade or event collectible to a
//! post, minting single-use codes for the event variant.

use chrono::Utc;
use common::Username;
use doc_store::{DocumentStore, DocumentStoreExt, FieldOp};
use domain::{
    Collectible, CollectibleKind, CollectibleRef, RedemptionCode, Stock, TradeLedgerEntry,
    UserProfile, paths, schemas::fields,
};
use uuid::Uuid;

use crate::compensation::SagaExecution;
use crate::coordinator::{CreateCollectibleRequest, CreateOutcome, MarketCoordinator};
use crate::error::{MarketError, Result};
use crate::services::{AuthResolver, IdentityVerifier, NotificationService};

const SAGA_TYPE: &str = "create";

const STEP_CREATE_COLLECTIBLE: &str = "create_collectible";
const STEP_FLAG_POST: &str = "flag_post";
const STEP_CREATED_LEDGER: &str = "created_ledger";
const STEP_MINT_CODE: &str = "mint_code";

impl<S, A, V, N> MarketCoordinator<S, A, V, N>
where
    S: DocumentStore + Clone + 'static,
    A: AuthResolver,
    V: IdentityVerifier,
    N: NotificationService,
{
    /// Creates a collectible on a post the caller owns.
    #[tracing::instrument(skip(self, credential), fields(saga_type = "Create"))]
    pub async fn create_collectible(
        &self,
        credential: &str,
        request: CreateCollectibleRequest,
    ) -> Result<CreateOutcome> {
        let saga_start = std::time::Instant::now();
        let creator = self.resolve_caller(credential).await?;

        let key = format!("create-{}", request.post_path);
        let outcome = self
            .locks
            .run(&key, self.create_locked(creator, &request))
            .await;

        metrics::histogram!("saga_duration_seconds", "saga" => SAGA_TYPE)
            .record(saga_start.elapsed().as_secs_f64());
        outcome
    }

    async fn create_locked(
        &self,
        creator: Username,
        request: &CreateCollectibleRequest,
    ) -> Result<CreateOutcome> {
        let mut exec = SagaExecution::new(SAGA_TYPE);

        let price = match self.validate_create(&creator, request).await {
            Ok(price) => price,
            Err(err) => return Err(exec.fail(err).await),
        };

        let now = Utc::now();
        exec.begin_mutation();

        let id = Uuid::new_v4().simple().to_string();
        let collectible_path = paths::collectible_doc(&id);
        let collectible = match request.kind {
            CollectibleKind::Trade => Collectible::trade(
                id,
                creator.clone(),
                request.post_path.clone(),
                price.unwrap_or_default(),
                Stock::new(request.stock),
                now,
            ),
            CollectibleKind::Event => Collectible::event(
                id,
                creator.clone(),
                request.post_path.clone(),
                Stock::new(request.stock),
                now,
            ),
        };
        if let Err(err) = self.store.set_doc(&collectible_path, &collectible).await {
            return Err(exec.step_failed(STEP_CREATE_COLLECTIBLE, err.into()).await);
        }
        {
            let store = self.store.clone();
            let path = collectible_path.clone();
            exec.record_undo(STEP_CREATE_COLLECTIBLE, move || async move {
                store.delete(&path).await.map_err(MarketError::from)
            });
        }

        let flagged = serde_json::to_value(CollectibleRef::to(collectible_path.clone()))?;
        if let Err(err) = self
            .store
            .update(&request.post_path, vec![FieldOp::set(fields::COLLECTIBLE, flagged)])
            .await
        {
            return Err(exec.step_failed(STEP_FLAG_POST, err.into()).await);
        }
        {
            let store = self.store.clone();
            let path = request.post_path.clone();
            exec.record_undo(STEP_FLAG_POST, move || async move {
                let cleared = serde_json::to_value(CollectibleRef::none())?;
                store
                    .update(&path, vec![FieldOp::set(fields::COLLECTIBLE, cleared)])
                    .await
                    .map_err(MarketError::from)
            });
        }

        let ledger_entry = TradeLedgerEntry {
            post_path: request.post_path.clone(),
            collectible_path: collectible_path.clone(),
            timestamp: now,
        };
        let ledger_path = match self
            .store
            .add_doc(&paths::created_ledger(&creator), &ledger_entry)
            .await
        {
            Ok(path) => path,
            Err(err) => return Err(exec.step_failed(STEP_CREATED_LEDGER, err.into()).await),
        };
        {
            let store = self.store.clone();
            let path = ledger_path;
            exec.record_undo(STEP_CREATED_LEDGER, move || async move {
                store.delete(&path).await.map_err(MarketError::from)
            });
        }

        // Event collectibles mint exactly one single-use code per unit.
        let mut codes = Vec::new();
        if request.kind == CollectibleKind::Event {
            for _ in 0..request.stock {
                let code = Uuid::new_v4().simple().to_string();
                let code_path = paths::code_doc(&code);
                let token = RedemptionCode::fresh(
                    code.clone(),
                    collectible_path.clone(),
                    request.post_path.clone(),
                    creator.clone(),
                );
                if let Err(err) = self.store.set_doc(&code_path, &token).await {
                    return Err(exec.step_failed(STEP_MINT_CODE, err.into()).await);
                }
                {
                    let store = self.store.clone();
                    exec.record_undo(STEP_MINT_CODE, move || async move {
                        store.delete(&code_path).await.map_err(MarketError::from)
                    });
                }
                codes.push(code);
            }
        }

        exec.commit();

        Ok(CreateOutcome {
            collectible_path,
            codes,
        })
    }

    /// Sequential fail-fast checks; returns the validated price for the
    /// trade variant.
    async fn validate_create(
        &self,
        creator: &Username,
        request: &CreateCollectibleRequest,
    ) -> Result<Option<domain::Money>> {
        if request.stock == 0 {
            return Err(MarketError::InvalidRequest(
                "stock must be at least 1".to_string(),
            ));
        }

        let post = self.load_post(&request.post_path).await?;
        if post.author != *creator {
            return Err(MarketError::NotPostOwner);
        }
        if post.collectible_path()?.is_some() {
            return Err(MarketError::AlreadyCollectible);
        }

        let config = self.load_market_config().await?;
        if request.stock > config.max_stock {
            return Err(MarketError::StockLimitExceeded {
                requested: request.stock,
                limit: config.max_stock,
            });
        }

        match request.kind {
            CollectibleKind::Trade => {
                // Only verified creators may sell.
                let verified = self
                    .store
                    .get_as::<UserProfile>(&paths::user_doc(creator))
                    .await?
                    .map(|profile| profile.verified)
                    .unwrap_or(false);
                if !verified {
                    return Err(MarketError::CreatorNotVerified);
                }

                let price = request.price.ok_or_else(|| {
                    MarketError::InvalidRequest("trade collectible requires a price".to_string())
                })?;
                if !price.is_positive() || !price.is_whole_dollars() || !config.allows_price(price)
                {
                    return Err(MarketError::PriceNotAllowed(price));
                }
                Ok(Some(price))
            }
            CollectibleKind::Event => {
                if request.price.is_some() {
                    return Err(MarketError::InvalidRequest(
                        "event collectible carries no price".to_string(),
                    ));
                }
                Ok(None)
            }
        }
    }
}
