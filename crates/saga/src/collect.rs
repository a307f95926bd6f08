//! Event-code redemption saga: collect a free collectible by consuming a
//! single-use code.
//!
//! Consuming the code is the first forward step, so its undo runs last
//! during rollback; a failed redemption always returns the code to
//! availability after the other compensations have run.

use chrono::Utc;
use common::Username;
use doc_store::{DocStoreError, DocumentStore, DocumentStoreExt, FieldOp};
use domain::{
    CollectedEntry, CollectibleKind, CollectorRecord, RedemptionCode, TradeLedgerEntry, paths,
    schemas::fields,
};
use serde_json::Value;

use crate::compensation::SagaExecution;
use crate::coordinator::{CollectOutcome, MarketCoordinator};
use crate::error::{MarketError, Result};
use crate::services::{AuthResolver, IdentityVerifier, NotificationEvent, NotificationService};

const SAGA_TYPE: &str = "collect";

const STEP_CONSUME_CODE: &str = "consume_code";
const STEP_DECREMENT_STOCK: &str = "decrement_stock";
const STEP_COLLECTOR_RECORD: &str = "collector_record";
const STEP_COLLECTED_LEDGER: &str = "collected_ledger";
const STEP_COLLECTED_GLOBAL: &str = "collected_global";
const STEP_COUNT_COLLECTIBLE: &str = "count_collectible";

impl<S, A, V, N> MarketCoordinator<S, A, V, N>
where
    S: DocumentStore + Clone + 'static,
    A: AuthResolver,
    V: IdentityVerifier,
    N: NotificationService,
{
    /// Redeems a single-use event code for the collectible it references.
    #[tracing::instrument(skip(self, credential), fields(saga_type = "Collect"))]
    pub async fn collect_collectible(
        &self,
        credential: &str,
        code: &str,
    ) -> Result<CollectOutcome> {
        let saga_start = std::time::Instant::now();
        let collector = self.resolve_caller(credential).await?;

        if code.is_empty() || code.contains('/') {
            return Err(MarketError::InvalidRequest(
                "malformed redemption code".to_string(),
            ));
        }

        let key = format!("redeem-{code}");
        let outcome = self
            .locks
            .run(&key, self.collect_locked(collector, code))
            .await;

        metrics::histogram!("saga_duration_seconds", "saga" => SAGA_TYPE)
            .record(saga_start.elapsed().as_secs_f64());
        outcome
    }

    async fn collect_locked(&self, collector: Username, code: &str) -> Result<CollectOutcome> {
        let mut exec = SagaExecution::new(SAGA_TYPE);

        let code_path = paths::code_doc(code);
        let token = match self.store.get_as::<RedemptionCode>(&code_path).await {
            Ok(Some(token)) => token,
            Ok(None) => return Err(exec.fail(MarketError::InvalidCode).await),
            Err(err) => return Err(exec.fail(err.into()).await),
        };
        if token.is_consumed {
            return Err(exec.fail(MarketError::CodeUsed).await);
        }

        // Consume the code before anything else; the per-code lock makes
        // the consumed check and this write one critical section.
        let now = Utc::now();
        exec.begin_mutation();

        let consume_ops = vec![
            FieldOp::set(fields::IS_CONSUMED, Value::Bool(true)),
            FieldOp::set(fields::CONSUMED_TIME, serde_json::to_value(now)?),
            FieldOp::set(fields::CONSUMER, Value::String(collector.to_string())),
        ];
        if let Err(err) = self.store.update(&code_path, consume_ops).await {
            return Err(exec.step_failed(STEP_CONSUME_CODE, err.into()).await);
        }
        {
            let store = self.store.clone();
            let path = code_path.clone();
            exec.record_undo(STEP_CONSUME_CODE, move || async move {
                store
                    .update(
                        &path,
                        vec![
                            FieldOp::set(fields::IS_CONSUMED, Value::Bool(false)),
                            FieldOp::set(fields::CONSUMED_TIME, Value::Null),
                            FieldOp::set(fields::CONSUMER, Value::Null),
                        ],
                    )
                    .await
                    .map_err(MarketError::from)
            });
        }

        // Shared validation pipeline; any failure here rolls the
        // consumption back.
        let post = match self.load_post(&token.post_path).await {
            Ok(post) => post,
            Err(err) => return Err(exec.fail(err).await),
        };
        if post.author == collector {
            return Err(exec.fail(MarketError::SelfPurchase).await);
        }

        let collectible_path = match Self::referenced_collectible(&post) {
            Ok(path) => path,
            Err(err) => return Err(exec.fail(err).await),
        };
        let collectible = match self.load_collectible(&collectible_path).await {
            Ok(collectible) => collectible,
            Err(err) => return Err(exec.fail(err).await),
        };
        if let Err(err) = Self::ensure_kind(&collectible, CollectibleKind::Event) {
            return Err(exec.fail(err).await);
        }
        if collectible.stock.is_exhausted() {
            return Err(exec.fail(MarketError::OutOfStock).await);
        }
        if let Err(err) = self.ensure_not_collected(&collectible_path, &collector).await {
            return Err(exec.fail(err).await);
        }

        let remaining = match self
            .store
            .increment_checked(&collectible_path, fields::STOCK_REMAINING, -1, 0)
            .await
        {
            Ok(remaining) => remaining,
            Err(DocStoreError::PreconditionFailed { .. }) => {
                return Err(exec.fail(MarketError::OutOfStock).await);
            }
            Err(err) => return Err(exec.step_failed(STEP_DECREMENT_STOCK, err.into()).await),
        };
        {
            let store = self.store.clone();
            let path = collectible_path.clone();
            exec.record_undo(STEP_DECREMENT_STOCK, move || async move {
                store
                    .increment(&path, fields::STOCK_REMAINING, 1)
                    .await
                    .map(drop)
                    .map_err(MarketError::from)
            });
        }

        let collector_path = paths::collector_doc(&collectible_path, &collector);
        let collector_record = CollectorRecord {
            username: collector.clone(),
            collected_at: now,
        };
        if let Err(err) = self.store.set_doc(&collector_path, &collector_record).await {
            return Err(exec.step_failed(STEP_COLLECTOR_RECORD, err.into()).await);
        }
        {
            let store = self.store.clone();
            let path = collector_path.clone();
            exec.record_undo(STEP_COLLECTOR_RECORD, move || async move {
                store.delete(&path).await.map_err(MarketError::from)
            });
        }

        let ledger_entry = TradeLedgerEntry {
            post_path: token.post_path.clone(),
            collectible_path: collectible_path.clone(),
            timestamp: now,
        };
        let ledger_path = match self
            .store
            .add_doc(&paths::collected_ledger(&collector), &ledger_entry)
            .await
        {
            Ok(path) => path,
            Err(err) => return Err(exec.step_failed(STEP_COLLECTED_LEDGER, err.into()).await),
        };
        {
            let store = self.store.clone();
            let path = ledger_path;
            exec.record_undo(STEP_COLLECTED_LEDGER, move || async move {
                store.delete(&path).await.map_err(MarketError::from)
            });
        }

        // remaining is the value after our decrement, so the first
        // redeemed unit gets rank 1.
        let rank = (i64::from(collectible.stock.initial) - remaining) as u32;
        let collected = CollectedEntry {
            collectible_path: collectible_path.clone(),
            collector: collector.clone(),
            rank,
            timestamp: now,
        };
        let collected_path = match self
            .store
            .add_doc(&paths::collected_collectibles(), &collected)
            .await
        {
            Ok(path) => path,
            Err(err) => return Err(exec.step_failed(STEP_COLLECTED_GLOBAL, err.into()).await),
        };
        {
            let store = self.store.clone();
            let path = collected_path;
            exec.record_undo(STEP_COLLECTED_GLOBAL, move || async move {
                store.delete(&path).await.map_err(MarketError::from)
            });
        }

        if let Err(err) = self
            .store
            .increment(&paths::user_doc(&collector), fields::COLLECTIBLE_COUNT, 1)
            .await
        {
            return Err(exec.step_failed(STEP_COUNT_COLLECTIBLE, err.into()).await);
        }

        exec.commit();

        let event = NotificationEvent::new(
            "collectible-collected",
            collector,
            token.creator.clone(),
            now,
        )
        .with_param("postPath", token.post_path.to_string())
        .with_param("rank", rank.to_string());
        self.notify_best_effort(event).await;

        Ok(CollectOutcome {
            collectible_path,
            rank,
            timestamp: now,
        })
    }
}
