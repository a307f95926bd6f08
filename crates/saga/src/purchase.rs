//! Trade purchase saga: buy a priced collectible from its creator.
//!
//! Validation is strictly sequential and fails fast without writing
//! anything. The mutation phase runs as an ordered step list; every
//! completed step records its compensation, and a failing step rolls the
//! attempt back in reverse order. The stock and balance counters are
//! mutated through conditional increments, so the availability check and
//! the write are one atomic operation each.

use chrono::Utc;
use common::Username;
use doc_store::{DocPath, DocStoreError, DocumentStore, DocumentStoreExt};
use domain::{
    CollectibleKind, CollectorRecord, LedgerDirection, Money, PaymentIntentEntry, Receipt,
    TradeLedgerEntry, paths, schemas::fields,
};

use crate::compensation::SagaExecution;
use crate::coordinator::{MarketCoordinator, PurchaseOutcome};
use crate::error::{MarketError, Result};
use crate::services::{AuthResolver, IdentityVerifier, NotificationEvent, NotificationService};

const SAGA_TYPE: &str = "purchase";

const STEP_DECREMENT_STOCK: &str = "decrement_stock";
const STEP_DEBIT_BUYER: &str = "debit_buyer";
const STEP_CREDIT_SELLER: &str = "credit_seller";
const STEP_PURCHASE_INTENT: &str = "purchase_intent";
const STEP_SALE_INTENT: &str = "sale_intent";
const STEP_BOUGHT_LEDGER: &str = "bought_ledger";
const STEP_SOLD_LEDGER: &str = "sold_ledger";
const STEP_COLLECTOR_RECORD: &str = "collector_record";
const STEP_WRITE_RECEIPT: &str = "write_receipt";
const STEP_COUNT_COLLECTIBLE: &str = "count_collectible";

/// Facts established by the validation phase.
struct PurchaseChecks {
    collectible_path: DocPath,
    seller: Username,
    price: Money,
    buyer_legal_name: Option<String>,
}

impl<S, A, V, N> MarketCoordinator<S, A, V, N>
where
    S: DocumentStore + Clone + 'static,
    A: AuthResolver,
    V: IdentityVerifier,
    N: NotificationService,
{
    /// Executes a trade purchase of the collectible attached to a post.
    ///
    /// With `require_receipt` the purchase is identity-gated: both
    /// parties must hold verified-identity records and a receipt is
    /// written to the global receipts collection.
    #[tracing::instrument(skip(self, credential), fields(saga_type = "Purchase"))]
    pub async fn purchase_collectible(
        &self,
        credential: &str,
        post_path: DocPath,
        require_receipt: bool,
    ) -> Result<PurchaseOutcome> {
        let saga_start = std::time::Instant::now();
        let buyer = self.resolve_caller(credential).await?;

        // One key per post serializes every purchase attempt on this
        // collectible, whichever buyer makes it.
        let key = format!("purchase-{post_path}");
        let outcome = self
            .locks
            .run(&key, self.purchase_locked(buyer, &post_path, require_receipt))
            .await;

        metrics::histogram!("saga_duration_seconds", "saga" => SAGA_TYPE)
            .record(saga_start.elapsed().as_secs_f64());
        outcome
    }

    async fn purchase_locked(
        &self,
        buyer: Username,
        post_path: &DocPath,
        require_receipt: bool,
    ) -> Result<PurchaseOutcome> {
        let mut exec = SagaExecution::new(SAGA_TYPE);

        let checks = match self
            .validate_purchase(&buyer, post_path, require_receipt)
            .await
        {
            Ok(checks) => checks,
            Err(err) => return Err(exec.fail(err).await),
        };
        let PurchaseChecks {
            collectible_path,
            seller,
            price,
            buyer_legal_name,
        } = checks;

        // All documents written by this attempt share one timestamp.
        let now = Utc::now();
        exec.begin_mutation();

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

        let buyer_wallet = paths::wallet_doc(&buyer);
        match self
            .store
            .increment_checked(&buyer_wallet, fields::BALANCE, -price.cents(), 0)
            .await
        {
            Ok(_) => {}
            Err(DocStoreError::PreconditionFailed { current, .. }) => {
                return Err(exec
                    .fail(MarketError::InsufficientFunds {
                        required: price,
                        available: Money::from_cents(current),
                    })
                    .await);
            }
            Err(err) => return Err(exec.step_failed(STEP_DEBIT_BUYER, err.into()).await),
        }
        {
            let store = self.store.clone();
            let path = buyer_wallet.clone();
            exec.record_undo(STEP_DEBIT_BUYER, move || async move {
                store
                    .increment(&path, fields::BALANCE, price.cents())
                    .await
                    .map(drop)
                    .map_err(MarketError::from)
            });
        }

        let seller_wallet = paths::wallet_doc(&seller);
        if let Err(err) = self
            .store
            .increment(&seller_wallet, fields::BALANCE, price.cents())
            .await
        {
            return Err(exec.step_failed(STEP_CREDIT_SELLER, err.into()).await);
        }
        {
            let store = self.store.clone();
            let path = seller_wallet.clone();
            exec.record_undo(STEP_CREDIT_SELLER, move || async move {
                store
                    .increment(&path, fields::BALANCE, -price.cents())
                    .await
                    .map(drop)
                    .map_err(MarketError::from)
            });
        }

        let purchase_intent_path =
            paths::payment_intent_doc(&buyer, &PaymentIntentEntry::key(&now, &seller));
        let purchase_intent = PaymentIntentEntry {
            counterparty: seller.clone(),
            amount: price,
            direction: LedgerDirection::Purchase,
            timestamp: now,
        };
        if let Err(err) = self.store.set_doc(&purchase_intent_path, &purchase_intent).await {
            return Err(exec.step_failed(STEP_PURCHASE_INTENT, err.into()).await);
        }
        {
            let store = self.store.clone();
            let path = purchase_intent_path.clone();
            exec.record_undo(STEP_PURCHASE_INTENT, move || async move {
                store.delete(&path).await.map_err(MarketError::from)
            });
        }

        let sale_intent_path =
            paths::payment_intent_doc(&seller, &PaymentIntentEntry::key(&now, &buyer));
        let sale_intent = PaymentIntentEntry {
            counterparty: buyer.clone(),
            amount: price,
            direction: LedgerDirection::Sale,
            timestamp: now,
        };
        if let Err(err) = self.store.set_doc(&sale_intent_path, &sale_intent).await {
            return Err(exec.step_failed(STEP_SALE_INTENT, err.into()).await);
        }
        {
            let store = self.store.clone();
            let path = sale_intent_path.clone();
            exec.record_undo(STEP_SALE_INTENT, move || async move {
                store.delete(&path).await.map_err(MarketError::from)
            });
        }

        let ledger_entry = TradeLedgerEntry {
            post_path: post_path.clone(),
            collectible_path: collectible_path.clone(),
            timestamp: now,
        };
        let bought_path = match self
            .store
            .add_doc(&paths::bought_ledger(&buyer), &ledger_entry)
            .await
        {
            Ok(path) => path,
            Err(err) => return Err(exec.step_failed(STEP_BOUGHT_LEDGER, err.into()).await),
        };
        {
            let store = self.store.clone();
            let path = bought_path;
            exec.record_undo(STEP_BOUGHT_LEDGER, move || async move {
                store.delete(&path).await.map_err(MarketError::from)
            });
        }

        let sold_path = match self
            .store
            .add_doc(&paths::sold_ledger(&seller), &ledger_entry)
            .await
        {
            Ok(path) => path,
            Err(err) => return Err(exec.step_failed(STEP_SOLD_LEDGER, err.into()).await),
        };
        {
            let store = self.store.clone();
            let path = sold_path;
            exec.record_undo(STEP_SOLD_LEDGER, move || async move {
                store.delete(&path).await.map_err(MarketError::from)
            });
        }

        let collector_path = paths::collector_doc(&collectible_path, &buyer);
        let collector = CollectorRecord {
            username: buyer.clone(),
            collected_at: now,
        };
        if let Err(err) = self.store.set_doc(&collector_path, &collector).await {
            return Err(exec.step_failed(STEP_COLLECTOR_RECORD, err.into()).await);
        }
        {
            let store = self.store.clone();
            let path = collector_path.clone();
            exec.record_undo(STEP_COLLECTOR_RECORD, move || async move {
                store.delete(&path).await.map_err(MarketError::from)
            });
        }

        let receipt_path = if require_receipt {
            // The seller's identity is checked again at write time; losing
            // it mid-flight fails the whole attempt post-hoc.
            let seller_identity = match self.identity.verified_identity(&seller).await {
                Ok(Some(identity)) => identity,
                Ok(None) => {
                    return Err(exec
                        .step_failed(
                            STEP_WRITE_RECEIPT,
                            MarketError::UnverifiedIdentity(seller.clone()),
                        )
                        .await);
                }
                Err(err) => return Err(exec.step_failed(STEP_WRITE_RECEIPT, err).await),
            };
            let receipt = Receipt {
                buyer: buyer.clone(),
                buyer_legal_name: buyer_legal_name.unwrap_or_default(),
                seller: seller.clone(),
                seller_legal_name: seller_identity.legal_name,
                amount: price,
                collectible_path: collectible_path.clone(),
                timestamp: now,
            };
            let receipt_path = match self.store.add_doc(&paths::receipts(), &receipt).await {
                Ok(path) => path,
                Err(err) => return Err(exec.step_failed(STEP_WRITE_RECEIPT, err.into()).await),
            };
            {
                let store = self.store.clone();
                let path = receipt_path.clone();
                exec.record_undo(STEP_WRITE_RECEIPT, move || async move {
                    store.delete(&path).await.map_err(MarketError::from)
                });
            }
            Some(receipt_path)
        } else {
            None
        };

        if let Err(err) = self
            .store
            .increment(&paths::user_doc(&buyer), fields::COLLECTIBLE_COUNT, 1)
            .await
        {
            return Err(exec.step_failed(STEP_COUNT_COLLECTIBLE, err.into()).await);
        }

        exec.commit();

        let event = NotificationEvent::new("collectible-sold", buyer, seller, now)
            .with_param("postPath", post_path.to_string())
            .with_param("amount", price.to_string());
        if require_receipt {
            // Dispatch is mandatory in the receipt-gated flow even though
            // the financial transaction has already committed.
            self.notifier.send(event).await?;
        } else {
            self.notify_best_effort(event).await;
        }

        Ok(PurchaseOutcome {
            collectible_path,
            price,
            remaining_stock: remaining as u32,
            receipt_path,
            timestamp: now,
        })
    }

    /// Sequential fail-fast checks; nothing is written here.
    async fn validate_purchase(
        &self,
        buyer: &Username,
        post_path: &DocPath,
        require_receipt: bool,
    ) -> Result<PurchaseChecks> {
        let post = self.load_post(post_path).await?;
        if post.author == *buyer {
            return Err(MarketError::SelfPurchase);
        }

        let collectible_path = Self::referenced_collectible(&post)?;
        let collectible = self.load_collectible(&collectible_path).await?;
        Self::ensure_kind(&collectible, CollectibleKind::Trade)?;

        if collectible.stock.is_exhausted() {
            return Err(MarketError::OutOfStock);
        }
        self.ensure_not_collected(&collectible_path, buyer).await?;

        let price = collectible
            .price
            .ok_or(MarketError::Domain(domain::DomainError::PriceRequired))?;

        // Pre-check only; the debit itself re-checks atomically.
        let available = self
            .store
            .get_as::<domain::Wallet>(&paths::wallet_doc(buyer))
            .await?
            .map(|wallet| wallet.balance)
            .unwrap_or(Money::zero());
        if available < price {
            return Err(MarketError::InsufficientFunds {
                required: price,
                available,
            });
        }

        let buyer_legal_name = if require_receipt {
            let identity = self
                .identity
                .verified_identity(buyer)
                .await?
                .ok_or_else(|| MarketError::UnverifiedIdentity(buyer.clone()))?;
            Some(identity.legal_name)
        } else {
            None
        };

        Ok(PurchaseChecks {
            collectible_path,
            seller: collectible.creator,
            price,
            buyer_legal_name,
        })
    }
}
