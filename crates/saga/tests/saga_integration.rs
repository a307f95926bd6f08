//! End-to-end saga tests over the in-memory document store.

use std::sync::Arc;

use chrono::Utc;
use common::Username;
use doc_store::{DocPath, DocumentStore, DocumentStoreExt, InMemoryDocumentStore};
use domain::{
    CollectedEntry, Collectible, CollectibleKind, CollectibleRef, MarketConfig, Money, Post,
    RedemptionCode, Stock, UserProfile, Wallet, paths,
};
use saga::{
    CreateCollectibleRequest, InMemoryAuthResolver, InMemoryIdentityVerifier,
    InMemoryNotificationService, MarketCoordinator, MarketError,
};

type Coordinator = MarketCoordinator<
    InMemoryDocumentStore,
    InMemoryAuthResolver,
    InMemoryIdentityVerifier,
    InMemoryNotificationService,
>;

struct Harness {
    store: InMemoryDocumentStore,
    auth: InMemoryAuthResolver,
    identity: InMemoryIdentityVerifier,
    notifier: InMemoryNotificationService,
    coordinator: Arc<Coordinator>,
}

fn setup() -> Harness {
    let store = InMemoryDocumentStore::new();
    let auth = InMemoryAuthResolver::new();
    let identity = InMemoryIdentityVerifier::new();
    let notifier = InMemoryNotificationService::new();
    let coordinator = Arc::new(MarketCoordinator::new(
        store.clone(),
        auth.clone(),
        identity.clone(),
        notifier.clone(),
    ));
    Harness {
        store,
        auth,
        identity,
        notifier,
        coordinator,
    }
}

fn token(name: &str) -> String {
    format!("token-{name}")
}

impl Harness {
    /// Registers a user with a profile, credential, and funded wallet.
    async fn seed_user(&self, name: &str, balance: Money) -> Username {
        let username = Username::new(name);
        self.auth.register(token(name), username.clone());
        self.store
            .set_doc(
                &paths::user_doc(&username),
                &UserProfile {
                    username: username.clone(),
                    display_name: name.to_string(),
                    verified: true,
                    disabled: false,
                    collectible_count: 0,
                },
            )
            .await
            .unwrap();
        self.store
            .set_doc(&paths::wallet_doc(&username), &Wallet { balance })
            .await
            .unwrap();
        username
    }

    /// Writes a post with a linked trade collectible directly into the
    /// store and returns the post path.
    async fn seed_trade_listing(
        &self,
        seller: &Username,
        post_id: &str,
        price: Money,
        stock: u32,
    ) -> DocPath {
        let post_path = paths::posts().doc(post_id);
        let collectible_id = format!("c-{post_id}");
        let collectible_path = paths::collectible_doc(&collectible_id);

        self.store
            .set_doc(
                &collectible_path,
                &Collectible::trade(
                    collectible_id,
                    seller.clone(),
                    post_path.clone(),
                    price,
                    Stock::new(stock),
                    Utc::now(),
                ),
            )
            .await
            .unwrap();
        self.store
            .set_doc(
                &post_path,
                &Post {
                    author: seller.clone(),
                    caption: format!("listing {post_id}"),
                    collectible: CollectibleRef::to(collectible_path),
                    created_at: Utc::now(),
                },
            )
            .await
            .unwrap();
        post_path
    }

    /// Creates an event collectible through the creation saga and
    /// returns the post path plus the minted codes.
    async fn seed_event_listing(
        &self,
        creator: &Username,
        post_id: &str,
        stock: u32,
    ) -> (DocPath, Vec<String>) {
        let post_path = paths::posts().doc(post_id);
        self.store
            .set_doc(
                &post_path,
                &Post {
                    author: creator.clone(),
                    caption: format!("event {post_id}"),
                    collectible: CollectibleRef::none(),
                    created_at: Utc::now(),
                },
            )
            .await
            .unwrap();

        let outcome = self
            .coordinator
            .create_collectible(
                &token(creator.as_str()),
                CreateCollectibleRequest {
                    post_path: post_path.clone(),
                    kind: CollectibleKind::Event,
                    stock,
                    price: None,
                },
            )
            .await
            .unwrap();
        (post_path, outcome.codes)
    }

    async fn balance(&self, username: &Username) -> Money {
        self.store
            .get_as::<Wallet>(&paths::wallet_doc(username))
            .await
            .unwrap()
            .unwrap()
            .balance
    }

    async fn remaining_stock(&self, post_id: &str) -> u32 {
        let collectible: Collectible = self
            .store
            .get_as(&paths::collectible_doc(&format!("c-{post_id}")))
            .await
            .unwrap()
            .unwrap();
        collectible.stock.remaining
    }
}

#[tokio::test]
async fn successful_purchase_moves_money_stock_and_ledgers() {
    let h = setup();
    let alice = h.seed_user("alice", Money::zero()).await;
    let bob = h.seed_user("bob", Money::from_dollars(100)).await;
    let post = h
        .seed_trade_listing(&alice, "p1", Money::from_dollars(40), 1)
        .await;

    let outcome = h
        .coordinator
        .purchase_collectible(&token("bob"), post.clone(), false)
        .await
        .unwrap();

    assert_eq!(outcome.price, Money::from_dollars(40));
    assert_eq!(outcome.remaining_stock, 0);
    assert!(outcome.receipt_path.is_none());

    assert_eq!(h.balance(&bob).await, Money::from_dollars(60));
    assert_eq!(h.balance(&alice).await, Money::from_dollars(40));
    assert_eq!(h.remaining_stock("p1").await, 0);

    // Exactly one collector record for (collectible, buyer)
    let collectors = h
        .store
        .query(&paths::collectors(&outcome.collectible_path), vec![])
        .await
        .unwrap();
    assert_eq!(collectors.len(), 1);
    assert_eq!(collectors[0].path.doc_id(), "bob");

    // One entry in each trade and payment-intent ledger
    for collection in [
        paths::bought_ledger(&bob),
        paths::sold_ledger(&alice),
        paths::payment_intents(&bob),
        paths::payment_intents(&alice),
    ] {
        let docs = h.store.query(&collection, vec![]).await.unwrap();
        assert_eq!(docs.len(), 1, "expected one document in {collection}");
    }

    // Buyer's collectible counter advanced
    let profile: UserProfile = h
        .store
        .get_as(&paths::user_doc(&bob))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(profile.collectible_count, 1);

    // Seller was notified of the sale
    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, "collectible-sold");
    assert_eq!(sent[0].target, alice);
}

#[tokio::test]
async fn second_buyer_hits_out_of_stock() {
    let h = setup();
    let alice = h.seed_user("alice", Money::zero()).await;
    h.seed_user("bob", Money::from_dollars(100)).await;
    h.seed_user("carol", Money::from_dollars(100)).await;
    let post = h
        .seed_trade_listing(&alice, "p1", Money::from_dollars(40), 1)
        .await;

    h.coordinator
        .purchase_collectible(&token("bob"), post.clone(), false)
        .await
        .unwrap();

    let err = h
        .coordinator
        .purchase_collectible(&token("carol"), post, false)
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::OutOfStock));
}

#[tokio::test]
async fn insufficient_funds_writes_nothing() {
    let h = setup();
    let alice = h.seed_user("alice", Money::zero()).await;
    h.seed_user("bob", Money::from_dollars(10)).await;
    let post = h
        .seed_trade_listing(&alice, "p1", Money::from_dollars(40), 1)
        .await;

    let before = h.store.dump().await;
    let err = h
        .coordinator
        .purchase_collectible(&token("bob"), post, false)
        .await
        .unwrap_err();

    assert!(matches!(err, MarketError::InsufficientFunds { .. }));
    assert_eq!(h.store.dump().await, before);
    assert_eq!(h.notifier.sent_count(), 0);
}

#[tokio::test]
async fn creator_cannot_buy_own_collectible() {
    let h = setup();
    let alice = h.seed_user("alice", Money::from_dollars(100)).await;
    let post = h
        .seed_trade_listing(&alice, "p1", Money::from_dollars(40), 1)
        .await;

    let before = h.store.dump().await;
    let err = h
        .coordinator
        .purchase_collectible(&token("alice"), post, false)
        .await
        .unwrap_err();

    assert!(matches!(err, MarketError::SelfPurchase));
    assert_eq!(h.store.dump().await, before);
}

#[tokio::test]
async fn duplicate_purchase_is_forbidden_and_never_duplicates_records() {
    let h = setup();
    let alice = h.seed_user("alice", Money::zero()).await;
    h.seed_user("bob", Money::from_dollars(100)).await;
    let post = h
        .seed_trade_listing(&alice, "p1", Money::from_dollars(20), 5)
        .await;

    let outcome = h
        .coordinator
        .purchase_collectible(&token("bob"), post.clone(), false)
        .await
        .unwrap();

    let err = h
        .coordinator
        .purchase_collectible(&token("bob"), post, false)
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::AlreadyCollected));

    let collectors = h
        .store
        .query(&paths::collectors(&outcome.collectible_path), vec![])
        .await
        .unwrap();
    assert_eq!(collectors.len(), 1);
    assert_eq!(h.remaining_stock("p1").await, 4);
}

#[tokio::test]
async fn repeated_purchases_debit_balance_linearly() {
    let h = setup();
    let alice = h.seed_user("alice", Money::zero()).await;
    let bob = h.seed_user("bob", Money::from_dollars(100)).await;

    for post_id in ["p1", "p2", "p3"] {
        let post = h
            .seed_trade_listing(&alice, post_id, Money::from_dollars(20), 1)
            .await;
        h.coordinator
            .purchase_collectible(&token("bob"), post, false)
            .await
            .unwrap();
    }

    assert_eq!(h.balance(&bob).await, Money::from_dollars(40));
    assert_eq!(h.balance(&alice).await, Money::from_dollars(60));
}

#[tokio::test]
async fn failed_step_rolls_back_every_document() {
    let h = setup();
    let alice = h.seed_user("alice", Money::zero()).await;
    h.seed_user("bob", Money::from_dollars(100)).await;
    let post = h
        .seed_trade_listing(&alice, "p1", Money::from_dollars(40), 3)
        .await;

    // Deleting the seller's wallet makes the credit step fail after the
    // stock decrement and buyer debit have applied.
    h.store.delete(&paths::wallet_doc(&alice)).await.unwrap();

    let before = h.store.dump().await;
    let err = h
        .coordinator
        .purchase_collectible(&token("bob"), post, false)
        .await
        .unwrap_err();

    assert!(matches!(err, MarketError::StepFailed { step: "credit_seller", .. }));
    // Rollback is a no-op as observed from outside
    assert_eq!(h.store.dump().await, before);
    assert_eq!(h.notifier.sent_count(), 0);
}

#[tokio::test]
async fn receipt_gated_purchase_writes_receipt_with_legal_names() {
    let h = setup();
    let alice = h.seed_user("alice", Money::zero()).await;
    let bob = h.seed_user("bob", Money::from_dollars(100)).await;
    h.identity.register(alice.clone(), "Alice Lidell");
    h.identity.register(bob.clone(), "Robert Paulson");
    let post = h
        .seed_trade_listing(&alice, "p1", Money::from_dollars(40), 1)
        .await;

    let outcome = h
        .coordinator
        .purchase_collectible(&token("bob"), post, true)
        .await
        .unwrap();

    let receipt_path = outcome.receipt_path.expect("receipt expected");
    let receipt: domain::Receipt = h.store.get_as(&receipt_path).await.unwrap().unwrap();
    assert_eq!(receipt.buyer_legal_name, "Robert Paulson");
    assert_eq!(receipt.seller_legal_name, "Alice Lidell");
    assert_eq!(receipt.amount, Money::from_dollars(40));
}

#[tokio::test]
async fn unverified_buyer_is_rejected_before_any_write() {
    let h = setup();
    let alice = h.seed_user("alice", Money::zero()).await;
    h.seed_user("bob", Money::from_dollars(100)).await;
    h.identity.register(alice.clone(), "Alice Lidell");
    let post = h
        .seed_trade_listing(&alice, "p1", Money::from_dollars(40), 1)
        .await;

    let before = h.store.dump().await;
    let err = h
        .coordinator
        .purchase_collectible(&token("bob"), post, true)
        .await
        .unwrap_err();

    assert!(matches!(err, MarketError::UnverifiedIdentity(_)));
    assert_eq!(h.store.dump().await, before);
}

#[tokio::test]
async fn seller_losing_verification_rolls_the_whole_purchase_back() {
    let h = setup();
    let alice = h.seed_user("alice", Money::zero()).await;
    let bob = h.seed_user("bob", Money::from_dollars(100)).await;
    // Buyer verified, seller not: the receipt step fails post-hoc.
    h.identity.register(bob.clone(), "Robert Paulson");
    let post = h
        .seed_trade_listing(&alice, "p1", Money::from_dollars(40), 1)
        .await;

    let before = h.store.dump().await;
    let err = h
        .coordinator
        .purchase_collectible(&token("bob"), post, true)
        .await
        .unwrap_err();

    assert!(matches!(err, MarketError::StepFailed { step: "write_receipt", .. }));
    assert_eq!(h.store.dump().await, before);
    assert_eq!(h.balance(&alice).await, Money::zero());
}

#[tokio::test]
async fn mandatory_notification_failure_surfaces_but_keeps_the_commit() {
    let h = setup();
    let alice = h.seed_user("alice", Money::zero()).await;
    let bob = h.seed_user("bob", Money::from_dollars(100)).await;
    h.identity.register(alice.clone(), "Alice Lidell");
    h.identity.register(bob.clone(), "Robert Paulson");
    h.notifier.set_fail_on_send(true);
    let post = h
        .seed_trade_listing(&alice, "p1", Money::from_dollars(40), 1)
        .await;

    let err = h
        .coordinator
        .purchase_collectible(&token("bob"), post, true)
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::Notification(_)));

    // The financial transaction stands despite the error
    assert_eq!(h.balance(&bob).await, Money::from_dollars(60));
    assert_eq!(h.balance(&alice).await, Money::from_dollars(40));
    assert_eq!(h.remaining_stock("p1").await, 0);
}

#[tokio::test]
async fn best_effort_notification_failure_is_swallowed() {
    let h = setup();
    let alice = h.seed_user("alice", Money::zero()).await;
    h.seed_user("bob", Money::from_dollars(100)).await;
    h.notifier.set_fail_on_send(true);
    let post = h
        .seed_trade_listing(&alice, "p1", Money::from_dollars(40), 1)
        .await;

    let outcome = h
        .coordinator
        .purchase_collectible(&token("bob"), post, false)
        .await;
    assert!(outcome.is_ok());
}

#[tokio::test]
async fn concurrent_buyers_of_last_unit_are_serialized() {
    let h = setup();
    let alice = h.seed_user("alice", Money::zero()).await;
    h.seed_user("bob", Money::from_dollars(100)).await;
    h.seed_user("carol", Money::from_dollars(100)).await;
    let post = h
        .seed_trade_listing(&alice, "p1", Money::from_dollars(40), 1)
        .await;

    let mut handles = Vec::new();
    for name in ["bob", "carol"] {
        let coordinator = h.coordinator.clone();
        let post = post.clone();
        handles.push(tokio::spawn(async move {
            coordinator
                .purchase_collectible(&token(name), post, false)
                .await
        }));
    }

    let mut committed = 0;
    let mut out_of_stock = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => committed += 1,
            Err(MarketError::OutOfStock) => out_of_stock += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(committed, 1);
    assert_eq!(out_of_stock, 1);
    assert_eq!(h.remaining_stock("p1").await, 0);
    assert_eq!(h.balance(&alice).await, Money::from_dollars(40));
}

#[tokio::test]
async fn code_redemption_assigns_ranks_in_claim_order() {
    let h = setup();
    let alice = h.seed_user("alice", Money::zero()).await;
    h.seed_user("dora", Money::zero()).await;
    h.seed_user("erin", Money::zero()).await;
    let (_, codes) = h.seed_event_listing(&alice, "e1", 2).await;

    let first = h
        .coordinator
        .collect_collectible(&token("dora"), &codes[0])
        .await
        .unwrap();
    assert_eq!(first.rank, 1);

    let second = h
        .coordinator
        .collect_collectible(&token("erin"), &codes[1])
        .await
        .unwrap();
    assert_eq!(second.rank, 2);

    // The global collected roster has both entries
    let collected = h
        .store
        .query(&paths::collected_collectibles(), vec![])
        .await
        .unwrap();
    assert_eq!(collected.len(), 2);
    let ranks: Vec<u32> = collected
        .iter()
        .map(|doc| {
            serde_json::from_value::<CollectedEntry>(doc.data.clone())
                .unwrap()
                .rank
        })
        .collect();
    assert!(ranks.contains(&1) && ranks.contains(&2));

    // The creator was notified for each collection
    assert_eq!(h.notifier.sent_count(), 2);
}

#[tokio::test]
async fn a_code_consumes_exactly_once() {
    let h = setup();
    let alice = h.seed_user("alice", Money::zero()).await;
    h.seed_user("dora", Money::zero()).await;
    h.seed_user("erin", Money::zero()).await;
    let (_, codes) = h.seed_event_listing(&alice, "e1", 2).await;

    h.coordinator
        .collect_collectible(&token("dora"), &codes[0])
        .await
        .unwrap();

    let err = h
        .coordinator
        .collect_collectible(&token("erin"), &codes[0])
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::CodeUsed));

    let err = h
        .coordinator
        .collect_collectible(&token("erin"), "no-such-code")
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::InvalidCode));
}

#[tokio::test]
async fn concurrent_redemptions_of_one_code_have_a_single_winner() {
    let h = setup();
    let alice = h.seed_user("alice", Money::zero()).await;
    h.seed_user("dora", Money::zero()).await;
    h.seed_user("erin", Money::zero()).await;
    let (_, codes) = h.seed_event_listing(&alice, "e1", 5).await;
    let code = codes[0].clone();

    let mut handles = Vec::new();
    for name in ["dora", "erin"] {
        let coordinator = h.coordinator.clone();
        let code = code.clone();
        handles.push(tokio::spawn(async move {
            coordinator.collect_collectible(&token(name), &code).await
        }));
    }

    let mut committed = 0;
    let mut used = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => committed += 1,
            Err(MarketError::CodeUsed) => used += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(committed, 1);
    assert_eq!(used, 1);
}

#[tokio::test]
async fn failed_redemption_returns_the_code_to_availability() {
    let h = setup();
    let alice = h.seed_user("alice", Money::zero()).await;
    h.seed_user("dora", Money::zero()).await;
    let (_, codes) = h.seed_event_listing(&alice, "e1", 2).await;

    // The creator collecting their own post fails after the code has
    // been consumed; the compensation must reset it.
    let err = h
        .coordinator
        .collect_collectible(&token("alice"), &codes[0])
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::SelfPurchase));

    let code: RedemptionCode = h
        .store
        .get_as(&paths::code_doc(&codes[0]))
        .await
        .unwrap()
        .unwrap();
    assert!(!code.is_consumed);
    assert!(code.consumer.is_none());

    // The code still works for an eligible collector
    let outcome = h
        .coordinator
        .collect_collectible(&token("dora"), &codes[0])
        .await
        .unwrap();
    assert_eq!(outcome.rank, 1);
}

#[tokio::test]
async fn create_trade_collectible_flags_the_post() {
    let h = setup();
    let alice = h.seed_user("alice", Money::zero()).await;
    let post_path = paths::posts().doc("p9");
    h.store
        .set_doc(
            &post_path,
            &Post {
                author: alice.clone(),
                caption: "fresh drop".to_string(),
                collectible: CollectibleRef::none(),
                created_at: Utc::now(),
            },
        )
        .await
        .unwrap();

    let outcome = h
        .coordinator
        .create_collectible(
            &token("alice"),
            CreateCollectibleRequest {
                post_path: post_path.clone(),
                kind: CollectibleKind::Trade,
                stock: 3,
                price: Some(Money::from_dollars(20)),
            },
        )
        .await
        .unwrap();
    assert!(outcome.codes.is_empty());

    let collectible: Collectible = h
        .store
        .get_as(&outcome.collectible_path)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(collectible.kind, CollectibleKind::Trade);
    assert_eq!(collectible.price, Some(Money::from_dollars(20)));
    assert_eq!(collectible.stock, Stock::new(3));

    let post: Post = h.store.get_as(&post_path).await.unwrap().unwrap();
    assert_eq!(
        post.collectible,
        CollectibleRef::to(outcome.collectible_path)
    );

    let created = h
        .store
        .query(&paths::created_ledger(&alice), vec![])
        .await
        .unwrap();
    assert_eq!(created.len(), 1);
}

#[tokio::test]
async fn create_event_collectible_mints_one_code_per_unit() {
    let h = setup();
    let alice = h.seed_user("alice", Money::zero()).await;
    let (_, codes) = h.seed_event_listing(&alice, "e1", 4).await;

    assert_eq!(codes.len(), 4);
    for code in &codes {
        let token: RedemptionCode = h
            .store
            .get_as(&paths::code_doc(code))
            .await
            .unwrap()
            .unwrap();
        assert!(!token.is_consumed);
        assert_eq!(token.creator, alice);
    }
}

#[tokio::test]
async fn create_rejects_unverified_creator_and_bad_parameters() {
    let h = setup();
    h.seed_user("alice", Money::zero()).await;
    let bob = h.seed_user("bob", Money::zero()).await;

    // Cap the stock limit via config
    h.store
        .set_doc(
            &paths::market_config(),
            &MarketConfig {
                max_stock: 10,
                ..MarketConfig::default()
            },
        )
        .await
        .unwrap();

    // Unverified creator
    let mut unverified = UserProfile {
        username: bob.clone(),
        display_name: "bob".to_string(),
        verified: false,
        disabled: false,
        collectible_count: 0,
    };
    h.store
        .set_doc(&paths::user_doc(&bob), &unverified)
        .await
        .unwrap();

    let post_path = paths::posts().doc("p9");
    h.store
        .set_doc(
            &post_path,
            &Post {
                author: bob.clone(),
                caption: String::new(),
                collectible: CollectibleRef::none(),
                created_at: Utc::now(),
            },
        )
        .await
        .unwrap();

    let request = CreateCollectibleRequest {
        post_path: post_path.clone(),
        kind: CollectibleKind::Trade,
        stock: 3,
        price: Some(Money::from_dollars(20)),
    };

    let err = h
        .coordinator
        .create_collectible(&token("bob"), request.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::CreatorNotVerified));

    // Verify bob and retry with bad parameters
    unverified.verified = true;
    h.store
        .set_doc(&paths::user_doc(&bob), &unverified)
        .await
        .unwrap();

    let err = h
        .coordinator
        .create_collectible(
            &token("bob"),
            CreateCollectibleRequest {
                stock: 0,
                ..request.clone()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::InvalidRequest(_)));

    let err = h
        .coordinator
        .create_collectible(
            &token("bob"),
            CreateCollectibleRequest {
                stock: 11,
                ..request.clone()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MarketError::StockLimitExceeded {
            requested: 11,
            limit: 10
        }
    ));

    let err = h
        .coordinator
        .create_collectible(
            &token("bob"),
            CreateCollectibleRequest {
                price: Some(Money::from_dollars(7)),
                ..request.clone()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::PriceNotAllowed(_)));

    // Not the post owner
    let err = h
        .coordinator
        .create_collectible(&token("alice"), request.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::NotPostOwner));

    // A post may reference at most one collectible
    h.coordinator
        .create_collectible(&token("bob"), request.clone())
        .await
        .unwrap();
    let err = h
        .coordinator
        .create_collectible(&token("bob"), request)
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::AlreadyCollectible));
}

#[tokio::test]
async fn unknown_or_disabled_credentials_are_unauthorized() {
    let h = setup();
    let alice = h.seed_user("alice", Money::zero()).await;
    h.seed_user("bob", Money::from_dollars(100)).await;
    let post = h
        .seed_trade_listing(&alice, "p1", Money::from_dollars(40), 1)
        .await;

    let err = h
        .coordinator
        .purchase_collectible("token-nobody", post.clone(), false)
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::Unauthorized));

    h.auth.set_disabled(Username::new("bob"), true);
    let err = h
        .coordinator
        .purchase_collectible(&token("bob"), post, false)
        .await
        .unwrap_err();
    assert!(matches!(err, MarketError::Unauthorized));
}

#[tokio::test]
async fn wrong_kind_is_rejected_in_both_flows() {
    let h = setup();
    let alice = h.seed_user("alice", Money::zero()).await;
    h.seed_user("bob", Money::from_dollars(100)).await;

    // Event collectible bought through the trade flow
    let (event_post, codes) = h.seed_event_listing(&alice, "e1", 1).await;
    let err = h
        .coordinator
        .purchase_collectible(&token("bob"), event_post, false)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MarketError::WrongKind {
            expected: CollectibleKind::Trade,
            actual: CollectibleKind::Event
        }
    ));

    // The failed purchase attempt must not consume the code
    let token_doc: RedemptionCode = h
        .store
        .get_as(&paths::code_doc(&codes[0]))
        .await
        .unwrap()
        .unwrap();
    assert!(!token_doc.is_consumed);
}
