//! Canonical path constructors for every collection in the document tree.
//!
//! All callers build paths through these functions; ad hoc string
//! concatenation of paths is not allowed outside this module.

use common::Username;
use doc_store::{CollectionPath, DocPath};

/// `users` collection of account profiles.
pub fn users() -> CollectionPath {
    CollectionPath::root("users")
}

/// A user's profile document.
pub fn user_doc(username: &Username) -> DocPath {
    users().doc(username.as_str())
}

/// `wallets` collection of balances.
pub fn wallets() -> CollectionPath {
    CollectionPath::root("wallets")
}

/// A user's wallet document.
pub fn wallet_doc(username: &Username) -> DocPath {
    wallets().doc(username.as_str())
}

/// `posts` collection.
pub fn posts() -> CollectionPath {
    CollectionPath::root("posts")
}

/// `collectibles` collection.
pub fn collectibles() -> CollectionPath {
    CollectionPath::root("collectibles")
}

/// A collectible document by id.
pub fn collectible_doc(id: &str) -> DocPath {
    collectibles().doc(id)
}

/// A collectible's `collectors` sub-collection.
pub fn collectors(collectible_path: &DocPath) -> CollectionPath {
    collectible_path.sub_collection("collectors")
}

/// The collector record guarding one (collectible, user) acquisition.
pub fn collector_doc(collectible_path: &DocPath, username: &Username) -> DocPath {
    collectors(collectible_path).doc(username.as_str())
}

/// A user's payment-intent ledger.
pub fn payment_intents(username: &Username) -> CollectionPath {
    user_doc(username).sub_collection("paymentIntents")
}

/// One payment-intent entry by its `"{millis}-{counterparty}"` key.
pub fn payment_intent_doc(username: &Username, key: &str) -> DocPath {
    payment_intents(username).doc(key)
}

/// A user's bought-collectibles ledger.
pub fn bought_ledger(username: &Username) -> CollectionPath {
    user_doc(username).sub_collection("bought")
}

/// A user's sold-collectibles ledger.
pub fn sold_ledger(username: &Username) -> CollectionPath {
    user_doc(username).sub_collection("sold")
}

/// A user's created-collectibles ledger.
pub fn created_ledger(username: &Username) -> CollectionPath {
    user_doc(username).sub_collection("created")
}

/// A user's collected-collectibles ledger (event flow).
pub fn collected_ledger(username: &Username) -> CollectionPath {
    user_doc(username).sub_collection("collected")
}

/// `codes` collection of single-use redemption tokens.
pub fn codes() -> CollectionPath {
    CollectionPath::root("codes")
}

/// A redemption code document; the code value is its own id.
pub fn code_doc(code: &str) -> DocPath {
    codes().doc(code)
}

/// Global `receipts` collection for identity-verified trades.
pub fn receipts() -> CollectionPath {
    CollectionPath::root("receipts")
}

/// Global collection of event-collectible redemptions.
pub fn collected_collectibles() -> CollectionPath {
    CollectionPath::root("collectedCollectibles")
}

/// The marketplace configuration document.
pub fn market_config() -> DocPath {
    CollectionPath::root("config").doc("marketplace")
}
