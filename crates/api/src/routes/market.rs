//! Marketplace saga trigger endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use doc_store::{DocPath, DocumentStore};
use domain::{CollectibleKind, Money};
use saga::{
    CreateCollectibleRequest, InMemoryAuthResolver, InMemoryIdentityVerifier,
    InMemoryNotificationService, MarketCoordinator,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: DocumentStore> {
    pub market: MarketCoordinator<
        S,
        InMemoryAuthResolver,
        InMemoryIdentityVerifier,
        InMemoryNotificationService,
    >,
    pub store: S,
    pub auth: InMemoryAuthResolver,
    pub identity: InMemoryIdentityVerifier,
    pub notifier: InMemoryNotificationService,
}

// -- Request types --

#[derive(Deserialize)]
pub struct PurchaseRequest {
    pub post_path: String,
    #[serde(default)]
    pub require_receipt: bool,
}

#[derive(Deserialize)]
pub struct CollectRequest {
    pub code: String,
}

#[derive(Deserialize)]
pub struct CreateRequest {
    pub post_path: String,
    pub kind: String,
    pub stock: u32,
    pub price_cents: Option<i64>,
}

// -- Response types --

#[derive(Serialize)]
pub struct PurchaseResponse {
    pub collectible_path: String,
    pub price_cents: i64,
    pub remaining_stock: u32,
    pub receipt_path: Option<String>,
    pub timestamp: String,
}

#[derive(Serialize)]
pub struct CollectResponse {
    pub collectible_path: String,
    pub rank: u32,
    pub timestamp: String,
}

#[derive(Serialize)]
pub struct CreateResponse {
    pub collectible_path: String,
    pub codes: Vec<String>,
}

// -- Handlers --

/// POST /market/purchase — buy the collectible attached to a post.
#[tracing::instrument(skip(state, headers, req))]
pub async fn purchase<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Json(req): Json<PurchaseRequest>,
) -> Result<Json<PurchaseResponse>, ApiError> {
    let credential = bearer_token(&headers)?;
    let post_path = parse_doc_path(&req.post_path)?;

    let outcome = state
        .market
        .purchase_collectible(credential, post_path, req.require_receipt)
        .await?;

    Ok(Json(PurchaseResponse {
        collectible_path: outcome.collectible_path.to_string(),
        price_cents: outcome.price.cents(),
        remaining_stock: outcome.remaining_stock,
        receipt_path: outcome.receipt_path.map(|path| path.to_string()),
        timestamp: outcome.timestamp.to_rfc3339(),
    }))
}

/// POST /market/collect — redeem a single-use event code.
#[tracing::instrument(skip(state, headers, req))]
pub async fn collect<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Json(req): Json<CollectRequest>,
) -> Result<Json<CollectResponse>, ApiError> {
    let credential = bearer_token(&headers)?;

    let outcome = state
        .market
        .collect_collectible(credential, &req.code)
        .await?;

    Ok(Json(CollectResponse {
        collectible_path: outcome.collectible_path.to_string(),
        rank: outcome.rank,
        timestamp: outcome.timestamp.to_rfc3339(),
    }))
}

/// POST /market/collectibles — create a collectible on a post.
#[tracing::instrument(skip(state, headers, req))]
pub async fn create<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Json(req): Json<CreateRequest>,
) -> Result<Json<CreateResponse>, ApiError> {
    let credential = bearer_token(&headers)?;
    let post_path = parse_doc_path(&req.post_path)?;

    let kind = match req.kind.as_str() {
        "trade" => CollectibleKind::Trade,
        "event" => CollectibleKind::Event,
        other => {
            return Err(ApiError::BadRequest(format!(
                "unknown collectible kind '{other}'"
            )));
        }
    };

    let outcome = state
        .market
        .create_collectible(
            credential,
            CreateCollectibleRequest {
                post_path,
                kind,
                stock: req.stock,
                price: req.price_cents.map(Money::from_cents),
            },
        )
        .await?;

    Ok(Json(CreateResponse {
        collectible_path: outcome.collectible_path.to_string(),
        codes: outcome.codes,
    }))
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)
}

fn parse_doc_path(path: &str) -> Result<DocPath, ApiError> {
    DocPath::parse(path).map_err(|err| ApiError::BadRequest(format!("invalid post path: {err}")))
}
