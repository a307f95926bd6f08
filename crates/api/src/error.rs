//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use saga::MarketError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Missing or malformed input caught at the HTTP boundary.
    BadRequest(String),
    /// Missing or malformed bearer credential.
    Unauthorized,
    /// Saga execution error.
    Market(MarketError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "missing or invalid credential".to_string(),
            ),
            ApiError::Market(err) => market_error_to_response(err),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn market_error_to_response(err: MarketError) -> (StatusCode, String) {
    match &err {
        MarketError::Unauthorized => (StatusCode::UNAUTHORIZED, err.to_string()),

        // Malformed or unusable input
        MarketError::InvalidRequest(_)
        | MarketError::PostNotFound(_)
        | MarketError::NotCollectible
        | MarketError::WrongKind { .. }
        | MarketError::InvalidCode => (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),

        // Business-rule rejections
        MarketError::SelfPurchase
        | MarketError::OutOfStock
        | MarketError::AlreadyCollected
        | MarketError::InsufficientFunds { .. }
        | MarketError::UnverifiedIdentity(_)
        | MarketError::NotPostOwner
        | MarketError::AlreadyCollectible
        | MarketError::CreatorNotVerified
        | MarketError::StockLimitExceeded { .. }
        | MarketError::PriceNotAllowed(_)
        | MarketError::CodeUsed => (StatusCode::FORBIDDEN, err.to_string()),

        // Internal failures: log the detail, never expose it
        MarketError::LockTimeout(_)
        | MarketError::StepFailed { .. }
        | MarketError::Notification(_)
        | MarketError::Store(_)
        | MarketError::Domain(_)
        | MarketError::Serialization(_) => {
            tracing::error!(error = %err, "internal server error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            )
        }
    }
}

impl From<MarketError> for ApiError {
    fn from(err: MarketError) -> Self {
        ApiError::Market(err)
    }
}
