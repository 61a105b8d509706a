//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use carriers::CarrierError;
use domain::OrderError;
use fulfillment::FulfillmentError;
use store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Webhook signature missing or invalid.
    Unauthorized,
    /// Illegal order status transition.
    Order(OrderError),
    /// Fulfillment or rate aggregation failure.
    Fulfillment(FulfillmentError),
    /// Store failure outside fulfillment.
    Store(StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, serde_json::json!({ "error": msg })),
            ApiError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, serde_json::json!({ "error": msg }))
            }
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                serde_json::json!({ "error": "invalid webhook signature" }),
            ),
            ApiError::Order(err) => (StatusCode::CONFLICT, serde_json::json!({ "error": err.to_string() })),
            ApiError::Fulfillment(err) => fulfillment_error_to_response(err),
            ApiError::Store(err) => store_error_to_response(err),
        };

        (status, axum::Json(body)).into_response()
    }
}

fn fulfillment_error_to_response(err: FulfillmentError) -> (StatusCode, serde_json::Value) {
    match &err {
        FulfillmentError::NotFound { .. } => {
            (StatusCode::NOT_FOUND, serde_json::json!({ "error": err.to_string() }))
        }
        FulfillmentError::AlreadyShipped(_)
        | FulfillmentError::Cancelled(_)
        | FulfillmentError::InvalidState { .. } => {
            (StatusCode::CONFLICT, serde_json::json!({ "error": err.to_string() }))
        }
        // Per-SKU detail so the caller can show what is short.
        FulfillmentError::InsufficientStock(shortages) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            serde_json::json!({
                "error": err.to_string(),
                "shortages": shortages
                    .iter()
                    .map(|s| serde_json::json!({
                        "sku": s.sku.as_str(),
                        "required": s.required,
                        "available": s.available,
                    }))
                    .collect::<Vec<_>>(),
            }),
        ),
        FulfillmentError::CarrierNotConfigured(_)
        | FulfillmentError::Carrier(CarrierError::NotConfigured(_)) => (
            StatusCode::SERVICE_UNAVAILABLE,
            serde_json::json!({ "error": err.to_string() }),
        ),
        FulfillmentError::Carrier(_) => {
            (StatusCode::BAD_GATEWAY, serde_json::json!({ "error": err.to_string() }))
        }
        FulfillmentError::NoRatesAvailable { advisories } => (
            StatusCode::BAD_GATEWAY,
            serde_json::json!({ "error": err.to_string(), "advisories": advisories }),
        ),
        FulfillmentError::Persistence { tracking_number, carrier, .. } => {
            tracing::error!(error = %err, "fulfillment persistence failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({
                    "error": err.to_string(),
                    "orphaned_label": { "carrier": carrier, "tracking_number": tracking_number },
                }),
            )
        }
        FulfillmentError::Store(_) => {
            tracing::error!(error = %err, "store failure during fulfillment");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({ "error": err.to_string() }),
            )
        }
    }
}

fn store_error_to_response(err: StoreError) -> (StatusCode, serde_json::Value) {
    match &err {
        StoreError::NotFound { .. } => {
            (StatusCode::NOT_FOUND, serde_json::json!({ "error": err.to_string() }))
        }
        StoreError::StockConflict { .. } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            serde_json::json!({ "error": err.to_string() }),
        ),
        // A concurrent writer changed the order first; the client
        // should re-read and retry.
        StoreError::StatusConflict { .. } => {
            (StatusCode::CONFLICT, serde_json::json!({ "error": err.to_string() }))
        }
        _ => {
            tracing::error!(error = %err, "internal store error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({ "error": err.to_string() }),
            )
        }
    }
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        ApiError::Order(err)
    }
}

impl From<FulfillmentError> for ApiError {
    fn from(err: FulfillmentError) -> Self {
        ApiError::Fulfillment(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}
