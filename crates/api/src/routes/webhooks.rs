//! Signed order-sync webhook.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use common::{Money, Sku};
use domain::Address;
use serde::{Deserialize, Serialize};
use store::{OrderDraft, OrderItemDraft};
use uuid::Uuid;

use crate::error::ApiError;
use crate::signature::{self, SIGNATURE_HEADER};
use crate::AppState;

/// Inbound order payload from the upstream platform. Monetary values
/// arrive as decimal strings.
#[derive(Debug, Deserialize)]
pub struct OrderSyncPayload {
    pub id: String,
    pub order_number: String,
    pub customer_name: String,
    pub customer_email: String,
    pub total: String,
    pub currency: String,
    pub shipping_address: AddressPayload,
    pub line_items: Vec<LineItemPayload>,
}

#[derive(Debug, Deserialize)]
pub struct AddressPayload {
    pub name: String,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    pub region: String,
    pub postal_code: String,
    pub country: String,
}

#[derive(Debug, Deserialize)]
pub struct LineItemPayload {
    pub id: String,
    pub sku: String,
    pub name: String,
    pub quantity: u32,
    pub price: String,
}

#[derive(Serialize)]
pub struct OrderSyncResponse {
    pub order_id: Uuid,
    pub status: String,
}

/// POST /webhooks/orders — upserts an order from a signed payload.
///
/// The signature is checked over the raw body before any parsing;
/// tampered or unsigned requests get a 401 and nothing else.
#[tracing::instrument(skip(state, headers, body))]
pub async fn order_sync(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<OrderSyncResponse>, ApiError> {
    let provided = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;

    // An empty secret fails closed.
    if state.webhook_secret.is_empty()
        || !signature::verify(&state.webhook_secret, &body, provided)
    {
        metrics::counter!("webhook_rejected").increment(1);
        return Err(ApiError::Unauthorized);
    }

    let payload: OrderSyncPayload = serde_json::from_slice(&body)
        .map_err(|err| ApiError::BadRequest(format!("invalid payload: {err}")))?;

    let total = Money::parse_decimal(&payload.total)
        .ok_or_else(|| ApiError::BadRequest(format!("invalid total: {}", payload.total)))?;
    let mut items = Vec::with_capacity(payload.line_items.len());
    for line in payload.line_items {
        let unit_price = Money::parse_decimal(&line.price)
            .ok_or_else(|| ApiError::BadRequest(format!("invalid price: {}", line.price)))?;
        items.push(OrderItemDraft {
            external_line_id: line.id,
            sku: Sku::new(line.sku),
            name: line.name,
            quantity: line.quantity,
            unit_price,
        });
    }

    let draft = OrderDraft {
        external_id: payload.id,
        order_number: payload.order_number,
        customer_name: payload.customer_name,
        customer_email: payload.customer_email,
        shipping_address: Address {
            name: payload.shipping_address.name,
            line1: payload.shipping_address.line1,
            line2: payload.shipping_address.line2,
            city: payload.shipping_address.city,
            region: payload.shipping_address.region,
            postal_code: payload.shipping_address.postal_code,
            country: payload.shipping_address.country,
        },
        total,
        currency: payload.currency,
        items,
    };

    let order = state.store.upsert_order(draft).await?;
    metrics::counter!("webhook_orders_synced").increment(1);
    tracing::info!(order_id = %order.id, external_id = %order.external_id, "order synced");

    Ok(Json(OrderSyncResponse {
        order_id: order.id.as_uuid(),
        status: order.status.as_str().to_string(),
    }))
}
