//! Order lookup, status transitions, rate shopping and fulfillment.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use carriers::RateOffer;
use chrono::{DateTime, Utc};
use common::{OrderId, UserId};
use domain::Order;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct FulfillRequest {
    pub carrier: String,
    pub service_code: String,
    /// Acting user recorded on the shipment and ledger entries.
    pub acting_user: Option<Uuid>,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: Uuid,
    pub external_id: String,
    pub order_number: String,
    pub customer_name: String,
    pub customer_email: String,
    pub status: String,
    pub total_cents: i64,
    pub currency: String,
    pub items: Vec<OrderItemResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub external_line_id: String,
    pub sku: String,
    pub name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub linked: bool,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub id: Uuid,
    pub status: String,
}

#[derive(Serialize)]
pub struct RatesResponse {
    pub live: bool,
    pub offers: Vec<RateOffer>,
    pub advisories: Vec<String>,
}

#[derive(Serialize)]
pub struct FulfillResponse {
    pub shipment_id: Uuid,
    pub tracking_number: String,
    pub carrier: String,
    pub service: String,
    pub label_url: Option<String>,
    pub cost_cents: i64,
    pub currency: String,
    pub notify_error: Option<String>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        OrderResponse {
            id: order.id.as_uuid(),
            external_id: order.external_id,
            order_number: order.order_number,
            customer_name: order.customer_name,
            customer_email: order.customer_email,
            status: order.status.as_str().to_string(),
            total_cents: order.total.cents(),
            currency: order.currency,
            items: order
                .items
                .into_iter()
                .map(|item| OrderItemResponse {
                    external_line_id: item.external_line_id,
                    sku: item.sku.to_string(),
                    name: item.name,
                    quantity: item.quantity,
                    unit_price_cents: item.unit_price.cents(),
                    linked: item.product_id.is_some(),
                })
                .collect(),
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

async fn load_order(state: &AppState, id: Uuid) -> Result<Order, ApiError> {
    let order_id = OrderId::from_uuid(id);
    state
        .store
        .get_order(order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("order not found: {order_id}")))
}

// -- Handlers --

/// GET /orders — all orders, most recent first.
#[tracing::instrument(skip(state))]
pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state.store.list_orders().await?;
    Ok(Json(orders.into_iter().map(OrderResponse::from).collect()))
}

/// GET /orders/{id}
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = load_order(&state, id).await?;
    Ok(Json(order.into()))
}

/// POST /orders/{id}/hold — manual hold, reversible.
#[tracing::instrument(skip(state))]
pub async fn hold(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<StatusResponse>, ApiError> {
    let order = load_order(&state, id).await?;
    let next = order.status.hold()?;
    state
        .store
        .set_order_status(order.id, order.status, next)
        .await?;
    Ok(Json(StatusResponse {
        id,
        status: next.as_str().to_string(),
    }))
}

/// POST /orders/{id}/resume — release a hold.
#[tracing::instrument(skip(state))]
pub async fn resume(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<StatusResponse>, ApiError> {
    let order = load_order(&state, id).await?;
    let next = order.status.resume()?;
    state
        .store
        .set_order_status(order.id, order.status, next)
        .await?;
    Ok(Json(StatusResponse {
        id,
        status: next.as_str().to_string(),
    }))
}

/// POST /orders/{id}/cancel — manual cancel; rejected once shipped.
#[tracing::instrument(skip(state))]
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<StatusResponse>, ApiError> {
    let order = load_order(&state, id).await?;
    let next = order.status.cancel()?;
    state
        .store
        .set_order_status(order.id, order.status, next)
        .await?;
    Ok(Json(StatusResponse {
        id,
        status: next.as_str().to_string(),
    }))
}

/// GET /orders/{id}/rates — merged carrier quotes, cheapest first.
#[tracing::instrument(skip(state))]
pub async fn rates(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<RatesResponse>, ApiError> {
    let order = load_order(&state, id).await?;
    let outcome = state.rates.get_rates(&order).await?;
    Ok(Json(RatesResponse {
        live: outcome.live,
        offers: outcome.offers,
        advisories: outcome.advisories,
    }))
}

/// POST /orders/{id}/fulfill — purchase a label and record the
/// shipment.
#[tracing::instrument(skip(state, req), fields(carrier = %req.carrier))]
pub async fn fulfill(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<FulfillRequest>,
) -> Result<Json<FulfillResponse>, ApiError> {
    let acting_user = req.acting_user.map(UserId::from_uuid).unwrap_or_default();

    let outcome = state
        .coordinator
        .fulfill(
            OrderId::from_uuid(id),
            &req.carrier,
            &req.service_code,
            acting_user,
        )
        .await?;

    let shipment = outcome.shipment;
    Ok(Json(FulfillResponse {
        shipment_id: shipment.id.as_uuid(),
        tracking_number: shipment.tracking_number,
        carrier: shipment.carrier,
        service: shipment.service,
        label_url: shipment.label_url,
        cost_cents: shipment.cost.cents(),
        currency: shipment.currency,
        notify_error: outcome.notify_error,
    }))
}
