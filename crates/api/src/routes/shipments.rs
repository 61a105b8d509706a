//! Label retrieval.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use common::ShipmentId;
use serde::Deserialize;
use uuid::Uuid;

use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct LabelQuery {
    /// `inline` (default) or `attachment`.
    pub disposition: Option<String>,
}

/// GET /shipments/{id}/label — serves the stored label bytes with a
/// content-type derived from the stored format.
#[tracing::instrument(skip(state))]
pub async fn label(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<LabelQuery>,
) -> Result<Response, ApiError> {
    let shipment_id = ShipmentId::from_uuid(id);
    let shipment = state
        .store
        .get_shipment(shipment_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("shipment not found: {shipment_id}")))?;

    let Some(bytes) = shipment.label_data else {
        return Err(ApiError::NotFound(format!(
            "shipment {shipment_id} has no stored label"
        )));
    };

    let disposition = if query.disposition.as_deref() == Some("attachment") {
        format!(
            "attachment; filename=\"label-{}.{}\"",
            shipment.tracking_number,
            shipment.label_format.extension()
        )
    } else {
        "inline".to_string()
    };

    Ok((
        [
            (header::CONTENT_TYPE, shipment.label_format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}
