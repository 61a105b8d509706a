use std::sync::Arc;
use std::time::Instant;

use carriers::{CarrierClient, ShipmentRequest};
use common::{OrderId, UserId};
use domain::{
    LabelFormat, LedgerEntryKind, NewLedgerEntry, NewShipment, Order, OrderStatus, PackageSpec,
    Product, Shipment, StockShortage,
};
use store::{FulfillmentTx, WarehouseStore};

use crate::notify::PlatformNotifier;
use crate::{FulfillmentError, Result};

/// Result of a successful fulfillment. `notify_error` carries the
/// upstream notification failure, if any; the local commit stands
/// either way.
#[derive(Debug)]
pub struct FulfillmentOutcome {
    pub shipment: Shipment,
    pub notify_error: Option<String>,
}

/// Drives the fulfillment protocol for one order at a time: validate,
/// purchase a label, commit the shipment + stock movements + status
/// write in one transaction, then notify upstream best-effort.
pub struct FulfillmentCoordinator {
    store: Arc<dyn WarehouseStore>,
    carriers: Vec<Arc<dyn CarrierClient>>,
    notifier: Arc<dyn PlatformNotifier>,
    public_base_url: String,
}

impl FulfillmentCoordinator {
    pub fn new(
        store: Arc<dyn WarehouseStore>,
        carriers: Vec<Arc<dyn CarrierClient>>,
        notifier: Arc<dyn PlatformNotifier>,
        public_base_url: String,
    ) -> Self {
        Self {
            store,
            carriers,
            notifier,
            public_base_url,
        }
    }

    fn carrier(&self, name: &str) -> Option<&Arc<dyn CarrierClient>> {
        self.carriers
            .iter()
            .find(|client| client.name().eq_ignore_ascii_case(name))
    }

    /// Fulfills an order with the chosen carrier and service.
    #[tracing::instrument(skip(self), fields(order_id = %order_id, carrier = %carrier_name))]
    pub async fn fulfill(
        &self,
        order_id: OrderId,
        carrier_name: &str,
        service_code: &str,
        acting_user: UserId,
    ) -> Result<FulfillmentOutcome> {
        let started = Instant::now();
        metrics::counter!("fulfillment_attempts_total").increment(1);

        let result = self
            .fulfill_inner(order_id, carrier_name, service_code, acting_user)
            .await;

        metrics::histogram!("fulfillment_duration_seconds").record(started.elapsed().as_secs_f64());
        match &result {
            Ok(_) => metrics::counter!("fulfillment_completed").increment(1),
            Err(_) => metrics::counter!("fulfillment_failed").increment(1),
        }
        result
    }

    async fn fulfill_inner(
        &self,
        order_id: OrderId,
        carrier_name: &str,
        service_code: &str,
        acting_user: UserId,
    ) -> Result<FulfillmentOutcome> {
        // Preconditions, all before any external side effect.
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or_else(|| FulfillmentError::NotFound {
                entity: "order",
                key: order_id.to_string(),
            })?;
        check_fulfillable(&order)?;

        let line_products = self.check_stock(&order).await?;
        let package =
            PackageSpec::estimate(line_products.iter().map(|(product, qty)| (product, *qty)));

        let client = self
            .carrier(carrier_name)
            .ok_or_else(|| FulfillmentError::CarrierNotConfigured(carrier_name.to_string()))?;
        if !client.is_configured() {
            return Err(FulfillmentError::CarrierNotConfigured(
                client.name().to_string(),
            ));
        }

        // External purchase, outside any transaction. Never retried:
        // an ambiguous failure may already have been billed.
        let label = client
            .create_shipment(&ShipmentRequest {
                service_code: service_code.to_string(),
                destination: order.shipping_address.clone(),
                packages: vec![package],
                label_format: LabelFormat::Png,
            })
            .await?;

        tracing::info!(
            tracking_number = %label.tracking_number,
            cost = %label.cost,
            "label purchased"
        );

        let carrier = client.name().to_string();
        let tracking_number = label.tracking_number.clone();

        let mut tx = self.store.begin_fulfillment().await.map_err(|source| {
            orphaned_label(&carrier, &tracking_number);
            FulfillmentError::Persistence {
                carrier: carrier.clone(),
                tracking_number: tracking_number.clone(),
                source,
            }
        })?;

        let staged = self
            .stage(tx.as_mut(), &order, &carrier, service_code, label, acting_user)
            .await;

        match staged {
            Ok(shipment) => {
                if let Err(source) = tx.commit().await {
                    orphaned_label(&carrier, &tracking_number);
                    return Err(FulfillmentError::Persistence {
                        carrier,
                        tracking_number,
                        source,
                    });
                }

                let notify_error = self.notify(&order, &shipment).await;
                Ok(FulfillmentOutcome {
                    shipment,
                    notify_error,
                })
            }
            Err(err) => {
                let _ = tx.rollback().await;
                // A concurrent fulfillment winning the race is reported
                // as such; everything else orphans the paid label.
                match err {
                    raced @ (FulfillmentError::AlreadyShipped(_)
                    | FulfillmentError::Cancelled(_)
                    | FulfillmentError::InvalidState { .. }) => {
                        orphaned_label(&carrier, &tracking_number);
                        Err(raced)
                    }
                    FulfillmentError::Store(source) => {
                        orphaned_label(&carrier, &tracking_number);
                        Err(FulfillmentError::Persistence {
                            carrier,
                            tracking_number,
                            source,
                        })
                    }
                    // A record vanishing mid-transaction (product or
                    // order deleted) is a persistence failure too.
                    FulfillmentError::NotFound { entity, key } => {
                        orphaned_label(&carrier, &tracking_number);
                        Err(FulfillmentError::Persistence {
                            carrier,
                            tracking_number,
                            source: store::StoreError::not_found(entity, key),
                        })
                    }
                    other => Err(other),
                }
            }
        }
    }

    /// Runs every staged write of the fulfillment transaction. The
    /// order's status is re-read under the transaction's lock so a
    /// concurrent fulfillment cannot also succeed.
    async fn stage(
        &self,
        tx: &mut dyn FulfillmentTx,
        order: &Order,
        carrier: &str,
        service_code: &str,
        label: carriers::PurchasedLabel,
        acting_user: UserId,
    ) -> Result<Shipment> {
        let current = tx
            .order_for_update(order.id)
            .await?
            .ok_or_else(|| FulfillmentError::NotFound {
                entity: "order",
                key: order.id.to_string(),
            })?;
        check_fulfillable(&current)?;
        let shipped = current.status.ship().map_err(|_| {
            FulfillmentError::InvalidState {
                order_id: current.id,
                status: current.status,
            }
        })?;

        let shipment = tx
            .insert_shipment(NewShipment {
                order_id: order.id,
                carrier: carrier.to_string(),
                service: service_code.to_string(),
                tracking_number: label.tracking_number,
                label_data: label.label_data,
                label_format: label.label_format,
                cost: label.cost,
                currency: label.currency,
                created_by: acting_user,
            })
            .await?;

        let label_url = format!("{}/shipments/{}/label", self.public_base_url, shipment.id);
        tx.set_label_url(shipment.id, &label_url).await?;

        for item in &current.items {
            let Some(product_id) = item.product_id else {
                continue;
            };
            tx.decrement_stock(product_id, item.quantity).await?;
            tx.append_ledger(NewLedgerEntry {
                product_id,
                quantity: -i64::from(item.quantity),
                kind: LedgerEntryKind::Shipped,
                note: format!("Shipped for order {}", current.order_number),
                actor: acting_user,
            })
            .await?;
        }

        tx.set_order_status(current.id, shipped).await?;

        Ok(Shipment {
            label_url: Some(label_url),
            ..shipment
        })
    }

    /// Aggregates stock problems across every line; returns the
    /// product/quantity pairs needed for package estimation when the
    /// order is coverable.
    async fn check_stock(&self, order: &Order) -> Result<Vec<(Product, u32)>> {
        let mut shortages = Vec::new();
        let mut line_products = Vec::new();

        for item in &order.items {
            let Some(product_id) = item.product_id else {
                shortages.push(StockShortage {
                    sku: item.sku.clone(),
                    required: item.quantity,
                    available: None,
                });
                continue;
            };

            match self.store.get_product(product_id).await? {
                Some(product) => {
                    if product.stock < i64::from(item.quantity) {
                        shortages.push(StockShortage {
                            sku: item.sku.clone(),
                            required: item.quantity,
                            available: Some(u32::try_from(product.stock.max(0)).unwrap_or(0)),
                        });
                    } else {
                        line_products.push((product, item.quantity));
                    }
                }
                None => shortages.push(StockShortage {
                    sku: item.sku.clone(),
                    required: item.quantity,
                    available: None,
                }),
            }
        }

        if shortages.is_empty() {
            Ok(line_products)
        } else {
            Err(FulfillmentError::InsufficientStock(shortages))
        }
    }

    /// Best-effort upstream notification. Failure is logged and
    /// reported alongside the committed result.
    async fn notify(&self, order: &Order, shipment: &Shipment) -> Option<String> {
        let url = tracking_url(&shipment.carrier, &shipment.tracking_number);
        match self
            .notifier
            .notify_fulfilled(
                &order.external_id,
                &shipment.tracking_number,
                &shipment.carrier,
                &url,
            )
            .await
        {
            Ok(()) => None,
            Err(err) => {
                metrics::counter!("fulfillment_notify_failed").increment(1);
                tracing::warn!(
                    order_id = %order.id,
                    error = %err,
                    "upstream fulfillment notification failed"
                );
                Some(err.to_string())
            }
        }
    }
}

fn check_fulfillable(order: &Order) -> Result<()> {
    match order.status {
        OrderStatus::Pending | OrderStatus::Processing => Ok(()),
        OrderStatus::Shipped => Err(FulfillmentError::AlreadyShipped(order.id)),
        OrderStatus::Cancelled => Err(FulfillmentError::Cancelled(order.id)),
        OrderStatus::OnHold => Err(FulfillmentError::InvalidState {
            order_id: order.id,
            status: order.status,
        }),
    }
}

fn orphaned_label(carrier: &str, tracking_number: &str) {
    metrics::counter!("fulfillment_orphaned_labels").increment(1);
    tracing::error!(
        carrier,
        tracking_number,
        "label purchased but fulfillment not recorded; reconcile with carrier manually"
    );
}

/// Public tracking page for a purchased label.
pub(crate) fn tracking_url(carrier: &str, tracking_number: &str) -> String {
    if carrier.eq_ignore_ascii_case("UPS") {
        format!("https://www.ups.com/track?tracknum={tracking_number}")
    } else if carrier.eq_ignore_ascii_case("USPS") {
        format!("https://tools.usps.com/go/TrackConfirmAction?tLabels={tracking_number}")
    } else {
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracking_url_per_carrier() {
        assert!(tracking_url("UPS", "1Z999").contains("ups.com"));
        assert!(tracking_url("usps", "9400").contains("usps.com"));
        assert!(tracking_url("DHL", "123").is_empty());
    }
}
