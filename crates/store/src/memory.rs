use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{OrderId, ProductId, ShipmentId, Sku};
use domain::{
    LedgerEntry, NewLedgerEntry, NewShipment, Order, OrderItem, OrderStatus, Product, Shipment,
};
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

use crate::store::{FulfillmentTx, OrderDraft, WarehouseStore};
use crate::{Result, StoreError};

#[derive(Debug, Clone, Default)]
struct StoreState {
    orders: HashMap<OrderId, Order>,
    products: HashMap<ProductId, Product>,
    ledger: Vec<LedgerEntry>,
    shipments: HashMap<ShipmentId, Shipment>,
    fail_commit: bool,
}

impl StoreState {
    fn product_id_by_sku(&self, sku: &Sku) -> Option<ProductId> {
        self.products
            .values()
            .find(|p| &p.sku == sku)
            .map(|p| p.id)
    }
}

/// In-memory warehouse store for tests and development.
///
/// Provides the same contract as the PostgreSQL implementation. The
/// fulfillment unit of work holds the state write lock until commit or
/// rollback, so concurrent fulfillment attempts serialize exactly as
/// two database transactions would.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of ledger entries (test helper).
    pub async fn ledger_len(&self) -> usize {
        self.state.read().await.ledger.len()
    }

    /// Returns the total number of shipments (test helper).
    pub async fn shipment_count(&self) -> usize {
        self.state.read().await.shipments.len()
    }

    /// Makes subsequent fulfillment commits fail, as a dropped
    /// database connection would (test fault switch).
    pub async fn set_fail_commit(&self, fail: bool) {
        self.state.write().await.fail_commit = fail;
    }
}

fn apply_draft(state: &mut StoreState, draft: OrderDraft) -> Order {
    let now = Utc::now();

    let existing_id = state
        .orders
        .values()
        .find(|o| o.external_id == draft.external_id)
        .map(|o| o.id);

    let id = existing_id.unwrap_or_default();
    let (status, created_at, mut items) = match existing_id.and_then(|id| state.orders.remove(&id))
    {
        Some(existing) => (existing.status, existing.created_at, existing.items),
        None => (OrderStatus::Pending, now, Vec::new()),
    };

    for line in draft.items {
        let product_id = state.product_id_by_sku(&line.sku);
        let item = OrderItem {
            external_line_id: line.external_line_id,
            sku: line.sku,
            name: line.name,
            quantity: line.quantity,
            unit_price: line.unit_price,
            product_id,
        };
        match items
            .iter_mut()
            .find(|i| i.external_line_id == item.external_line_id)
        {
            Some(slot) => *slot = item,
            None => items.push(item),
        }
    }

    let order = Order {
        id,
        external_id: draft.external_id,
        order_number: draft.order_number,
        customer_name: draft.customer_name,
        customer_email: draft.customer_email,
        shipping_address: draft.shipping_address,
        status,
        total: draft.total,
        currency: draft.currency,
        items,
        created_at,
        updated_at: now,
    };
    state.orders.insert(id, order.clone());
    order
}

#[async_trait]
impl WarehouseStore for InMemoryStore {
    async fn upsert_order(&self, draft: OrderDraft) -> Result<Order> {
        let mut state = self.state.write().await;
        Ok(apply_draft(&mut state, draft))
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.state.read().await.orders.get(&id).cloned())
    }

    async fn get_order_by_external_id(&self, external_id: &str) -> Result<Option<Order>> {
        Ok(self
            .state
            .read()
            .await
            .orders
            .values()
            .find(|o| o.external_id == external_id)
            .cloned())
    }

    async fn list_orders(&self) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        let mut orders: Vec<_> = state.orders.values().cloned().collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn set_order_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("order", id))?;
        if order.status != expected {
            return Err(StoreError::StatusConflict {
                expected,
                actual: order.status,
            });
        }
        order.status = next;
        order.updated_at = Utc::now();
        Ok(())
    }

    async fn insert_product(&self, product: Product) -> Result<()> {
        let mut state = self.state.write().await;
        state.products.insert(product.id, product);
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.state.read().await.products.get(&id).cloned())
    }

    async fn get_product_by_sku(&self, sku: &Sku) -> Result<Option<Product>> {
        Ok(self
            .state
            .read()
            .await
            .products
            .values()
            .find(|p| &p.sku == sku)
            .cloned())
    }

    async fn adjust_stock(&self, entry: NewLedgerEntry) -> Result<Product> {
        let mut state = self.state.write().await;
        let product = state
            .products
            .get_mut(&entry.product_id)
            .ok_or_else(|| StoreError::not_found("product", entry.product_id))?;

        let new_stock = product.stock + entry.quantity;
        if new_stock < 0 {
            return Err(StoreError::StockConflict {
                sku: product.sku.clone(),
                requested: u32::try_from(-entry.quantity).unwrap_or(u32::MAX),
                available: product.stock,
            });
        }

        product.stock = new_stock;
        let updated = product.clone();
        state.ledger.push(entry.into_entry());
        Ok(updated)
    }

    async fn ledger_for_product(&self, id: ProductId) -> Result<Vec<LedgerEntry>> {
        Ok(self
            .state
            .read()
            .await
            .ledger
            .iter()
            .filter(|e| e.product_id == id)
            .cloned()
            .collect())
    }

    async fn get_shipment(&self, id: ShipmentId) -> Result<Option<Shipment>> {
        Ok(self.state.read().await.shipments.get(&id).cloned())
    }

    async fn shipments_for_order(&self, id: OrderId) -> Result<Vec<Shipment>> {
        let state = self.state.read().await;
        let mut shipments: Vec<_> = state
            .shipments
            .values()
            .filter(|s| s.order_id == id)
            .cloned()
            .collect();
        shipments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(shipments)
    }

    async fn begin_fulfillment(&self) -> Result<Box<dyn FulfillmentTx>> {
        let guard = Arc::clone(&self.state).write_owned().await;
        let staged = guard.clone();
        Ok(Box::new(InMemoryTx { guard, staged }))
    }
}

/// Unit of work staging changes on a cloned state while holding the
/// store's write lock. Commit publishes the staged state; rollback or
/// drop discards it.
struct InMemoryTx {
    guard: OwnedRwLockWriteGuard<StoreState>,
    staged: StoreState,
}

#[async_trait]
impl FulfillmentTx for InMemoryTx {
    async fn order_for_update(&mut self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.staged.orders.get(&id).cloned())
    }

    async fn insert_shipment(&mut self, shipment: NewShipment) -> Result<Shipment> {
        let record = Shipment {
            id: ShipmentId::new(),
            order_id: shipment.order_id,
            carrier: shipment.carrier,
            service: shipment.service,
            tracking_number: shipment.tracking_number,
            label_url: None,
            label_data: Some(shipment.label_data),
            label_format: shipment.label_format,
            cost: shipment.cost,
            currency: shipment.currency,
            created_by: shipment.created_by,
            created_at: Utc::now(),
        };
        self.staged.shipments.insert(record.id, record.clone());
        Ok(record)
    }

    async fn set_label_url(&mut self, id: ShipmentId, url: &str) -> Result<()> {
        let shipment = self
            .staged
            .shipments
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("shipment", id))?;
        shipment.label_url = Some(url.to_string());
        Ok(())
    }

    async fn decrement_stock(&mut self, product_id: ProductId, quantity: u32) -> Result<()> {
        let product = self
            .staged
            .products
            .get_mut(&product_id)
            .ok_or_else(|| StoreError::not_found("product", product_id))?;

        let delta = i64::from(quantity);
        if product.stock < delta {
            return Err(StoreError::StockConflict {
                sku: product.sku.clone(),
                requested: quantity,
                available: product.stock,
            });
        }
        product.stock -= delta;
        Ok(())
    }

    async fn append_ledger(&mut self, entry: NewLedgerEntry) -> Result<()> {
        self.staged.ledger.push(entry.into_entry());
        Ok(())
    }

    async fn set_order_status(&mut self, id: OrderId, status: OrderStatus) -> Result<()> {
        let order = self
            .staged
            .orders
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("order", id))?;
        order.status = status;
        order.updated_at = Utc::now();
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let InMemoryTx { mut guard, staged } = *self;
        if guard.fail_commit {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        *guard = staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
