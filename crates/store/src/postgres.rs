use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Money, OrderId, ProductId, ShipmentId, Sku, UserId};
use domain::{
    Address, Dimensions, LabelFormat, LedgerEntry, LedgerEntryKind, NewLedgerEntry, NewShipment,
    Order, OrderItem, OrderStatus, Product, Shipment,
};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::store::{FulfillmentTx, OrderDraft, WarehouseStore};
use crate::{Result, StoreError};

/// Idempotent schema bootstrap.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS products (
    id UUID PRIMARY KEY,
    sku TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    length_in DOUBLE PRECISION NOT NULL DEFAULT 0,
    width_in DOUBLE PRECISION NOT NULL DEFAULT 0,
    height_in DOUBLE PRECISION NOT NULL DEFAULT 0,
    weight_lb DOUBLE PRECISION NOT NULL DEFAULT 0,
    stock BIGINT NOT NULL DEFAULT 0,
    low_stock_threshold BIGINT NOT NULL DEFAULT 0,
    platform_product_id TEXT,
    platform_variant_id TEXT
);

CREATE TABLE IF NOT EXISTS orders (
    id UUID PRIMARY KEY,
    external_id TEXT NOT NULL UNIQUE,
    order_number TEXT NOT NULL,
    customer_name TEXT NOT NULL,
    customer_email TEXT NOT NULL,
    ship_name TEXT NOT NULL,
    ship_line1 TEXT NOT NULL,
    ship_line2 TEXT,
    ship_city TEXT NOT NULL,
    ship_region TEXT NOT NULL,
    ship_postal_code TEXT NOT NULL,
    ship_country TEXT NOT NULL,
    status TEXT NOT NULL,
    total_cents BIGINT NOT NULL,
    currency TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS order_items (
    order_id UUID NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
    external_line_id TEXT NOT NULL,
    sku TEXT NOT NULL,
    name TEXT NOT NULL,
    quantity INT NOT NULL,
    unit_price_cents BIGINT NOT NULL,
    product_id UUID REFERENCES products(id) ON DELETE SET NULL,
    PRIMARY KEY (order_id, external_line_id)
);

CREATE TABLE IF NOT EXISTS inventory_ledger (
    id UUID PRIMARY KEY,
    product_id UUID NOT NULL REFERENCES products(id) ON DELETE CASCADE,
    quantity BIGINT NOT NULL,
    kind TEXT NOT NULL,
    note TEXT NOT NULL,
    actor UUID NOT NULL,
    recorded_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS shipments (
    id UUID PRIMARY KEY,
    order_id UUID NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
    carrier TEXT NOT NULL,
    service TEXT NOT NULL,
    tracking_number TEXT NOT NULL,
    label_url TEXT,
    label_data BYTEA,
    label_format TEXT NOT NULL,
    cost_cents BIGINT NOT NULL,
    currency TEXT NOT NULL,
    created_by UUID NOT NULL,
    created_at TIMESTAMPTZ NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_ledger_product ON inventory_ledger (product_id, recorded_at);
CREATE INDEX IF NOT EXISTS idx_shipments_order ON shipments (order_id);
"#;

/// PostgreSQL-backed warehouse store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new store over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the schema if it does not exist yet.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        Ok(Product {
            id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
            sku: Sku::new(row.try_get::<String, _>("sku")?),
            name: row.try_get("name")?,
            dimensions: Dimensions {
                length_in: row.try_get("length_in")?,
                width_in: row.try_get("width_in")?,
                height_in: row.try_get("height_in")?,
            },
            weight_lb: row.try_get("weight_lb")?,
            stock: row.try_get("stock")?,
            low_stock_threshold: row.try_get("low_stock_threshold")?,
            platform_product_id: row.try_get("platform_product_id")?,
            platform_variant_id: row.try_get("platform_variant_id")?,
        })
    }

    fn row_to_order_header(row: &PgRow) -> Result<Order> {
        let status_str: String = row.try_get("status")?;
        let status = OrderStatus::parse(&status_str)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown order status {status_str:?}")))?;

        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            external_id: row.try_get("external_id")?,
            order_number: row.try_get("order_number")?,
            customer_name: row.try_get("customer_name")?,
            customer_email: row.try_get("customer_email")?,
            shipping_address: Address {
                name: row.try_get("ship_name")?,
                line1: row.try_get("ship_line1")?,
                line2: row.try_get("ship_line2")?,
                city: row.try_get("ship_city")?,
                region: row.try_get("ship_region")?,
                postal_code: row.try_get("ship_postal_code")?,
                country: row.try_get("ship_country")?,
            },
            status,
            total: Money::from_cents(row.try_get("total_cents")?),
            currency: row.try_get("currency")?,
            items: Vec::new(),
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
        })
    }

    fn row_to_item(row: PgRow) -> Result<OrderItem> {
        Ok(OrderItem {
            external_line_id: row.try_get("external_line_id")?,
            sku: Sku::new(row.try_get::<String, _>("sku")?),
            name: row.try_get("name")?,
            quantity: u32::try_from(row.try_get::<i32, _>("quantity")?).unwrap_or(0),
            unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
            product_id: row
                .try_get::<Option<Uuid>, _>("product_id")?
                .map(ProductId::from_uuid),
        })
    }

    fn row_to_ledger(row: PgRow) -> Result<LedgerEntry> {
        let kind_str: String = row.try_get("kind")?;
        let kind = LedgerEntryKind::parse(&kind_str)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown ledger kind {kind_str:?}")))?;

        Ok(LedgerEntry {
            id: row.try_get("id")?,
            product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
            quantity: row.try_get("quantity")?,
            kind,
            note: row.try_get("note")?,
            actor: UserId::from_uuid(row.try_get::<Uuid, _>("actor")?),
            recorded_at: row.try_get::<DateTime<Utc>, _>("recorded_at")?,
        })
    }

    fn row_to_shipment(row: PgRow) -> Result<Shipment> {
        let format_str: String = row.try_get("label_format")?;
        let label_format = LabelFormat::parse(&format_str)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown label format {format_str:?}")))?;

        Ok(Shipment {
            id: ShipmentId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            carrier: row.try_get("carrier")?,
            service: row.try_get("service")?,
            tracking_number: row.try_get("tracking_number")?,
            label_url: row.try_get("label_url")?,
            label_data: row.try_get("label_data")?,
            label_format,
            cost: Money::from_cents(row.try_get("cost_cents")?),
            currency: row.try_get("currency")?,
            created_by: UserId::from_uuid(row.try_get::<Uuid, _>("created_by")?),
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        })
    }

    async fn load_items(
        tx: impl sqlx::PgExecutor<'_>,
        order_id: OrderId,
    ) -> Result<Vec<OrderItem>> {
        let rows = sqlx::query(
            r#"
            SELECT external_line_id, sku, name, quantity, unit_price_cents, product_id
            FROM order_items
            WHERE order_id = $1
            ORDER BY external_line_id ASC
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(tx)
        .await?;

        rows.into_iter().map(Self::row_to_item).collect()
    }
}

const SELECT_ORDER: &str = r#"
SELECT id, external_id, order_number, customer_name, customer_email,
       ship_name, ship_line1, ship_line2, ship_city, ship_region,
       ship_postal_code, ship_country, status, total_cents, currency,
       created_at, updated_at
FROM orders
"#;

#[async_trait]
impl WarehouseStore for PostgresStore {
    #[tracing::instrument(skip(self, draft), fields(external_id = %draft.external_id))]
    async fn upsert_order(&self, draft: OrderDraft) -> Result<Order> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let row = sqlx::query(
            r#"
            INSERT INTO orders (
                id, external_id, order_number, customer_name, customer_email,
                ship_name, ship_line1, ship_line2, ship_city, ship_region,
                ship_postal_code, ship_country, status, total_cents, currency,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $16)
            ON CONFLICT (external_id) DO UPDATE SET
                order_number = EXCLUDED.order_number,
                customer_name = EXCLUDED.customer_name,
                customer_email = EXCLUDED.customer_email,
                ship_name = EXCLUDED.ship_name,
                ship_line1 = EXCLUDED.ship_line1,
                ship_line2 = EXCLUDED.ship_line2,
                ship_city = EXCLUDED.ship_city,
                ship_region = EXCLUDED.ship_region,
                ship_postal_code = EXCLUDED.ship_postal_code,
                ship_country = EXCLUDED.ship_country,
                total_cents = EXCLUDED.total_cents,
                currency = EXCLUDED.currency,
                updated_at = EXCLUDED.updated_at
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&draft.external_id)
        .bind(&draft.order_number)
        .bind(&draft.customer_name)
        .bind(&draft.customer_email)
        .bind(&draft.shipping_address.name)
        .bind(&draft.shipping_address.line1)
        .bind(&draft.shipping_address.line2)
        .bind(&draft.shipping_address.city)
        .bind(&draft.shipping_address.region)
        .bind(&draft.shipping_address.postal_code)
        .bind(&draft.shipping_address.country)
        .bind(OrderStatus::Pending.as_str())
        .bind(draft.total.cents())
        .bind(&draft.currency)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let order_id = OrderId::from_uuid(row.try_get::<Uuid, _>("id")?);

        for item in &draft.items {
            sqlx::query(
                r#"
                INSERT INTO order_items (
                    order_id, external_line_id, sku, name, quantity,
                    unit_price_cents, product_id
                )
                VALUES ($1, $2, $3, $4, $5, $6,
                        (SELECT id FROM products WHERE sku = $3))
                ON CONFLICT (order_id, external_line_id) DO UPDATE SET
                    sku = EXCLUDED.sku,
                    name = EXCLUDED.name,
                    quantity = EXCLUDED.quantity,
                    unit_price_cents = EXCLUDED.unit_price_cents,
                    product_id = EXCLUDED.product_id
                "#,
            )
            .bind(order_id.as_uuid())
            .bind(&item.external_line_id)
            .bind(item.sku.as_str())
            .bind(&item.name)
            .bind(i32::try_from(item.quantity).unwrap_or(i32::MAX))
            .bind(item.unit_price.cents())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        self.get_order(order_id)
            .await?
            .ok_or_else(|| StoreError::not_found("order", order_id))
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("{SELECT_ORDER} WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let mut order = Self::row_to_order_header(&row)?;
                order.items = Self::load_items(&self.pool, order.id).await?;
                Ok(Some(order))
            }
            None => Ok(None),
        }
    }

    async fn get_order_by_external_id(&self, external_id: &str) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("{SELECT_ORDER} WHERE external_id = $1"))
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let mut order = Self::row_to_order_header(&row)?;
                order.items = Self::load_items(&self.pool, order.id).await?;
                Ok(Some(order))
            }
            None => Ok(None),
        }
    }

    async fn list_orders(&self) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!("{SELECT_ORDER} ORDER BY created_at DESC"))
            .fetch_all(&self.pool)
            .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            let mut order = Self::row_to_order_header(&row)?;
            order.items = Self::load_items(&self.pool, order.id).await?;
            orders.push(order);
        }
        Ok(orders)
    }

    async fn set_order_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE orders SET status = $3, updated_at = $4 WHERE id = $1 AND status = $2",
        )
        .bind(id.as_uuid())
        .bind(expected.as_str())
        .bind(next.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Distinguish a missing order from a concurrent status
            // change.
            let row = sqlx::query("SELECT status FROM orders WHERE id = $1")
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| StoreError::not_found("order", id))?;

            let actual_str: String = row.try_get("status")?;
            let actual = OrderStatus::parse(&actual_str).ok_or_else(|| {
                StoreError::Corrupt(format!("unknown order status {actual_str:?}"))
            })?;
            return Err(StoreError::StatusConflict { expected, actual });
        }
        Ok(())
    }

    async fn insert_product(&self, product: Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, name, length_in, width_in, height_in, weight_lb,
                stock, low_stock_threshold, platform_product_id, platform_variant_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(product.sku.as_str())
        .bind(&product.name)
        .bind(product.dimensions.length_in)
        .bind(product.dimensions.width_in)
        .bind(product.dimensions.height_in)
        .bind(product.weight_lb)
        .bind(product.stock)
        .bind(product.low_stock_threshold)
        .bind(&product.platform_product_id)
        .bind(&product.platform_variant_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query("SELECT * FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_product).transpose()
    }

    async fn get_product_by_sku(&self, sku: &Sku) -> Result<Option<Product>> {
        let row = sqlx::query("SELECT * FROM products WHERE sku = $1")
            .bind(sku.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_product).transpose()
    }

    #[tracing::instrument(skip(self, entry), fields(product_id = %entry.product_id))]
    async fn adjust_stock(&self, entry: NewLedgerEntry) -> Result<Product> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT * FROM products WHERE id = $1 FOR UPDATE")
            .bind(entry.product_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::not_found("product", entry.product_id))?;
        let product = Self::row_to_product(row)?;

        let new_stock = product.stock + entry.quantity;
        if new_stock < 0 {
            return Err(StoreError::StockConflict {
                sku: product.sku,
                requested: u32::try_from(-entry.quantity).unwrap_or(u32::MAX),
                available: product.stock,
            });
        }

        sqlx::query("UPDATE products SET stock = $2 WHERE id = $1")
            .bind(entry.product_id.as_uuid())
            .bind(new_stock)
            .execute(&mut *tx)
            .await?;

        let record = entry.into_entry();
        sqlx::query(
            r#"
            INSERT INTO inventory_ledger (id, product_id, quantity, kind, note, actor, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(record.id)
        .bind(record.product_id.as_uuid())
        .bind(record.quantity)
        .bind(record.kind.as_str())
        .bind(&record.note)
        .bind(record.actor.as_uuid())
        .bind(record.recorded_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Product {
            stock: new_stock,
            ..product
        })
    }

    async fn ledger_for_product(&self, id: ProductId) -> Result<Vec<LedgerEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, product_id, quantity, kind, note, actor, recorded_at
            FROM inventory_ledger
            WHERE product_id = $1
            ORDER BY recorded_at ASC
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_ledger).collect()
    }

    async fn get_shipment(&self, id: ShipmentId) -> Result<Option<Shipment>> {
        let row = sqlx::query("SELECT * FROM shipments WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_shipment).transpose()
    }

    async fn shipments_for_order(&self, id: OrderId) -> Result<Vec<Shipment>> {
        let rows = sqlx::query("SELECT * FROM shipments WHERE order_id = $1 ORDER BY created_at")
            .bind(id.as_uuid())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Self::row_to_shipment).collect()
    }

    async fn begin_fulfillment(&self) -> Result<Box<dyn FulfillmentTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgFulfillmentTx { tx }))
    }
}

/// Unit of work over a single database transaction. The order row is
/// locked with `SELECT ... FOR UPDATE`; stock decrements are guarded
/// by the `stock >= quantity` predicate so a racing decrement aborts
/// instead of going negative.
struct PgFulfillmentTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl FulfillmentTx for PgFulfillmentTx {
    async fn order_for_update(&mut self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("{SELECT_ORDER} WHERE id = $1 FOR UPDATE"))
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;

        match row {
            Some(row) => {
                let mut order = PostgresStore::row_to_order_header(&row)?;
                order.items = PostgresStore::load_items(&mut *self.tx, order.id).await?;
                Ok(Some(order))
            }
            None => Ok(None),
        }
    }

    async fn insert_shipment(&mut self, shipment: NewShipment) -> Result<Shipment> {
        let id = ShipmentId::new();
        let created_at = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO shipments (
                id, order_id, carrier, service, tracking_number, label_url,
                label_data, label_format, cost_cents, currency, created_by, created_at
            )
            VALUES ($1, $2, $3, $4, $5, NULL, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(id.as_uuid())
        .bind(shipment.order_id.as_uuid())
        .bind(&shipment.carrier)
        .bind(&shipment.service)
        .bind(&shipment.tracking_number)
        .bind(&shipment.label_data)
        .bind(shipment.label_format.as_str())
        .bind(shipment.cost.cents())
        .bind(&shipment.currency)
        .bind(shipment.created_by.as_uuid())
        .bind(created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(Shipment {
            id,
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
            created_at,
        })
    }

    async fn set_label_url(&mut self, id: ShipmentId, url: &str) -> Result<()> {
        let result = sqlx::query("UPDATE shipments SET label_url = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(url)
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("shipment", id));
        }
        Ok(())
    }

    async fn decrement_stock(&mut self, product_id: ProductId, quantity: u32) -> Result<()> {
        let delta = i64::from(quantity);
        let result = sqlx::query("UPDATE products SET stock = stock - $2 WHERE id = $1 AND stock >= $2")
            .bind(product_id.as_uuid())
            .bind(delta)
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            // Distinguish a missing product from a stock conflict.
            let row = sqlx::query("SELECT sku, stock FROM products WHERE id = $1")
                .bind(product_id.as_uuid())
                .fetch_optional(&mut *self.tx)
                .await?
                .ok_or_else(|| StoreError::not_found("product", product_id))?;

            return Err(StoreError::StockConflict {
                sku: Sku::new(row.try_get::<String, _>("sku")?),
                requested: quantity,
                available: row.try_get("stock")?,
            });
        }
        Ok(())
    }

    async fn append_ledger(&mut self, entry: NewLedgerEntry) -> Result<()> {
        let record = entry.into_entry();
        sqlx::query(
            r#"
            INSERT INTO inventory_ledger (id, product_id, quantity, kind, note, actor, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(record.id)
        .bind(record.product_id.as_uuid())
        .bind(record.quantity)
        .bind(record.kind.as_str())
        .bind(&record.note)
        .bind(record.actor.as_uuid())
        .bind(record.recorded_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn set_order_status(&mut self, id: OrderId, status: OrderStatus) -> Result<()> {
        let result = sqlx::query("UPDATE orders SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(status.as_str())
            .bind(Utc::now())
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("order", id));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
