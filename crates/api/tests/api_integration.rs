//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use api::AppState;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{Money, ProductId, Sku, UserId};
use domain::{Address, Dimensions, LabelFormat, NewShipment, OrderStatus, Product};
use metrics_exporter_prometheus::PrometheusHandle;
use store::{OrderDraft, OrderItemDraft};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

const WEBHOOK_SECRET: &str = "test-webhook-secret";

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> (axum::Router, Arc<AppState>) {
    let state = api::create_default_state(WEBHOOK_SECRET.to_string());
    let app = api::create_app(Arc::clone(&state), get_metrics_handle());
    (app, state)
}

async fn seed_product(state: &AppState, sku: &str, stock: i64) -> Product {
    let product = Product {
        id: ProductId::new(),
        sku: Sku::new(sku),
        name: format!("Product {sku}"),
        dimensions: Dimensions {
            length_in: 6.0,
            width_in: 4.0,
            height_in: 2.0,
        },
        weight_lb: 1.0,
        stock,
        low_stock_threshold: 1,
        platform_product_id: None,
        platform_variant_id: None,
    };
    state.store.insert_product(product.clone()).await.unwrap();
    product
}

async fn seed_order(state: &AppState, number: &str, items: &[(&str, u32)]) -> domain::Order {
    let draft = OrderDraft {
        external_id: format!("ext-{number}"),
        order_number: number.to_string(),
        customer_name: "Jane Doe".to_string(),
        customer_email: "jane@example.com".to_string(),
        shipping_address: Address {
            name: "Jane Doe".to_string(),
            line1: "1 Main St".to_string(),
            line2: None,
            city: "Portland".to_string(),
            region: "OR".to_string(),
            postal_code: "97201".to_string(),
            country: "US".to_string(),
        },
        total: Money::from_cents(4500),
        currency: "USD".to_string(),
        items: items
            .iter()
            .enumerate()
            .map(|(index, (sku, quantity))| OrderItemDraft {
                external_line_id: format!("line-{index}"),
                sku: Sku::new(*sku),
                name: format!("Item {sku}"),
                quantity: *quantity,
                unit_price: Money::from_cents(1500),
            })
            .collect(),
    };
    state.store.upsert_order(draft).await.unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn signed_webhook(payload: &serde_json::Value) -> Request<Body> {
    let body = serde_json::to_vec(payload).unwrap();
    let signature = api::signature::sign(WEBHOOK_SECRET, &body);
    Request::builder()
        .method("POST")
        .uri("/webhooks/orders")
        .header("content-type", "application/json")
        .header("x-webhook-signature", signature)
        .body(Body::from(body))
        .unwrap()
}

fn webhook_payload() -> serde_json::Value {
    serde_json::json!({
        "id": "ext-9001",
        "order_number": "#9001",
        "customer_name": "Jane Doe",
        "customer_email": "jane@example.com",
        "total": "45.00",
        "currency": "USD",
        "shipping_address": {
            "name": "Jane Doe",
            "line1": "1 Main St",
            "city": "Portland",
            "region": "OR",
            "postal_code": "97201",
            "country": "US"
        },
        "line_items": [
            { "id": "li-1", "sku": "WIDGET-1", "name": "Widget", "quantity": 3, "price": "15.00" }
        ]
    })
}

#[tokio::test]
async fn test_health_check() {
    let (app, _state) = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_get_order_and_not_found() {
    let (app, state) = setup();
    seed_product(&state, "WIDGET-1", 5).await;
    let order = seed_order(&state, "#2001", &[("WIDGET-1", 2)]).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/orders/{}", order.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["order_number"], "#2001");
    assert_eq!(json["status"], "Pending");
    assert_eq!(json["items"][0]["linked"], true);

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/orders/{}", uuid::Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_hold_resume_cancel_flow() {
    let (app, state) = setup();
    let order = seed_order(&state, "#2002", &[]).await;

    for (path, expected) in [
        ("hold", "OnHold"),
        ("resume", "Pending"),
        ("cancel", "Cancelled"),
    ] {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/orders/{}/{}", order.id, path))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], expected);
    }
}

#[tokio::test]
async fn test_cancel_shipped_order_conflicts() {
    let (app, state) = setup();
    let order = seed_order(&state, "#2003", &[]).await;
    state
        .store
        .set_order_status(order.id, OrderStatus::Pending, OrderStatus::Shipped)
        .await
        .unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/orders/{}/cancel", order.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_fulfill_end_to_end() {
    let (app, state) = setup();
    let product = seed_product(&state, "WIDGET-1", 5).await;
    let order = seed_order(&state, "#1001", &[("WIDGET-1", 3)]).await;

    let body = serde_json::json!({ "carrier": "UPS", "service_code": "03" });
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/orders/{}/fulfill", order.id))
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["carrier"], "UPS");
    assert!(json["tracking_number"].as_str().unwrap().starts_with("1Z"));
    assert!(json["notify_error"].is_null());

    let updated = state.store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(updated.status, OrderStatus::Shipped);
    let stocked = state.store.get_product(product.id).await.unwrap().unwrap();
    assert_eq!(stocked.stock, 2);
}

#[tokio::test]
async fn test_fulfill_short_stock_returns_unprocessable() {
    let (app, state) = setup();
    seed_product(&state, "WIDGET-1", 1).await;
    let order = seed_order(&state, "#2004", &[("WIDGET-1", 3)]).await;

    let body = serde_json::json!({ "carrier": "UPS", "service_code": "03" });
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/orders/{}/fulfill", order.id))
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert_eq!(json["shortages"][0]["sku"], "WIDGET-1");
    assert_eq!(json["shortages"][0]["required"], 3);
    assert_eq!(json["shortages"][0]["available"], 1);
}

#[tokio::test]
async fn test_rates_sorted_ascending() {
    let (app, state) = setup();
    seed_product(&state, "WIDGET-1", 5).await;
    let order = seed_order(&state, "#2005", &[("WIDGET-1", 1)]).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/orders/{}/rates", order.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["live"], true);
    let offers = json["offers"].as_array().unwrap();
    assert!(!offers.is_empty());
    let prices: Vec<i64> = offers
        .iter()
        .map(|offer| offer["price"].as_i64().unwrap())
        .collect();
    let mut sorted = prices.clone();
    sorted.sort_unstable();
    assert_eq!(prices, sorted);
}

#[tokio::test]
async fn test_label_round_trip_and_content_types() {
    let (app, state) = setup();
    let order = seed_order(&state, "#2006", &[]).await;

    let cases = [
        (LabelFormat::Png, "image/png"),
        (LabelFormat::Gif, "image/gif"),
        (LabelFormat::Pdf, "application/pdf"),
        (LabelFormat::Jpeg, "image/jpeg"),
        (LabelFormat::Zpl, "application/octet-stream"),
    ];

    for (format, content_type) in cases {
        let stored_bytes = format!("label-bytes-{content_type}").into_bytes();
        let mut tx = state.store.begin_fulfillment().await.unwrap();
        let shipment = tx
            .insert_shipment(NewShipment {
                order_id: order.id,
                carrier: "UPS".to_string(),
                service: "03".to_string(),
                tracking_number: format!("1Z-{content_type}"),
                label_data: stored_bytes.clone(),
                label_format: format,
                cost: Money::from_cents(1235),
                currency: "USD".to_string(),
                created_by: UserId::new(),
            })
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/shipments/{}/label", shipment.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"].to_str().unwrap(),
            content_type
        );
        assert_eq!(
            response.headers()["content-disposition"].to_str().unwrap(),
            "inline"
        );
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(bytes.as_ref(), stored_bytes.as_slice());
    }
}

#[tokio::test]
async fn test_label_attachment_disposition() {
    let (app, state) = setup();
    let order = seed_order(&state, "#2007", &[]).await;

    let mut tx = state.store.begin_fulfillment().await.unwrap();
    let shipment = tx
        .insert_shipment(NewShipment {
            order_id: order.id,
            carrier: "USPS".to_string(),
            service: "PRIORITY_MAIL".to_string(),
            tracking_number: "9400100000".to_string(),
            label_data: b"pdf-bytes".to_vec(),
            label_format: LabelFormat::Pdf,
            cost: Money::from_cents(790),
            currency: "USD".to_string(),
            created_by: UserId::new(),
        })
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!(
                    "/shipments/{}/label?disposition=attachment",
                    shipment.id
                ))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response.headers()["content-disposition"].to_str().unwrap();
    assert!(disposition.starts_with("attachment"));
    assert!(disposition.contains("9400100000"));
    assert!(disposition.ends_with(".pdf\""));
}

#[tokio::test]
async fn test_label_missing_shipment_is_not_found() {
    let (app, _state) = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/shipments/{}/label", uuid::Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_webhook_creates_order() {
    let (app, state) = setup();
    seed_product(&state, "WIDGET-1", 5).await;

    let response = app
        .oneshot(signed_webhook(&webhook_payload()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "Pending");

    let order = state
        .store
        .get_order_by_external_id("ext-9001")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.order_number, "#9001");
    assert_eq!(order.items.len(), 1);
    assert!(order.items[0].product_id.is_some());
    assert_eq!(order.total, Money::from_cents(4500));
}

#[tokio::test]
async fn test_webhook_replay_upserts_instead_of_duplicating() {
    let (app, state) = setup();

    let response = app
        .clone()
        .oneshot(signed_webhook(&webhook_payload()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let mut replay = webhook_payload();
    replay["customer_name"] = serde_json::json!("Janet Doe");
    let response = app.oneshot(signed_webhook(&replay)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let orders = state.store.list_orders().await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].customer_name, "Janet Doe");
}

#[tokio::test]
async fn test_webhook_rejects_bad_or_missing_signature() {
    let (app, state) = setup();
    let body = serde_json::to_vec(&webhook_payload()).unwrap();

    let tampered = Request::builder()
        .method("POST")
        .uri("/webhooks/orders")
        .header("content-type", "application/json")
        .header("x-webhook-signature", api::signature::sign("wrong", &body))
        .body(Body::from(body.clone()))
        .unwrap();
    let response = app.clone().oneshot(tampered).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let unsigned = Request::builder()
        .method("POST")
        .uri("/webhooks/orders")
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap();
    let response = app.oneshot(unsigned).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    assert!(state.store.list_orders().await.unwrap().is_empty());
}
