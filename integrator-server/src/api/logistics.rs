//! Logistics proxy.
//!
//! # Endpoints
//!
//! - `GET|POST /procurement`           – upstream `/procurement/orders`
//! - `GET|POST /delivery`              – upstream `/delivery/orders`
//! - `GET      /inventory`
//! - `PUT      /inventory/{product_id}`
//! - `POST     /webhooks/events`

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post, put},
};
use integrator_core::entities::{AssignDelivery, ReleaseDelivery};
use integrator_core::events::{Payload, Priority};
use integrator_core::services::{TransactionCheck, Upstream};
use integrator_sdk::objects::WebhookAck;
use kanau::processor::Processor;
use serde_json::{Value, json};

use crate::api::extractors::JsonBody;
use crate::api::{
    ApiError, PrimaryEvent, exchange_payload, publish_exchange, receive_webhook, segment,
};
use crate::state::AppState;

const SERVICE: Upstream = Upstream::Logistics;

/// Stock at or below this level is low when the service does not say
/// otherwise.
const DEFAULT_MIN_STOCK_LEVEL: f64 = 10.0;

const PROCUREMENT_ORDER_CREATED: PrimaryEvent = PrimaryEvent {
    event_type: "procurement_order_created",
    targets: &["crm", "task_manager"],
    priority: Priority::High,
};
const DELIVERY_CREATED: PrimaryEvent = PrimaryEvent {
    event_type: "delivery_created",
    targets: &["crm", "task_manager"],
    priority: Priority::Medium,
};
const INVENTORY_UPDATED: PrimaryEvent = PrimaryEvent {
    event_type: "inventory_updated",
    targets: &["procurement"],
    priority: Priority::Low,
};

/// Build the logistics router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/procurement",
            get(list_procurement_orders).post(create_procurement_order),
        )
        .route("/delivery", get(list_deliveries).post(create_delivery))
        .route("/inventory", get(list_inventory))
        .route("/inventory/{product_id}", put(update_inventory))
        .route("/webhooks/events", post(webhook))
}

async fn list_procurement_orders(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    Ok(Json(state.upstream.get(SERVICE, "/procurement/orders").await?))
}

/// `POST /procurement`: purchase orders are logged with the compliance
/// service before they are placed.
async fn create_procurement_order(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<Payload>,
) -> Result<Json<Value>, ApiError> {
    let mut check = TransactionCheck::from_body("procurement_order", &body);
    if let Some(total) = body.get("total_value") {
        check.amount = total.clone();
    }
    if let Some(supplier) = body.get("supplier_id").and_then(Value::as_str) {
        check.parties = vec![supplier.to_string()];
    }
    state.compliance.check_transaction(&check).await?;

    let response = state
        .upstream
        .post(SERVICE, "/procurement/orders", &Value::Object(body.clone()))
        .await?;
    let payload = exchange_payload(body, response.clone(), &[]);
    publish_exchange(&state, SERVICE, &PROCUREMENT_ORDER_CREATED, payload).await?;
    Ok(Json(response))
}

async fn list_deliveries(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    Ok(Json(state.upstream.get(SERVICE, "/delivery/orders").await?))
}

/// `POST /delivery`: the delivery is assigned to the best available
/// employee before it is sent to the logistics service. A rejected
/// delivery gives the slot back.
async fn create_delivery(
    State(state): State<AppState>,
    JsonBody(mut body): JsonBody<Payload>,
) -> Result<Json<Value>, ApiError> {
    let assignment = match state.roster.process(AssignDelivery).await {
        Ok(assignment) => assignment,
        Err(never) => match never {},
    };
    let assigned =
        serde_json::to_value(&assignment).map_err(|e| ApiError::Internal(e.to_string()))?;
    body.insert("assigned_employee".to_string(), assigned.clone());

    let response = match state
        .upstream
        .post(SERVICE, "/delivery/orders", &Value::Object(body.clone()))
        .await
    {
        Ok(response) => response,
        Err(e) => {
            let release = ReleaseDelivery {
                employee_id: assignment.employee_id,
            };
            if let Err(never) = state.roster.process(release).await {
                match never {}
            }
            return Err(e.into());
        }
    };

    let mut payload = exchange_payload(body, response.clone(), &[]);
    payload.insert("assigned_employee".to_string(), assigned);
    payload.insert("assignment_reason".to_string(), json!("performance_based"));
    publish_exchange(&state, SERVICE, &DELIVERY_CREATED, payload).await?;
    Ok(Json(response))
}

async fn list_inventory(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    Ok(Json(state.upstream.get(SERVICE, "/inventory").await?))
}

/// `PUT /inventory/{product_id}`: the event carries `low_stock`, which
/// derives `inventory_low` when set.
async fn update_inventory(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    JsonBody(body): JsonBody<Payload>,
) -> Result<Json<Value>, ApiError> {
    let response = state
        .upstream
        .put(
            SERVICE,
            &format!("/inventory/{}", segment(&product_id)),
            &Value::Object(body.clone()),
        )
        .await?;

    let current_stock = response.get("current_stock").cloned().unwrap_or(json!(0));
    let min_stock_level = response
        .get("min_stock_level")
        .cloned()
        .unwrap_or(json!(DEFAULT_MIN_STOCK_LEVEL));
    let low_stock = is_low_stock(&current_stock, &min_stock_level);
    if low_stock {
        tracing::info!(product_id = %product_id, current_stock = %current_stock, "Stock is low");
    }

    let product_name = response.get("product_name").cloned().unwrap_or(Value::Null);
    let mut payload = exchange_payload(body, response.clone(), &[("product_id", &product_id)]);
    payload.insert("current_stock".to_string(), current_stock);
    payload.insert("min_stock_level".to_string(), min_stock_level);
    payload.insert("product_name".to_string(), product_name);
    payload.insert("low_stock".to_string(), Value::Bool(low_stock));
    publish_exchange(&state, SERVICE, &INVENTORY_UPDATED, payload).await?;
    Ok(Json(response))
}

/// Non-numeric stock figures count as zero.
fn is_low_stock(current: &Value, minimum: &Value) -> bool {
    let current = current.as_f64().unwrap_or(0.0);
    let minimum = minimum.as_f64().unwrap_or(DEFAULT_MIN_STOCK_LEVEL);
    current <= minimum
}

async fn webhook(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<Payload>,
) -> Result<Json<WebhookAck>, ApiError> {
    receive_webhook(&state, "logistics_webhook_received", SERVICE.key(), body).await
}
