//! CRM proxy.
//!
//! # Endpoints
//!
//! - `GET|POST /accounts`
//! - `GET|POST /leads`
//! - `GET|POST /opportunities`
//! - `PUT      /opportunities/{opportunity_id}`
//! - `POST     /webhooks/events`

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post, put},
};
use integrator_core::events::{Payload, Priority};
use integrator_core::services::{TransactionCheck, Upstream};
use integrator_sdk::objects::WebhookAck;
use serde_json::Value;

use crate::api::extractors::JsonBody;
use crate::api::{
    ApiError, PrimaryEvent, exchange_payload, publish_exchange, receive_webhook, segment,
};
use crate::state::AppState;

const SERVICE: Upstream = Upstream::Crm;

const ACCOUNT_CREATED: PrimaryEvent = PrimaryEvent {
    event_type: "account_created",
    targets: &["task_manager"],
    priority: Priority::Medium,
};
const LEAD_CREATED: PrimaryEvent = PrimaryEvent {
    event_type: "lead_created",
    targets: &["task_manager"],
    priority: Priority::Medium,
};
const OPPORTUNITY_CREATED: PrimaryEvent = PrimaryEvent {
    event_type: "opportunity_created",
    targets: &["task_manager"],
    priority: Priority::High,
};
const OPPORTUNITY_UPDATED: PrimaryEvent = PrimaryEvent {
    event_type: "opportunity_updated",
    targets: &["task_manager"],
    priority: Priority::Medium,
};

/// Build the CRM router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/accounts", get(list_accounts).post(create_account))
        .route("/leads", get(list_leads).post(create_lead))
        .route(
            "/opportunities",
            get(list_opportunities).post(create_opportunity),
        )
        .route(
            "/opportunities/{opportunity_id}",
            put(update_opportunity),
        )
        .route("/webhooks/events", post(webhook))
}

async fn create_and_publish(
    state: &AppState,
    path: &str,
    body: Payload,
    primary: &PrimaryEvent,
) -> Result<Json<Value>, ApiError> {
    let response = state
        .upstream
        .post(SERVICE, path, &Value::Object(body.clone()))
        .await?;
    publish_exchange(state, SERVICE, primary, exchange_payload(body, response.clone(), &[])).await?;
    Ok(Json(response))
}

async fn list_accounts(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    Ok(Json(state.upstream.get(SERVICE, "/accounts").await?))
}

/// `POST /accounts`: the account holder must have consented to account
/// data processing.
async fn create_account(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<Payload>,
) -> Result<Json<Value>, ApiError> {
    state
        .compliance
        .check_data_privacy(&body, "account_data")
        .await?;
    create_and_publish(&state, "/accounts", body, &ACCOUNT_CREATED).await
}

async fn list_leads(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    Ok(Json(state.upstream.get(SERVICE, "/leads").await?))
}

async fn create_lead(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<Payload>,
) -> Result<Json<Value>, ApiError> {
    create_and_publish(&state, "/leads", body, &LEAD_CREATED).await
}

async fn list_opportunities(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    Ok(Json(state.upstream.get(SERVICE, "/opportunities").await?))
}

/// `POST /opportunities`: the deal is logged with the compliance service
/// first and refused if it is not accepted.
async fn create_opportunity(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<Payload>,
) -> Result<Json<Value>, ApiError> {
    let mut check = TransactionCheck::from_body("opportunity", &body);
    if let Some(account) = body.get("account_name").and_then(Value::as_str) {
        check.parties = vec![account.to_string()];
    }
    state.compliance.check_transaction(&check).await?;
    create_and_publish(&state, "/opportunities", body, &OPPORTUNITY_CREATED).await
}

/// `PUT /opportunities/{opportunity_id}`: closing a deal derives
/// `opportunity_won` or `opportunity_lost`.
async fn update_opportunity(
    State(state): State<AppState>,
    Path(opportunity_id): Path<String>,
    JsonBody(body): JsonBody<Payload>,
) -> Result<Json<Value>, ApiError> {
    let response = state
        .upstream
        .put(
            SERVICE,
            &format!("/opportunities/{}", segment(&opportunity_id)),
            &Value::Object(body.clone()),
        )
        .await?;
    let payload = exchange_payload(
        body,
        response.clone(),
        &[("opportunity_id", &opportunity_id)],
    );
    publish_exchange(&state, SERVICE, &OPPORTUNITY_UPDATED, payload).await?;
    Ok(Json(response))
}

async fn webhook(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<Payload>,
) -> Result<Json<WebhookAck>, ApiError> {
    receive_webhook(&state, "crm_webhook_received", SERVICE.key(), body).await
}

#[cfg(test)]
mod tests {
    use axum::{
        Json, Router,
        extract::Path,
        http::StatusCode,
        routing::{get, post, put},
    };
    use serde_json::{Value, json};

    use crate::api::testing::{call, serve, state_with};
    use crate::server::build_router;

    async fn crm_service() -> url::Url {
        let echo = |Json(body): Json<Value>| async move { Json(json!({"id": "c1", "data": body})) };
        let app = Router::new()
            .route("/accounts", post(echo))
            .route("/leads", get(|| async { Json(json!([])) }).post(echo))
            .route("/opportunities", post(echo))
            .route(
                "/opportunities/{id}",
                put(|Path(id): Path<String>, Json(body): Json<Value>| async move {
                    Json(json!({"opportunity_id": id, "stage": body["stage"]}))
                }),
            );
        serve(app).await
    }

    /// Compliance double: `alice` consented to everything, `bob` to
    /// nothing. Transactions above 1000 are rejected.
    async fn compliance_service() -> url::Url {
        let app = Router::new()
            .route(
                "/consent/{user}",
                get(|Path(user): Path<String>| async move {
                    let categories = if user == "alice" { json!(["all"]) } else { json!([]) };
                    Json(json!({"monitoring_enabled": true, "data_categories": categories}))
                }),
            )
            .route(
                "/ems-forward",
                post(|Json(body): Json<Value>| async move {
                    let amount = body["details"]["amount"].as_f64().unwrap_or(0.0);
                    if amount > 1000.0 {
                        StatusCode::UNPROCESSABLE_ENTITY
                    } else {
                        StatusCode::OK
                    }
                }),
            );
        serve(app).await
    }

    #[tokio::test]
    async fn test_closed_won_derives_opportunity_won() {
        let state = state_with(&crm_service().await, None);
        let (status, body) = call(
            build_router(state.clone()),
            "PUT",
            "/crm/opportunities/op-7",
            Some(json!({"stage": "closed_won"})),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(body["opportunity_id"], json!("op-7"));

        let events = state.broker.store().recent(10).await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "opportunity_updated");
        assert_eq!(events[0].source_system, "crm");
        assert_eq!(events[1].event_type, "opportunity_won");
        assert_eq!(events[1].target_systems, vec!["task_manager", "logistics"]);
    }

    #[tokio::test]
    async fn test_account_privacy_check() {
        let compliance = compliance_service().await;
        let state = state_with(&crm_service().await, Some(&compliance));

        let (status, _) = call(
            build_router(state.clone()),
            "POST",
            "/crm/accounts",
            Some(json!({"name": "Acme", "user_id": "bob"})),
        )
        .await;
        assert_eq!(status, 403);
        assert!(state.broker.store().is_empty().await);

        let (status, body) = call(
            build_router(state.clone()),
            "POST",
            "/crm/accounts",
            Some(json!({"name": "Acme", "user_id": "alice"})),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(body["data"]["name"], json!("Acme"));

        let events = state.broker.store().recent(10).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "account_created");
        assert_eq!(events[0].priority, integrator_sdk::objects::Priority::Medium);
    }

    #[tokio::test]
    async fn test_opportunity_transaction_check() {
        let compliance = compliance_service().await;
        let state = state_with(&crm_service().await, Some(&compliance));

        let (status, body) = call(
            build_router(state.clone()),
            "POST",
            "/crm/opportunities",
            Some(json!({"account_name": "Acme", "amount": 5000})),
        )
        .await;
        assert_eq!(status, 403);
        assert_eq!(body["status"], json!("error"));
        assert!(state.broker.store().is_empty().await);

        let (status, _) = call(
            build_router(state.clone()),
            "POST",
            "/crm/opportunities",
            Some(json!({"account_name": "Acme", "amount": 500})),
        )
        .await;
        assert_eq!(status, 200);
        let events = state.broker.store().recent(10).await;
        assert_eq!(events[0].event_type, "opportunity_created");
        assert_eq!(events[0].priority, integrator_sdk::objects::Priority::High);
    }

    #[tokio::test]
    async fn test_unreachable_compliance_is_bad_gateway() {
        let closed: url::Url = crate::api::testing::CLOSED.parse().unwrap();
        let state = state_with(&crm_service().await, Some(&closed));
        let (status, _) = call(
            build_router(state.clone()),
            "POST",
            "/crm/accounts",
            Some(json!({"user_id": "alice"})),
        )
        .await;
        assert_eq!(status, 502);
        assert!(state.broker.store().is_empty().await);
    }

    #[tokio::test]
    async fn test_lead_conversion_webhook() {
        let state = state_with(&crm_service().await, None);
        let (status, _) = call(
            build_router(state.clone()),
            "POST",
            "/crm/webhooks/events",
            Some(json!({"event_type": "lead_converted", "payload": {"lead_id": "l1"}})),
        )
        .await;
        assert_eq!(status, 200);

        let events = state.broker.store().recent(10).await;
        assert_eq!(events[1].event_type, "lead_to_opportunity");
        assert_eq!(events[1].payload["lead_id"], json!("l1"));
        assert_eq!(events[1].priority, integrator_sdk::objects::Priority::High);
    }

    #[tokio::test]
    async fn test_refused_account_change_raises_violation() {
        let compliance = compliance_service().await;
        let state = state_with(&crm_service().await, Some(&compliance));

        let (status, _) = call(
            build_router(state.clone()),
            "POST",
            "/crm/webhooks/events",
            Some(json!({
                "event_type": "account_status_changed",
                "payload": {"account_id": "a1", "amount": 5000, "task_id": "t-9"}
            })),
        )
        .await;
        assert_eq!(status, 200);

        let events = state.broker.store().recent(10).await;
        let types: Vec<_> = events.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(
            types,
            vec!["crm_webhook_received", "account_status_changed", "compliance_violation"]
        );
        let violation = &events[2];
        assert_eq!(violation.priority, integrator_sdk::objects::Priority::High);
        assert_eq!(violation.correlation_id, events[0].correlation_id);
        assert_eq!(
            violation.payload["original_event"]["payload"]["account_id"],
            json!("a1")
        );

        // Below the limit the change passes without a violation.
        let (_, _) = call(
            build_router(state.clone()),
            "POST",
            "/crm/webhooks/events",
            Some(json!({
                "event_type": "account_status_changed",
                "payload": {"account_id": "a2", "amount": 10}
            })),
        )
        .await;
        assert_eq!(state.broker.store().len().await, 5);
    }
}
