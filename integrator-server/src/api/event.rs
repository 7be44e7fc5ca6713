//! Event broker API.
//!
//! # Endpoints
//!
//! - `POST /publish`       – publish an event (and its reactions)
//! - `GET  /events`        – recent events, optionally filtered
//! - `POST /subscribe`     – register a webhook subscription
//! - `GET  /subscriptions` – list subscriptions
//! - `GET  /rules`         – the reaction rule table
//! - `GET  /health`        – broker liveness
//! - `POST /unified`       – consent-gated event from the unified core

use axum::{
    Json, Router,
    extract::State,
    response::IntoResponse,
    routing::{get, post},
};
use integrator_core::events::{EventQuery, NewEvent, Priority};
use integrator_sdk::objects::gateway::{BrokerHealthResponse, RulesResponse};
use integrator_sdk::objects::subscription::{SubscribeResponse, SubscriptionsResponse};
use integrator_sdk::objects::{
    EventListQuery, EventListResponse, Payload, PublishEventRequest, PublishEventResponse,
    Subscription, UnifiedEventRequest, UnifiedEventResponse, normalize_limit,
};
use serde_json::Value;
use time::OffsetDateTime;

use crate::api::ApiError;
use crate::api::extractors::{JsonBody, QueryParams};
use crate::state::AppState;

const UNIFIED_SOURCE: &str = "unified_core";

/// Build the event router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/publish", post(publish))
        .route("/events", get(events))
        .route("/subscribe", post(subscribe))
        .route("/subscriptions", get(subscriptions))
        .route("/rules", get(rules))
        .route("/health", get(health))
        .route("/unified", post(unified))
}

/// `POST /publish`: publish an event.
async fn publish(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<PublishEventRequest>,
) -> Result<Json<PublishEventResponse>, ApiError> {
    let result = state.broker.publish_request(request).await?;
    Ok(Json(result.into()))
}

/// `GET /events?limit=&system_name=&event_type=`: most recent matching
/// events, oldest first.
async fn events(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<EventListQuery>,
) -> impl IntoResponse {
    let query = EventQuery {
        limit: normalize_limit(query.limit),
        target_system: query.system_name.filter(|s| !s.is_empty()),
        event_type: query.event_type.filter(|s| !s.is_empty()),
    };
    let events = state.broker.store().query(&query).await;
    Json(EventListResponse {
        count: events.len(),
        events,
    })
}

async fn subscribe(
    State(state): State<AppState>,
    JsonBody(subscription): JsonBody<Subscription>,
) -> Result<Json<SubscribeResponse>, ApiError> {
    if subscription.system_name.trim().is_empty() {
        return Err(ApiError::Validation("system_name is required".to_string()));
    }
    let system = subscription.system_name.clone();
    let replaced = state.broker.subscribe(subscription).await;
    Ok(Json(SubscribeResponse {
        status: if replaced { "updated" } else { "subscribed" }.to_string(),
        system,
    }))
}

async fn subscriptions(State(state): State<AppState>) -> Json<SubscriptionsResponse> {
    Json(SubscriptionsResponse {
        subscriptions: state.broker.subscriptions().await,
    })
}

async fn rules(State(state): State<AppState>) -> Json<RulesResponse> {
    Json(RulesResponse {
        rules: state.broker.rules().rules().iter().map(|r| r.view()).collect(),
    })
}

async fn health(State(state): State<AppState>) -> Json<BrokerHealthResponse> {
    let running = state.broker.is_running().await;
    Json(BrokerHealthResponse {
        status: if running { "healthy" } else { "stopped" }.to_string(),
        subscribers: state.broker.subscription_registry().len().await,
        events_stored: state.broker.store().len().await,
        timestamp: OffsetDateTime::now_utc(),
    })
}

/// `POST /unified`: publish an event on behalf of the unified core.
///
/// Refused with 403 when the user has not given consent. The whole request
/// becomes the payload of a high priority event.
async fn unified(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<UnifiedEventRequest>,
) -> Result<Json<UnifiedEventResponse>, ApiError> {
    if !request.consent_flag {
        return Err(ApiError::ComplianceDenied("Consent required".to_string()));
    }

    let payload = match serde_json::to_value(&request) {
        Ok(Value::Object(map)) => map,
        Ok(_) => Payload::new(),
        Err(e) => return Err(ApiError::Internal(e.to_string())),
    };
    let event = NewEvent::new(&request.event_type, UNIFIED_SOURCE)
        .priority(Priority::High)
        .payload(payload)
        .correlated_with(&request.task_id);
    let result = state.broker.publish(event).await?;

    tracing::info!(
        task_id = %request.task_id,
        user_id = %request.user_id,
        event_id = %result.event_id,
        "Unified event published"
    );
    Ok(Json(UnifiedEventResponse {
        status: "success".to_string(),
        event_id: result.event_id,
        processed_at: OffsetDateTime::now_utc(),
    }))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::api::testing::{call, unreachable_state};
    use crate::server::build_router;

    #[tokio::test]
    async fn test_publish_then_list_recent() {
        let state = unreachable_state();

        let (status, body) = call(
            build_router(state.clone()),
            "POST",
            "/event/publish",
            Some(json!({
                "event_type": "scenario_test",
                "source_system": "qa",
                "target_systems": ["crm"],
                "payload": {"k": 1},
            })),
        )
        .await;
        assert_eq!(status, 200);
        let event_id = body["event_id"].as_str().unwrap().to_string();
        assert_eq!(body["derived_event_ids"], json!([]));

        let (status, body) = call(build_router(state), "GET", "/event/events?limit=5", None).await;
        assert_eq!(status, 200);
        let events = body["events"].as_array().unwrap();
        assert_eq!(events.last().unwrap()["event_id"], json!(event_id));
        assert_eq!(events.last().unwrap()["priority"], json!("medium"));
        assert_eq!(body["count"], json!(events.len()));
    }

    #[tokio::test]
    async fn test_publish_without_event_type_is_rejected() {
        let state = unreachable_state();
        let (status, body) = call(
            build_router(state.clone()),
            "POST",
            "/event/publish",
            Some(json!({})),
        )
        .await;
        assert_eq!(status, 400);
        assert_eq!(body["status"], json!("error"));
        assert!(state.broker.store().is_empty().await);

        let (status, _) = call(build_router(state), "POST", "/event/publish", Some(json!([1]))).await;
        assert_eq!(status, 400);
    }

    #[tokio::test]
    async fn test_events_filter_by_system_and_type() {
        let state = unreachable_state();
        for (event_type, target) in [("a", "crm"), ("b", "crm"), ("a", "logistics")] {
            let (status, _) = call(
                build_router(state.clone()),
                "POST",
                "/event/publish",
                Some(json!({
                    "event_type": event_type,
                    "source_system": "qa",
                    "target_systems": [target],
                })),
            )
            .await;
            assert_eq!(status, 200);
        }

        let (_, body) = call(
            build_router(state.clone()),
            "GET",
            "/event/events?system_name=crm&event_type=a",
            None,
        )
        .await;
        assert_eq!(body["count"], json!(1));

        let (status, _) = call(build_router(state), "GET", "/event/events?limit=abc", None).await;
        assert_eq!(status, 400);
    }

    #[tokio::test]
    async fn test_subscribe_and_list() {
        let state = unreachable_state();
        let subscription = json!({
            "system_name": "crm",
            "event_types": ["task_completed"],
            "webhook_url": "http://crm.local/hook",
        });

        let (_, body) = call(
            build_router(state.clone()),
            "POST",
            "/event/subscribe",
            Some(subscription.clone()),
        )
        .await;
        assert_eq!(body, json!({"status": "subscribed", "system": "crm"}));

        let (_, body) = call(
            build_router(state.clone()),
            "POST",
            "/event/subscribe",
            Some(subscription),
        )
        .await;
        assert_eq!(body["status"], json!("updated"));

        let (_, body) = call(build_router(state), "GET", "/event/subscriptions", None).await;
        assert_eq!(body["subscriptions"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rules_and_broker_health() {
        let state = unreachable_state();
        let (_, body) = call(build_router(state.clone()), "GET", "/event/rules", None).await;
        assert_eq!(body["rules"].as_array().unwrap().len(), 18);
        assert_eq!(body["rules"][0]["trigger"], json!("task_updated"));

        let (_, body) = call(build_router(state.clone()), "GET", "/event/health", None).await;
        assert_eq!(body["status"], json!("stopped"));

        state.broker.start().await;
        let (_, body) = call(build_router(state.clone()), "GET", "/event/health", None).await;
        assert_eq!(body["status"], json!("healthy"));
        state.broker.stop().await;
    }

    #[tokio::test]
    async fn test_unified_requires_consent() {
        let state = unreachable_state();
        let (status, body) = call(
            build_router(state.clone()),
            "POST",
            "/event/unified",
            Some(json!({
                "task_id": "t-1",
                "user_id": "u-1",
                "event_type": "rl_feedback",
                "consent_flag": false,
            })),
        )
        .await;
        assert_eq!(status, 403);
        assert_eq!(body["detail"], json!("Consent required"));
        assert!(state.broker.store().is_empty().await);

        let (status, body) = call(
            build_router(state.clone()),
            "POST",
            "/event/unified",
            Some(json!({
                "task_id": "t-1",
                "user_id": "u-1",
                "event_type": "rl_feedback",
                "rl_score": 0.8,
            })),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(body["status"], json!("success"));

        let record = state
            .broker
            .store()
            .get(body["event_id"].as_str().unwrap())
            .await
            .unwrap();
        assert_eq!(record.source_system, "unified_core");
        assert_eq!(record.correlation_id, "t-1");
        assert_eq!(record.payload["rl_score"], json!(0.8));
    }
}
