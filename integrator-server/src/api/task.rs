//! Task service proxy.
//!
//! # Endpoints
//!
//! - `GET|POST /review`
//! - `GET|POST /feedback`
//! - `GET|POST /workflow-state`
//! - `GET|POST /tasks`
//! - `PUT      /tasks/{task_id}`
//! - `POST     /webhooks/events`

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post, put},
};
use integrator_core::events::{Payload, Priority};
use integrator_core::services::Upstream;
use integrator_sdk::objects::WebhookAck;
use serde_json::Value;

use crate::api::extractors::JsonBody;
use crate::api::{
    ApiError, PrimaryEvent, exchange_payload, publish_exchange, receive_webhook, segment,
};
use crate::state::AppState;

const SERVICE: Upstream = Upstream::Task;

const REVIEW_CREATED: PrimaryEvent = PrimaryEvent {
    event_type: "review_created",
    targets: &["crm"],
    priority: Priority::Medium,
};
const FEEDBACK_RECEIVED: PrimaryEvent = PrimaryEvent {
    event_type: "feedback_received",
    targets: &["crm"],
    priority: Priority::Low,
};
const WORKFLOW_STATE_CHANGED: PrimaryEvent = PrimaryEvent {
    event_type: "workflow_state_changed",
    targets: &["crm"],
    priority: Priority::Low,
};
const TASK_CREATED: PrimaryEvent = PrimaryEvent {
    event_type: "task_created",
    targets: &["crm"],
    priority: Priority::Medium,
};
const TASK_UPDATED: PrimaryEvent = PrimaryEvent {
    event_type: "task_updated",
    targets: &["crm"],
    priority: Priority::Low,
};

/// Build the task router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/review", get(list_reviews).post(create_review))
        .route("/feedback", get(list_feedback).post(submit_feedback))
        .route(
            "/workflow-state",
            get(workflow_state).post(change_workflow_state),
        )
        .route("/tasks", get(list_tasks).post(create_task))
        .route("/tasks/{task_id}", put(update_task))
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

async fn list_reviews(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    Ok(Json(state.upstream.get(SERVICE, "/review").await?))
}

async fn create_review(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<Payload>,
) -> Result<Json<Value>, ApiError> {
    create_and_publish(&state, "/review", body, &REVIEW_CREATED).await
}

async fn list_feedback(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    Ok(Json(state.upstream.get(SERVICE, "/feedback").await?))
}

/// `POST /feedback`: complaints and escalations derive further events.
async fn submit_feedback(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<Payload>,
) -> Result<Json<Value>, ApiError> {
    create_and_publish(&state, "/feedback", body, &FEEDBACK_RECEIVED).await
}

async fn workflow_state(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    Ok(Json(state.upstream.get(SERVICE, "/workflow-state").await?))
}

async fn change_workflow_state(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<Payload>,
) -> Result<Json<Value>, ApiError> {
    create_and_publish(&state, "/workflow-state", body, &WORKFLOW_STATE_CHANGED).await
}

async fn list_tasks(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    Ok(Json(state.upstream.get(SERVICE, "/tasks").await?))
}

/// `POST /tasks`: create a task on behalf of `created_by`.
///
/// The creator must pass the compliance access check before the task
/// service is called. Creation is recorded in the audit trail.
async fn create_task(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<Payload>,
) -> Result<Json<Value>, ApiError> {
    let creator = body
        .get("created_by")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    state
        .compliance
        .check_access(&creator, "task_creation", "create")
        .await?;

    let response = create_and_publish(&state, "/tasks", body, &TASK_CREATED).await?;

    let task_id = response
        .get("task_id")
        .or_else(|| response.get("id"))
        .map(|id| match id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_else(|| "unknown".to_string());
    let mut details = Payload::new();
    details.insert("task_data".to_string(), response.0.clone());
    state
        .compliance
        .audit("create", &creator, &format!("task_{task_id}"), details)
        .await;

    Ok(response)
}

/// `PUT /tasks/{task_id}`: status and priority changes derive further
/// events.
async fn update_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    JsonBody(body): JsonBody<Payload>,
) -> Result<Json<Value>, ApiError> {
    let response = state
        .upstream
        .put(
            SERVICE,
            &format!("/tasks/{}", segment(&task_id)),
            &Value::Object(body.clone()),
        )
        .await?;
    let payload = exchange_payload(body, response.clone(), &[("task_id", &task_id)]);
    publish_exchange(&state, SERVICE, &TASK_UPDATED, payload).await?;
    Ok(Json(response))
}

async fn webhook(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<Payload>,
) -> Result<Json<WebhookAck>, ApiError> {
    receive_webhook(&state, "task_webhook_received", SERVICE.key(), body).await
}

#[cfg(test)]
mod tests {
    use axum::{Json, Router, extract::Path, routing::get};
    use serde_json::{Value, json};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::api::testing::{call, serve, state_with, unreachable_state};
    use crate::server::build_router;

    /// Task service double. Counts task creations.
    async fn task_service(created: Arc<AtomicUsize>) -> url::Url {
        let app = Router::new()
            .route(
                "/tasks",
                get(|| async { Json(json!([{"task_id": "1", "status": "open"}])) }).post(
                    move |Json(body): Json<Value>| {
                        let created = created.clone();
                        async move {
                            let n = created.fetch_add(1, Ordering::SeqCst) + 1;
                            Json(json!({"task_id": n.to_string(), "title": body["title"]}))
                        }
                    },
                ),
            )
            .route(
                "/tasks/{task_id}",
                axum::routing::put(|Path(id): Path<String>, Json(body): Json<Value>| async move {
                    Json(json!({"task_id": id, "status": body["status"], "updated": true}))
                }),
            )
            .route(
                "/feedback",
                axum::routing::post(|Json(body): Json<Value>| async move {
                    Json(json!({"feedback_id": "f1", "type": body["type"]}))
                }),
            )
            .route(
                "/workflow-state",
                axum::routing::post(|Json(body): Json<Value>| async move {
                    Json(json!({"workflow_id": "w1", "state": body["state"]}))
                }),
            );
        serve(app).await
    }

    #[tokio::test]
    async fn test_unreachable_task_service_is_bad_gateway() {
        let state = unreachable_state();
        let (status, body) = call(
            build_router(state.clone()),
            "POST",
            "/task/tasks",
            Some(json!({"title": "t"})),
        )
        .await;
        assert_eq!(status, 502);
        assert_eq!(body["status"], json!("error"));
        assert!(
            body["detail"]
                .as_str()
                .unwrap()
                .starts_with("task service unavailable")
        );
        assert!(state.broker.store().is_empty().await);

        let (status, _) = call(build_router(state), "GET", "/task/tasks", None).await;
        assert_eq!(status, 502);
    }

    #[tokio::test]
    async fn test_completed_update_derives_task_completed() {
        let upstream = task_service(Arc::default()).await;
        let state = state_with(&upstream, None);

        let (status, body) = call(
            build_router(state.clone()),
            "PUT",
            "/task/tasks/42",
            Some(json!({"status": "completed"})),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(body["task_id"], json!("42"));

        let events = state.broker.store().recent(10).await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "task_updated");
        assert_eq!(events[0].payload["task_id"], json!("42"));
        assert_eq!(events[0].payload["request"]["status"], json!("completed"));

        let derived = &events[1];
        assert_eq!(derived.event_type, "task_completed");
        assert_eq!(derived.target_systems, vec!["crm", "logistics"]);
        assert_eq!(derived.payload["updated"], json!(true));
        assert_eq!(derived.correlation_id, events[0].correlation_id);
    }

    #[tokio::test]
    async fn test_in_progress_update_derives_nothing() {
        let upstream = task_service(Arc::default()).await;
        let state = state_with(&upstream, None);

        let (status, _) = call(
            build_router(state.clone()),
            "PUT",
            "/task/tasks/42",
            Some(json!({"status": "in_progress"})),
        )
        .await;
        assert_eq!(status, 200);

        let events = state.broker.store().recent(10).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "task_updated");
    }

    #[tokio::test]
    async fn test_repeated_creates_are_not_deduplicated() {
        let created = Arc::new(AtomicUsize::new(0));
        let upstream = task_service(created.clone()).await;
        let state = state_with(&upstream, None);

        for _ in 0..2 {
            let (status, _) = call(
                build_router(state.clone()),
                "POST",
                "/task/tasks",
                Some(json!({"title": "same", "created_by": "u-1"})),
            )
            .await;
            assert_eq!(status, 200);
        }

        assert_eq!(created.load(Ordering::SeqCst), 2);
        let events = state.broker.store().recent(10).await;
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.event_type == "task_created"));
        assert_ne!(events[0].payload["response"], events[1].payload["response"]);
    }

    #[tokio::test]
    async fn test_feedback_and_workflow_reactions() {
        let upstream = task_service(Arc::default()).await;
        let state = state_with(&upstream, None);

        call(
            build_router(state.clone()),
            "POST",
            "/task/feedback",
            Some(json!({"type": "complaint"})),
        )
        .await;
        call(
            build_router(state.clone()),
            "POST",
            "/task/workflow-state",
            Some(json!({"state": "blocked"})),
        )
        .await;

        let types: Vec<String> = state
            .broker
            .store()
            .recent(10)
            .await
            .into_iter()
            .map(|e| e.event_type)
            .collect();
        assert_eq!(
            types,
            vec![
                "feedback_received",
                "complaint_received",
                "workflow_state_changed",
                "task_blocked"
            ]
        );
    }

    #[tokio::test]
    async fn test_denied_creator_gets_forbidden() {
        let created = Arc::new(AtomicUsize::new(0));
        let upstream = task_service(created.clone()).await;
        let compliance = serve(Router::new().route(
            "/consent/{user}",
            get(|| async { Json(json!({"monitoring_enabled": false})) }),
        ))
        .await;
        let state = state_with(&upstream, Some(&compliance));

        let (status, body) = call(
            build_router(state.clone()),
            "POST",
            "/task/tasks",
            Some(json!({"title": "t", "created_by": "u-1"})),
        )
        .await;
        assert_eq!(status, 403);
        assert_eq!(body["status"], json!("error"));
        assert_eq!(created.load(Ordering::SeqCst), 0);
        assert!(state.broker.store().is_empty().await);
    }

    #[tokio::test]
    async fn test_webhook_requires_event_type() {
        let state = unreachable_state();

        let (status, _) = call(
            build_router(state.clone()),
            "POST",
            "/task/webhooks/events",
            Some(json!({"payload": {}})),
        )
        .await;
        assert_eq!(status, 400);

        let (status, body) = call(
            build_router(state.clone()),
            "POST",
            "/task/webhooks/events",
            Some(json!({"event_type": "task_overdue", "payload": {"task_id": "9"}})),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(body, json!({"status": "processed"}));

        let events = state.broker.store().recent(10).await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "task_webhook_received");
        assert_eq!(events[1].event_type, "task_overdue");
        assert_eq!(events[1].payload["task_id"], json!("9"));
    }
}
