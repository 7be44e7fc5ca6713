//! HTTP API of the gateway.
//!
//! # Routers
//!
//! - `/task`      – task service proxy
//! - `/crm`       – CRM proxy
//! - `/logistics` – logistics proxy and delivery assignment
//! - `/employee`  – local employee records
//! - `/event`     – event broker access and the unified event endpoint

pub mod crm;
pub mod employee;
pub mod event;
pub mod extractors;
pub mod logistics;
pub mod task;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use integrator_core::broker::BrokerError;
use integrator_core::entities::EmployeeError;
use integrator_core::events::{NewEvent, Payload, Priority};
use integrator_core::services::{ComplianceError, Upstream, UpstreamError};
use integrator_sdk::objects::{ErrorBody, WebhookAck};
use serde_json::Value;

use crate::state::AppState;

/// Errors returned by every handler, rendered as
/// `{"status": "error", "detail": ...}`.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed or incomplete request.
    Validation(String),
    /// An upstream service failed, timed out or answered non-2xx.
    Gateway(String),
    /// The compliance service refused the operation.
    ComplianceDenied(String),
    NotFound(String),
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Gateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::ComplianceDenied(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match self {
            ApiError::Internal(detail) => {
                tracing::error!(detail = %detail, "Internal error");
                "internal server error".to_string()
            }
            ApiError::Gateway(detail) => {
                tracing::warn!(detail = %detail, "Upstream failure");
                detail
            }
            ApiError::ComplianceDenied(detail) => {
                tracing::info!(detail = %detail, "Request refused by compliance");
                detail
            }
            ApiError::Validation(detail) | ApiError::NotFound(detail) => detail,
        };
        (status, Json(ErrorBody::new(detail))).into_response()
    }
}

impl From<BrokerError> for ApiError {
    fn from(err: BrokerError) -> Self {
        match err {
            BrokerError::Validation(e) => ApiError::Validation(e.to_string()),
        }
    }
}

impl From<UpstreamError> for ApiError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::InvalidUrl { .. } => ApiError::Internal(err.to_string()),
            UpstreamError::Transport { .. }
            | UpstreamError::Status { .. }
            | UpstreamError::InvalidBody { .. } => ApiError::Gateway(err.to_string()),
        }
    }
}

impl From<ComplianceError> for ApiError {
    fn from(err: ComplianceError) -> Self {
        match err {
            ComplianceError::Denied(reason) => ApiError::ComplianceDenied(reason),
            ComplianceError::Unavailable(_) => ApiError::Gateway(err.to_string()),
            ComplianceError::InvalidUrl(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<EmployeeError> for ApiError {
    fn from(err: EmployeeError) -> Self {
        match err {
            EmployeeError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            EmployeeError::NotEligible(_) | EmployeeError::Invalid(_) => {
                ApiError::Validation(err.to_string())
            }
        }
    }
}

/// The event a successful proxied mutation publishes.
pub(crate) struct PrimaryEvent {
    pub event_type: &'static str,
    pub targets: &'static [&'static str],
    pub priority: Priority,
}

/// Payload of the primary event of a proxied mutation: the client body,
/// the upstream reply and any path ids.
pub(crate) fn exchange_payload(request: Payload, response: Value, ids: &[(&str, &str)]) -> Payload {
    let mut payload = Payload::new();
    payload.insert("request".to_string(), Value::Object(request));
    payload.insert("response".to_string(), response);
    for (key, value) in ids {
        payload.insert(key.to_string(), Value::String(value.to_string()));
    }
    payload
}

/// Publish `primary` for a mutation `service` has already accepted.
pub(crate) async fn publish_exchange(
    state: &AppState,
    service: Upstream,
    primary: &PrimaryEvent,
    payload: Payload,
) -> Result<String, ApiError> {
    publish_primary(
        state,
        primary.event_type,
        service.key(),
        primary.targets,
        primary.priority,
        payload,
    )
    .await
}

/// Path segment safe to splice into an upstream URL.
pub(crate) fn segment(id: &str) -> std::borrow::Cow<'_, str> {
    urlencoding::encode(id)
}

/// Publish the primary event of a completed operation.
pub(crate) async fn publish_primary(
    state: &AppState,
    event_type: &str,
    source: &str,
    targets: &[&str],
    priority: Priority,
    payload: Payload,
) -> Result<String, ApiError> {
    let event = NewEvent::new(event_type, source)
        .targets(targets.iter().copied())
        .priority(priority)
        .payload(payload);
    let result = state.broker.publish(event).await?;
    Ok(result.event_id)
}

/// Record an inbound webhook from `source` as a `{trigger}` event.
///
/// The body must name its `event_type`; the whole body becomes the event
/// payload so reaction rules can match on it.
pub(crate) async fn receive_webhook(
    state: &AppState,
    trigger: &str,
    source: &str,
    body: Payload,
) -> Result<Json<WebhookAck>, ApiError> {
    let inbound = body
        .get("event_type")
        .and_then(Value::as_str)
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("event_type is required".to_string()))?
        .to_string();
    tracing::info!(source, inbound_event = %inbound, "Webhook received");

    publish_primary(state, trigger, source, &[], Priority::Low, body).await?;
    Ok(Json(WebhookAck::processed()))
}

#[cfg(test)]
pub(crate) mod testing {
    //! Shared fixtures for the HTTP tests.

    use std::sync::Arc;

    use axum::{Router, body::Body, http::Request};
    use integrator_core::broker::EventBroker;
    use integrator_core::config::{
        AdvisorConfig, AlertConfig, ComplianceConfig, SharedConfig, UpstreamsConfig,
    };
    use integrator_core::processors::triggers::default_triggers;
    use integrator_core::reactions::{RuleSet, default_rules};
    use integrator_core::services::{AdvisorError, AiAdvisor};
    use integrator_sdk::objects::employee::ReviewType;
    use serde_json::Value;
    use tower::ServiceExt;
    use url::Url;

    use crate::state::{AppState, trigger_runner};

    pub(crate) const CLOSED: &str = "http://127.0.0.1:1";

    /// Serve `app` on an ephemeral local port.
    pub(crate) async fn serve(app: Router) -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}").parse().unwrap()
    }

    /// Gateway state whose upstreams all point at `upstream`.
    pub(crate) fn state_with(upstream: &Url, compliance: Option<&Url>) -> AppState {
        let config = SharedConfig::new(
            UpstreamsConfig {
                task_base_url: upstream.clone(),
                crm_base_url: upstream.clone(),
                logistics_base_url: upstream.clone(),
            },
            ComplianceConfig {
                enabled: compliance.is_some(),
                url: compliance
                    .cloned()
                    .unwrap_or_else(|| CLOSED.parse().unwrap()),
                api_key: None,
            },
            AdvisorConfig {
                uniguru_url: CLOSED.parse().unwrap(),
                gurukul_url: CLOSED.parse().unwrap(),
            },
            AlertConfig::default(),
        );
        let rules = RuleSet::new(default_rules()).unwrap();
        let broker = EventBroker::new(rules, config.alerts.clone())
            .with_triggers(trigger_runner(&config, default_triggers()));
        AppState::with_parts(Arc::new(broker), config, Arc::new(StubAdvisor::default()))
    }

    /// Same as [`state_with`] with an advisor that always fails.
    pub(crate) fn state_with_failing_advisor(upstream: &Url) -> AppState {
        let mut state = state_with(upstream, None);
        state.advisor = Arc::new(StubAdvisor { fail: true });
        state
    }

    pub(crate) fn unreachable_state() -> AppState {
        state_with(&CLOSED.parse().unwrap(), None)
    }

    /// Send one request through `router` and decode the JSON reply.
    pub(crate) async fn call(
        router: Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (u16, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = router.oneshot(request).await.unwrap();
        let status = response.status().as_u16();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    /// Advisor stand-in that answers without any network.
    #[derive(Debug, Default)]
    pub(crate) struct StubAdvisor {
        pub(crate) fail: bool,
    }

    #[async_trait::async_trait]
    impl AiAdvisor for StubAdvisor {
        async fn performance_report(
            &self,
            employee_id: &str,
            review_type: ReviewType,
        ) -> Result<String, AdvisorError> {
            if self.fail {
                return Err(AdvisorError::Unsuccessful);
            }
            Ok(format!("{review_type} report for {employee_id}"))
        }

        async fn personalize_learning_path(
            &self,
            _employee_id: &str,
            modules: &[String],
        ) -> Result<Vec<String>, AdvisorError> {
            if self.fail {
                return Err(AdvisorError::Unsuccessful);
            }
            Ok(modules.iter().rev().cloned().collect())
        }
    }
}
