//! Checks against the external compliance service.
//!
//! Consent lookups decide access control and data privacy, transaction
//! checks and audit entries are forwarded to the service's event endpoint.
//! With compliance disabled every check passes and nothing is sent.

use std::sync::Arc;
use std::time::Duration;

use integrator_sdk::objects::Payload;
use integrator_sdk::objects::gateway::{DependencyHealth, DependencyStatus};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::upstream::endpoint;
use crate::config::ComplianceConfig;

const COMPLIANCE_TIMEOUT: Duration = Duration::from_secs(10);
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);
const API_KEY_HEADER: &str = "X-API-Key";
const SOURCE_NAME: &str = "integrator_gateway";

#[derive(Debug, Error)]
pub enum ComplianceError {
    /// The service answered and refused.
    #[error("{0}")]
    Denied(String),

    /// The service could not be asked.
    #[error("compliance service unavailable: {0}")]
    Unavailable(#[from] reqwest::Error),

    #[error("invalid compliance service url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Consent record as returned by `GET /consent/{user}`.
#[derive(Debug, Clone, Default, Deserialize)]
struct Consent {
    #[serde(default)]
    monitoring_enabled: bool,
    #[serde(default)]
    data_categories: Vec<String>,
}

/// A monetary operation to log before it is carried out.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionCheck {
    pub transaction_id: String,
    pub transaction_type: String,
    /// Who asked for the transaction.
    pub actor: String,
    pub amount: Value,
    pub parties: Vec<String>,
    pub metadata: Payload,
}

impl TransactionCheck {
    /// Build a check from a client request body.
    ///
    /// Looks for `id`/`transaction_id`, `user_id`, `amount`/`value` and
    /// `parties` in the body.
    pub fn from_body(transaction_type: &str, body: &Payload) -> Self {
        let text = |key: &str| body.get(key).and_then(Value::as_str).map(str::to_string);
        Self {
            transaction_id: text("id")
                .or_else(|| text("transaction_id"))
                .unwrap_or_else(|| "unknown".to_string()),
            transaction_type: transaction_type.to_string(),
            actor: text("user_id").unwrap_or_else(|| SOURCE_NAME.to_string()),
            amount: body
                .get("amount")
                .or_else(|| body.get("value"))
                .cloned()
                .unwrap_or(json!(0)),
            parties: body
                .get("parties")
                .and_then(Value::as_array)
                .map(|p| {
                    p.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            metadata: body.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ComplianceHooks {
    http: reqwest::Client,
    config: Arc<RwLock<ComplianceConfig>>,
}

impl ComplianceHooks {
    pub fn new(config: Arc<RwLock<ComplianceConfig>>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(COMPLIANCE_TIMEOUT)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            config,
        }
    }

    /// `None` when compliance is disabled.
    async fn active_config(&self) -> Option<ComplianceConfig> {
        let config = self.config.read().await;
        config.enabled.then(|| config.clone())
    }

    async fn consent(
        &self,
        config: &ComplianceConfig,
        user_id: &str,
    ) -> Result<Option<Consent>, ComplianceError> {
        let url = endpoint(
            &config.url,
            &format!("/consent/{}", urlencoding::encode(user_id)),
        )?;
        let mut request = self.http.get(url);
        if let Some(key) = &config.api_key {
            request = request.header(API_KEY_HEADER, key);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            debug!(user_id, status = %response.status(), "Consent lookup refused");
            return Ok(None);
        }
        Ok(Some(response.json().await?))
    }

    async fn forward(&self, config: &ComplianceConfig, body: &Value) -> Result<bool, ComplianceError> {
        let url = endpoint(&config.url, "/ems-forward")?;
        let mut request = self.http.post(url).json(body);
        if let Some(key) = &config.api_key {
            request = request.header(API_KEY_HEADER, key);
        }
        let response = request.send().await?;
        Ok(response.status().is_success())
    }

    /// Allowed when the user has monitoring consent. Allowed accesses are
    /// recorded in the audit trail.
    pub async fn check_access(
        &self,
        user_id: &str,
        resource: &str,
        action: &str,
    ) -> Result<(), ComplianceError> {
        let Some(config) = self.active_config().await else {
            return Ok(());
        };

        let consent = self.consent(&config, user_id).await?.unwrap_or_default();
        if !consent.monitoring_enabled {
            return Err(ComplianceError::Denied(
                "access denied: monitoring consent not granted".to_string(),
            ));
        }

        let mut details = Payload::new();
        details.insert("action".into(), json!(action));
        details.insert("monitoring_consent".into(), json!(true));
        self.audit(&format!("access_{action}"), user_id, resource, details)
            .await;
        Ok(())
    }

    /// Valid when the data subject consented to `data_type` or to `all`.
    ///
    /// The subject is `user_id`, then `employee_id`, then `unknown`.
    pub async fn check_data_privacy(
        &self,
        data: &Payload,
        data_type: &str,
    ) -> Result<(), ComplianceError> {
        let Some(config) = self.active_config().await else {
            return Ok(());
        };

        let subject = data
            .get("user_id")
            .or_else(|| data.get("employee_id"))
            .and_then(Value::as_str)
            .unwrap_or("unknown");

        let Some(consent) = self.consent(&config, subject).await? else {
            return Err(ComplianceError::Denied(format!(
                "consent check failed for {subject}"
            )));
        };
        let consented = consent
            .data_categories
            .iter()
            .any(|c| c == data_type || c == "all");
        if consented {
            Ok(())
        } else {
            Err(ComplianceError::Denied(format!(
                "data type '{data_type}' not in user's consented categories"
            )))
        }
    }

    /// Compliant when the compliance service accepts the transaction log.
    pub async fn check_transaction(&self, tx: &TransactionCheck) -> Result<(), ComplianceError> {
        let Some(config) = self.active_config().await else {
            return Ok(());
        };

        let body = json!({
            "actor": tx.actor,
            "action": "transaction_check",
            "resource": format!("transaction/{}", tx.transaction_id),
            "status": "pending",
            "reason": "compliance_validation",
            "purpose": "audit_trail",
            "ems_trace_id": Uuid::new_v4().to_string(),
            "ems_source": SOURCE_NAME,
            "details": {
                "transaction_type": tx.transaction_type,
                "amount": tx.amount,
                "parties": tx.parties,
                "timestamp": now_rfc3339(),
                "metadata": tx.metadata,
            }
        });

        if self.forward(&config, &body).await? {
            info!(transaction_id = %tx.transaction_id, "Transaction logged for compliance");
            Ok(())
        } else {
            Err(ComplianceError::Denied(format!(
                "transaction {} rejected by compliance service",
                tx.transaction_id
            )))
        }
    }

    /// Best-effort audit trail entry. Returns the local audit id when the
    /// entry was accepted.
    pub async fn audit(
        &self,
        action: &str,
        user_id: &str,
        resource: &str,
        mut details: Payload,
    ) -> Option<String> {
        let config = self.active_config().await?;

        details.insert("timestamp".into(), json!(now_rfc3339()));
        details.insert("system".into(), json!(SOURCE_NAME));
        let body = json!({
            "actor": user_id,
            "action": action,
            "resource": resource,
            "status": "success",
            "reason": "audit_trail",
            "purpose": "compliance",
            "ems_trace_id": Uuid::new_v4().to_string(),
            "ems_source": SOURCE_NAME,
            "details": details,
        });

        match self.forward(&config, &body).await {
            Ok(true) => Some(Uuid::new_v4().to_string()),
            Ok(false) => {
                warn!(action, user_id, "Audit entry rejected");
                None
            }
            Err(e) => {
                warn!(action, user_id, error = %e, "Audit entry failed");
                None
            }
        }
    }

    /// Reachability of the service; `disabled` without a request when
    /// compliance is switched off.
    pub async fn probe(&self) -> DependencyHealth {
        let config = self.config.read().await.clone();
        if !config.enabled {
            return DependencyHealth {
                status: DependencyStatus::Disabled,
                url: config.url.to_string(),
                detail: None,
            };
        }

        let result = self
            .http
            .get(config.url.clone())
            .timeout(PROBE_TIMEOUT)
            .send()
            .await;
        let (status, detail) = match result {
            Ok(resp) if !resp.status().is_server_error() => (DependencyStatus::Up, None),
            Ok(resp) => (
                DependencyStatus::Down,
                Some(format!("status {}", resp.status().as_u16())),
            ),
            Err(e) => {
                warn!(error = %e, "Compliance probe failed");
                (DependencyStatus::Down, Some(e.to_string()))
            }
        };
        DependencyHealth {
            status,
            url: config.url.to_string(),
            detail,
        }
    }
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}
