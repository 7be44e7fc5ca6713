//! AI advisor endpoints used by the employee features.
//!
//! The UniGuru endpoint writes performance report text and the Gurukul
//! endpoint reorders learning modules. Both are opaque remote calls; callers
//! decide what to do when they fail.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use integrator_sdk::objects::employee::ReviewType;
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;
use url::Url;

use super::upstream::endpoint;
use crate::config::AdvisorConfig;

const ADVISOR_TIMEOUT: Duration = Duration::from_secs(15);
const SYSTEM_NAME: &str = "integrator_gateway";

#[derive(Debug, Error)]
pub enum AdvisorError {
    #[error("advisor unreachable: {0}")]
    Request(#[from] reqwest::Error),

    #[error("advisor returned status {0}")]
    Status(u16),

    /// The advisor answered but reported no usable result.
    #[error("advisor could not produce a result")]
    Unsuccessful,

    #[error("invalid advisor url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

#[async_trait]
pub trait AiAdvisor: Send + Sync {
    /// Narrative performance analysis for a review.
    async fn performance_report(
        &self,
        employee_id: &str,
        review_type: ReviewType,
    ) -> Result<String, AdvisorError>;

    /// `modules` in the order the employee should take them.
    async fn personalize_learning_path(
        &self,
        employee_id: &str,
        modules: &[String],
    ) -> Result<Vec<String>, AdvisorError>;
}

#[derive(Debug, Deserialize)]
struct QueryReply {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    response: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PipelineReply {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    modules: Option<Vec<String>>,
}

/// [`AiAdvisor`] backed by the UniGuru and Gurukul HTTP endpoints.
#[derive(Debug, Clone)]
pub struct HttpAdvisor {
    http: reqwest::Client,
    config: Arc<RwLock<AdvisorConfig>>,
    api_key: Option<String>,
}

impl HttpAdvisor {
    pub fn new(config: Arc<RwLock<AdvisorConfig>>, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(ADVISOR_TIMEOUT)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            config,
            api_key,
        }
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        url: Url,
        body: Value,
    ) -> Result<T, AdvisorError> {
        let response = self.http.post(url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AdvisorError::Status(status.as_u16()));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl AiAdvisor for HttpAdvisor {
    async fn performance_report(
        &self,
        employee_id: &str,
        review_type: ReviewType,
    ) -> Result<String, AdvisorError> {
        let url = endpoint(&self.config.read().await.uniguru_url, "/query")?;
        let body = json!({
            "query": format!(
                "Analyze performance data for employee {employee_id} for {review_type} review"
            ),
            "context": {
                "employee_id": employee_id,
                "review_type": review_type,
                "analysis_type": "performance_review",
            },
            "system": SYSTEM_NAME,
            "api_key": self.api_key,
        });

        let reply: QueryReply = self.call(url, body).await?;
        match reply {
            QueryReply {
                success: true,
                response: Some(text),
            } if !text.trim().is_empty() => Ok(text),
            _ => Err(AdvisorError::Unsuccessful),
        }
    }

    async fn personalize_learning_path(
        &self,
        employee_id: &str,
        modules: &[String],
    ) -> Result<Vec<String>, AdvisorError> {
        let url = endpoint(&self.config.read().await.gurukul_url, "/process")?;
        let body = json!({
            "query": format!(
                "Personalize learning path for employee {employee_id} based on their performance and skill gaps"
            ),
            "pipeline": "learning_pipeline",
            "context": {
                "employee_id": employee_id,
                "base_modules": modules,
                "personalization_type": "learning_path",
            },
            "system": SYSTEM_NAME,
            "api_key": self.api_key,
        });

        let reply: PipelineReply = self.call(url, body).await?;
        match reply {
            PipelineReply {
                success: true,
                modules: Some(ordered),
            } if !ordered.is_empty() => {
                debug!(employee_id, count = ordered.len(), "Learning path personalized");
                Ok(ordered)
            }
            _ => Err(AdvisorError::Unsuccessful),
        }
    }
}
