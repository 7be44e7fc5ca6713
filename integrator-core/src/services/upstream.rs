//! JSON proxy client for the task, CRM and logistics services.

use std::sync::Arc;
use std::time::Duration;

use integrator_sdk::objects::gateway::{DependencyHealth, DependencyStatus};
use reqwest::Method;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use url::Url;

use crate::config::UpstreamsConfig;

/// Timeout of every proxied request.
pub const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);
/// Timeout of a health probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Upstream {
    Task,
    Crm,
    Logistics,
}

impl Upstream {
    pub const ALL: [Upstream; 3] = [Upstream::Task, Upstream::Crm, Upstream::Logistics];

    /// Key used in health reports.
    pub fn key(&self) -> &'static str {
        match self {
            Upstream::Task => "task_manager",
            Upstream::Crm => "crm",
            Upstream::Logistics => "logistics",
        }
    }

    fn base_url<'a>(&self, config: &'a UpstreamsConfig) -> &'a Url {
        match self {
            Upstream::Task => &config.task_base_url,
            Upstream::Crm => &config.crm_base_url,
            Upstream::Logistics => &config.logistics_base_url,
        }
    }
}

impl std::fmt::Display for Upstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Upstream::Task => write!(f, "task service"),
            Upstream::Crm => write!(f, "CRM service"),
            Upstream::Logistics => write!(f, "logistics service"),
        }
    }
}

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("{service} unavailable: {source}")]
    Transport {
        service: Upstream,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} returned status {status}: {body}")]
    Status {
        service: Upstream,
        status: u16,
        body: String,
    },

    #[error("{service} returned invalid JSON: {source}")]
    InvalidBody {
        service: Upstream,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid {service} url: {source}")]
    InvalidUrl {
        service: Upstream,
        #[source]
        source: url::ParseError,
    },
}

/// Join `path` onto `base`, keeping any path prefix `base` already has.
pub fn endpoint(base: &Url, path: &str) -> Result<Url, url::ParseError> {
    let joined = format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Url::parse(&joined)
}

/// Shared proxy client. Base URLs are read from configuration on every call
/// so a reload takes effect immediately.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    config: Arc<RwLock<UpstreamsConfig>>,
}

impl UpstreamClient {
    pub fn new(config: Arc<RwLock<UpstreamsConfig>>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(UPSTREAM_TIMEOUT)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            config,
        }
    }

    async fn url(&self, service: Upstream, path: &str) -> Result<Url, UpstreamError> {
        let config = self.config.read().await;
        endpoint(service.base_url(&config), path)
            .map_err(|source| UpstreamError::InvalidUrl { service, source })
    }

    pub async fn get(&self, service: Upstream, path: &str) -> Result<Value, UpstreamError> {
        self.request(service, Method::GET, path, None).await
    }

    pub async fn post(
        &self,
        service: Upstream,
        path: &str,
        body: &Value,
    ) -> Result<Value, UpstreamError> {
        self.request(service, Method::POST, path, Some(body)).await
    }

    pub async fn put(
        &self,
        service: Upstream,
        path: &str,
        body: &Value,
    ) -> Result<Value, UpstreamError> {
        self.request(service, Method::PUT, path, Some(body)).await
    }

    async fn request(
        &self,
        service: Upstream,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, UpstreamError> {
        let url = self.url(service, path).await?;
        debug!(%service, %method, %url, "Proxying request");

        let mut request = self.http.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request
            .send()
            .await
            .map_err(|source| UpstreamError::Transport { service, source })?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|source| UpstreamError::Transport { service, source })?;

        if !status.is_success() {
            return Err(UpstreamError::Status {
                service,
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|source| UpstreamError::InvalidBody { service, source })
    }

    /// Cheap reachability check: any response below 500 counts as up.
    pub async fn probe(&self, service: Upstream) -> DependencyHealth {
        let base = service.base_url(&*self.config.read().await).clone();

        let result = self.http.get(base.clone()).timeout(PROBE_TIMEOUT).send().await;
        let (status, detail) = match result {
            Ok(resp) if !resp.status().is_server_error() => (DependencyStatus::Up, None),
            Ok(resp) => (
                DependencyStatus::Down,
                Some(format!("status {}", resp.status().as_u16())),
            ),
            Err(e) => {
                warn!(%service, error = %e, "Health probe failed");
                (DependencyStatus::Down, Some(e.to_string()))
            }
        };
        DependencyHealth {
            status,
            url: base.to_string(),
            detail,
        }
    }
}
