//! Configuration module for integrator-server.
//!
//! Handles loading configuration from the TOML file, CLI arguments and
//! environment variables, and turns it into the validated runtime sections
//! used by the core crate.

pub mod file;

use crate::config::file::FileConfig;
use integrator_core::config::{
    AdvisorConfig, AlertConfig, ComplianceConfig, SharedConfig, UpstreamsConfig,
};
use integrator_core::processors::triggers::{TriggerTable, default_triggers};
use integrator_core::reactions::{RuleSet, default_rules};
use integrator_sdk::objects::Subscription;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;
use url::Url;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Loaded configuration result containing all parts.
pub struct LoadedConfig {
    pub listen: SocketAddr,
    pub upstreams: UpstreamsConfig,
    pub compliance: ComplianceConfig,
    pub advisor: AdvisorConfig,
    pub advisor_api_key: Option<String>,
    pub alerts: AlertConfig,
    pub subscriptions: Vec<Subscription>,
    /// Built-in rules followed by the configured ones, already validated.
    pub rules: RuleSet,
    /// Built-in trigger actions with the configured entries applied.
    pub triggers: TriggerTable,
}

impl LoadedConfig {
    /// Wrap the reloadable sections in their own locks.
    pub fn shared(&self) -> SharedConfig {
        SharedConfig::new(
            self.upstreams.clone(),
            self.compliance.clone(),
            self.advisor.clone(),
            self.alerts.clone(),
        )
    }
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: std::path::PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    /// Load and process the configuration.
    ///
    /// This will:
    /// 1. Read the TOML file, or fall back to defaults when it does not exist
    /// 2. Apply environment and CLI overrides
    /// 3. Validate URLs and the reaction rule table
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let mut file_config = match std::fs::read_to_string(&self.config_path) {
            Ok(content) => toml::from_str(&content)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!(
                    path = %self.config_path.display(),
                    "Config file not found, using defaults"
                );
                FileConfig::default()
            }
            Err(e) => return Err(e.into()),
        };

        apply_env_overrides(&mut file_config, |key| std::env::var(key).ok());
        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }

        build_loaded_config(file_config)
    }

    /// Reload the configuration (used during SIGHUP).
    pub fn reload(&self) -> Result<LoadedConfig, ConfigError> {
        self.load()
    }
}

/// Override file values with the environment variables the services are
/// usually deployed with.
///
/// `lookup` returns the value of a variable, if set.
pub fn apply_env_overrides(config: &mut FileConfig, lookup: impl Fn(&str) -> Option<String>) {
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = non_empty("TASK_BASE_URL") {
        config.upstreams.task_base_url = v;
    }
    if let Some(v) = non_empty("CRM_BASE_URL") {
        config.upstreams.crm_base_url = v;
    }
    if let Some(v) = non_empty("LOGISTICS_BASE_URL") {
        config.upstreams.logistics_base_url = v;
    }
    if let Some(v) = non_empty("SANKALP_COMPLIANCE_URL") {
        config.compliance.url = v;
    }
    if let Some(v) = non_empty("COMPLIANCE_ENABLED") {
        config.compliance.enabled = matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        );
    }
    if let Some(v) = non_empty("UNIGURU_URL") {
        config.advisor.uniguru_url = v;
    }
    if let Some(v) = non_empty("GURUKUL_URL") {
        config.advisor.gurukul_url = v;
    }
    if let Some(v) = non_empty("SLACK_WEBHOOK_URL") {
        config.alerts.slack_webhook_url = Some(v);
    }
    if let Some(v) = non_empty("TEAMS_WEBHOOK_URL") {
        config.alerts.teams_webhook_url = Some(v);
    }
}

fn parse_url(field: &str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value.trim()).map_err(|e| {
        ConfigError::ValidationError(format!("{field} is not a valid URL ({value}): {e}"))
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::ValidationError(format!(
            "{field} must use http or https, got {other}"
        ))),
    }
}

/// Validate a parsed file and convert it into runtime configuration.
pub fn build_loaded_config(file_config: FileConfig) -> Result<LoadedConfig, ConfigError> {
    let FileConfig {
        server,
        upstreams,
        compliance,
        advisor,
        alerts,
        subscriptions,
        reactions,
        triggers: configured_triggers,
    } = file_config;

    let upstreams = UpstreamsConfig {
        task_base_url: parse_url("upstreams.task_base_url", &upstreams.task_base_url)?,
        crm_base_url: parse_url("upstreams.crm_base_url", &upstreams.crm_base_url)?,
        logistics_base_url: parse_url(
            "upstreams.logistics_base_url",
            &upstreams.logistics_base_url,
        )?,
    };

    let compliance = ComplianceConfig {
        enabled: compliance.enabled,
        url: parse_url("compliance.url", &compliance.url)?,
        api_key: compliance.api_key.filter(|k| !k.is_empty()),
    };

    let advisor_api_key = advisor.api_key.filter(|k| !k.is_empty());
    let advisor = AdvisorConfig {
        uniguru_url: parse_url("advisor.uniguru_url", &advisor.uniguru_url)?,
        gurukul_url: parse_url("advisor.gurukul_url", &advisor.gurukul_url)?,
    };

    let alerts = AlertConfig {
        event_types: alerts.event_types,
        slack_webhook_url: alerts
            .slack_webhook_url
            .as_deref()
            .map(|u| parse_url("alerts.slack_webhook_url", u))
            .transpose()?,
        teams_webhook_url: alerts
            .teams_webhook_url
            .as_deref()
            .map(|u| parse_url("alerts.teams_webhook_url", u))
            .transpose()?,
    };

    for subscription in &subscriptions {
        if subscription.system_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "subscription with empty system_name".to_string(),
            ));
        }
    }

    let mut rules = default_rules();
    rules.extend(reactions);
    let rules = RuleSet::new(rules)
        .map_err(|e| ConfigError::ValidationError(format!("reaction rules: {e}")))?;

    let mut triggers = default_triggers();
    triggers.extend(configured_triggers);
    triggers.retain(|_, actions| !actions.is_empty());

    Ok(LoadedConfig {
        listen: server.listen,
        upstreams,
        compliance,
        advisor,
        advisor_api_key,
        alerts,
        subscriptions,
        rules,
        triggers,
    })
}
