//! Client for the broker and gateway status endpoints.

use reqwest::Client;
use url::Url;

use super::{ClientError, parse_response};
use crate::objects::gateway::{
    BrokerHealthResponse, HealthResponse, LogsQuery, LogsResponse, RulesResponse, StatusResponse,
};
use crate::objects::subscription::{SubscribeResponse, SubscriptionsResponse};
use crate::objects::{
    EventListQuery, EventListResponse, PublishEventRequest, PublishEventResponse, Subscription,
    UnifiedEventRequest, UnifiedEventResponse,
};

/// Typed HTTP client for a running gateway.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    http: Client,
    base_url: Url,
}

impl GatewayClient {
    /// * `base_url` – root URL of the gateway (e.g. `http://localhost:8080`).
    pub fn new(base_url: Url) -> Self {
        Self {
            http: Client::new(),
            base_url,
        }
    }

    /// Replace the default `reqwest::Client` with a custom one (e.g. to
    /// configure timeouts or a proxy).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// `POST /event/publish`
    pub async fn publish(
        &self,
        request: &PublishEventRequest,
    ) -> Result<PublishEventResponse, ClientError> {
        let url = self.base_url.join("/event/publish")?;
        let resp = self.http.post(url).json(request).send().await?;
        parse_response(resp).await
    }

    /// `GET /event/events`
    pub async fn events(&self, query: &EventListQuery) -> Result<EventListResponse, ClientError> {
        let url = self.base_url.join("/event/events")?;
        let resp = self.http.get(url).query(query).send().await?;
        parse_response(resp).await
    }

    /// `POST /event/subscribe`
    pub async fn subscribe(
        &self,
        subscription: &Subscription,
    ) -> Result<SubscribeResponse, ClientError> {
        let url = self.base_url.join("/event/subscribe")?;
        let resp = self.http.post(url).json(subscription).send().await?;
        parse_response(resp).await
    }

    /// `GET /event/subscriptions`
    pub async fn subscriptions(&self) -> Result<SubscriptionsResponse, ClientError> {
        let url = self.base_url.join("/event/subscriptions")?;
        let resp = self.http.get(url).send().await?;
        parse_response(resp).await
    }

    /// `GET /event/rules`
    pub async fn rules(&self) -> Result<RulesResponse, ClientError> {
        let url = self.base_url.join("/event/rules")?;
        let resp = self.http.get(url).send().await?;
        parse_response(resp).await
    }

    /// `GET /event/health`
    pub async fn broker_health(&self) -> Result<BrokerHealthResponse, ClientError> {
        let url = self.base_url.join("/event/health")?;
        let resp = self.http.get(url).send().await?;
        parse_response(resp).await
    }

    /// `POST /event/unified`
    pub async fn unified(
        &self,
        request: &UnifiedEventRequest,
    ) -> Result<UnifiedEventResponse, ClientError> {
        let url = self.base_url.join("/event/unified")?;
        let resp = self.http.post(url).json(request).send().await?;
        parse_response(resp).await
    }

    /// `GET /logs`
    pub async fn logs(&self, query: &LogsQuery) -> Result<LogsResponse, ClientError> {
        let url = self.base_url.join("/logs")?;
        let resp = self.http.get(url).query(query).send().await?;
        parse_response(resp).await
    }

    /// `GET /health`
    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        let url = self.base_url.join("/health")?;
        let resp = self.http.get(url).send().await?;
        parse_response(resp).await
    }

    /// `GET /status`
    pub async fn status(&self) -> Result<StatusResponse, ClientError> {
        let url = self.base_url.join("/status")?;
        let resp = self.http.get(url).send().await?;
        parse_response(resp).await
    }
}
