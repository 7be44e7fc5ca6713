//! HTTP client for the gateway API.
//!
//! Needs the `client` feature; the object types alone never pull in
//! `reqwest`.

mod gateway;

pub use gateway::GatewayClient;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::objects::ErrorBody;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The request never produced a response.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx reply. `detail` is filled when the body is the gateway's
    /// `{"status":"error","detail":..}` envelope.
    #[error("gateway replied {status}: {body}")]
    Rejected {
        status: StatusCode,
        detail: Option<String>,
        body: String,
    },

    #[error("unexpected response body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("bad endpoint url: {0}")]
    Url(#[from] url::ParseError),
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn detail(&self) -> Option<&str> {
        match self {
            ClientError::Rejected { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }
}

async fn parse_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ClientError> {
    let status = resp.status();
    let bytes = resp.bytes().await?;
    if status.is_success() {
        return Ok(serde_json::from_slice(&bytes)?);
    }
    let detail = serde_json::from_slice::<ErrorBody>(&bytes)
        .ok()
        .map(|b| b.detail);
    Err(ClientError::Rejected {
        status,
        detail,
        body: String::from_utf8_lossy(&bytes).into_owned(),
    })
}
