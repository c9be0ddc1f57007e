//! Remote connectivity: the probe and delivery seam.
//!
//! A [`RemoteLink`] answers "is the remote reachable?" and carries one
//! [`Delivery`] at a time. [`HttpLink`] talks to a relay endpoint over
//! HTTP; [`OfflineLink`] stands in when no endpoint is configured.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use isaac_types::RemoteConfig;

use crate::store::{CommandType, QueuedCommand};

/// Longest response body kept in a rejection error.
const MAX_ERROR_BODY: usize = 512;

/// One unit of remote work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    pub kind: CommandType,
    pub target: Option<String>,
    pub command: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Delivery {
    /// A command routed to another device.
    pub fn route(target: &str, command: &str, metadata: Map<String, Value>) -> Self {
        Self {
            kind: CommandType::DeviceRoute,
            target: Some(target.to_string()),
            command: command.to_string(),
            metadata,
        }
    }
}

impl From<&QueuedCommand> for Delivery {
    fn from(entry: &QueuedCommand) -> Self {
        Self {
            kind: entry.command_type,
            target: entry.target_device.clone(),
            command: entry.command_text.clone(),
            metadata: entry.metadata.clone(),
        }
    }
}

/// Why a delivery did not go through.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("no remote endpoint configured")]
    Offline,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("remote rejected delivery ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),

    #[error("delivery is missing a target device")]
    MissingTarget,
}

/// Connectivity to the remote side.
#[async_trait]
pub trait RemoteLink: Send + Sync {
    /// Cheap reachability probe. Never errors; unreachable is `false`.
    async fn is_reachable(&self) -> bool;

    /// Deliver one command. `Ok` carries the remote output.
    async fn deliver(&self, delivery: &Delivery) -> Result<String, DeliveryError>;
}

/// A link that is never reachable.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineLink;

#[async_trait]
impl RemoteLink for OfflineLink {
    async fn is_reachable(&self) -> bool {
        false
    }

    async fn deliver(&self, _delivery: &Delivery) -> Result<String, DeliveryError> {
        Err(DeliveryError::Offline)
    }
}

/// HTTP relay link.
///
/// `GET {endpoint}/health` is the probe; `POST {endpoint}/deliver` carries
/// a JSON [`Delivery`] and returns the remote output as the body.
#[derive(Debug, Clone)]
pub struct HttpLink {
    client: Client,
    endpoint: String,
}

impl HttpLink {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, DeliveryError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl RemoteLink for HttpLink {
    async fn is_reachable(&self) -> bool {
        match self
            .client
            .get(format!("{}/health", self.endpoint))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!(endpoint = %self.endpoint, error = %e, "remote probe failed");
                false
            }
        }
    }

    async fn deliver(&self, delivery: &Delivery) -> Result<String, DeliveryError> {
        if delivery.kind == CommandType::DeviceRoute && delivery.target.is_none() {
            return Err(DeliveryError::MissingTarget);
        }
        debug!(endpoint = %self.endpoint, kind = %delivery.kind, "delivering command");
        let resp = self
            .client
            .post(format!("{}/deliver", self.endpoint))
            .json(delivery)
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body: truncate(body, MAX_ERROR_BODY),
            });
        }
        Ok(body)
    }
}

/// The link described by `config`: HTTP when an endpoint is set, offline
/// otherwise.
pub fn link_from_config(
    config: &RemoteConfig,
    timeout: Duration,
) -> Result<Arc<dyn RemoteLink>, DeliveryError> {
    match config.endpoint.as_deref().map(str::trim) {
        Some(endpoint) if !endpoint.is_empty() => Ok(Arc::new(HttpLink::new(endpoint, timeout)?)),
        _ => Ok(Arc::new(OfflineLink)),
    }
}

fn truncate(mut text: String, max: usize) -> String {
    if text.len() > max {
        let mut cut = max;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn link(server: &MockServer) -> HttpLink {
        HttpLink::new(&server.uri(), Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn offline_link_is_never_reachable() {
        let link = OfflineLink;
        assert!(!link.is_reachable().await);
        let err = link
            .deliver(&Delivery::route("labpc", "status", Map::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Offline));
    }

    #[tokio::test]
    async fn health_probe_reflects_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        assert!(link(&server).is_reachable().await);
    }

    #[tokio::test]
    async fn failing_health_probe_is_unreachable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        assert!(!link(&server).is_reachable().await);
    }

    #[tokio::test]
    async fn closed_port_is_unreachable() {
        let server = MockServer::start().await;
        let uri = server.uri();
        drop(server);
        let link = HttpLink::new(&uri, Duration::from_millis(500)).unwrap();
        assert!(!link.is_reachable().await);
    }

    #[tokio::test]
    async fn deliver_posts_json_and_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/deliver"))
            .and(body_json(json!({
                "kind": "device_route",
                "target": "labpc",
                "command": "status",
                "metadata": {"tier": 1.0}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string("labpc: all good"))
            .expect(1)
            .mount(&server)
            .await;

        let mut metadata = Map::new();
        metadata.insert("tier".into(), json!(1.0));
        let out = link(&server)
            .deliver(&Delivery::route("labpc", "status", metadata))
            .await
            .unwrap();
        assert_eq!(out, "labpc: all good");
    }

    #[tokio::test]
    async fn rejected_delivery_carries_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/deliver"))
            .respond_with(ResponseTemplate::new(502).set_body_string("device offline"))
            .mount(&server)
            .await;

        let err = link(&server)
            .deliver(&Delivery::route("labpc", "status", Map::new()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("502"), "got: {err}");
        assert!(err.to_string().contains("device offline"), "got: {err}");
    }

    #[tokio::test]
    async fn route_without_target_is_refused() {
        let server = MockServer::start().await;
        let delivery = Delivery {
            kind: CommandType::DeviceRoute,
            target: None,
            command: "status".into(),
            metadata: Map::new(),
        };
        let err = link(&server).deliver(&delivery).await.unwrap_err();
        assert!(matches!(err, DeliveryError::MissingTarget));
    }

    #[test]
    fn config_without_endpoint_is_offline() {
        // Both paths must build; only the HTTP one keeps the endpoint.
        assert!(link_from_config(&RemoteConfig::default(), Duration::from_secs(1)).is_ok());
        let config = RemoteConfig {
            endpoint: Some("http://127.0.0.1:9/".into()),
        };
        assert!(link_from_config(&config, Duration::from_secs(1)).is_ok());
        let http = HttpLink::new("http://127.0.0.1:9/", Duration::from_secs(1)).unwrap();
        assert_eq!(http.endpoint(), "http://127.0.0.1:9");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo".into(), 2), "h");
        assert_eq!(truncate("short".into(), 10), "short");
    }
}
