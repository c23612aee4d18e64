//! HTTP transport to a physical controller
//!
//! Each envelope is one `POST` with a Basic authorization header. The body is
//! read fully and parsed as a response envelope.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

use super::traits::Transport;
use crate::config::ControllerConfig;
use crate::error::TransportError;
use crate::protocol::{RequestEnvelope, ResponseEnvelope};

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    username: String,
    password: String,
}

impl HttpTransport {
    pub fn new(config: &ControllerConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| TransportError::ConnectionFailed {
                endpoint: config.url.clone(),
                reason: format!("client setup: {e}"),
            })?;

        Ok(Self {
            client,
            url: config.url.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn classify(&self, err: &reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout(self.url.clone())
        } else {
            TransportError::ConnectionFailed {
                endpoint: self.url.clone(),
                reason: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    async fn send(&self, envelope: &RequestEnvelope) -> Result<ResponseEnvelope, TransportError> {
        debug!(url = %self.url, packets = envelope.packets.len(), "POST envelope");

        let response = self
            .client
            .post(&self.url)
            .basic_auth(&self.username, Some(&self.password))
            .json(envelope)
            .send()
            .await
            .map_err(|e| self.classify(&e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %self.url, status = status.as_u16(), "Controller returned error status");
            return Err(TransportError::HttpStatus {
                endpoint: self.url.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| self.classify(&e))?;
        serde_json::from_slice(&body).map_err(|e| TransportError::Decode(e.to_string()))
    }
}
