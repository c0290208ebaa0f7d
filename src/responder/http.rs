use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, error};

use super::RemoteResponder;
use crate::credentials::CredentialLease;
use crate::error::OrchestrationError;
use crate::Result;

/// Header carrying the per-call correlation token.
pub const SESSION_HEADER: &str = "X-Runtime-Session-Id";

/// Responder reached over HTTPS. The lease's session token is sent as a
/// bearer credential.
#[derive(Clone)]
pub struct HttpResponder {
    client: Client,
}

impl HttpResponder {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(timeout)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl RemoteResponder for HttpResponder {
    async fn call(
        &self,
        endpoint: &str,
        correlation_token: &str,
        payload: Vec<u8>,
        lease: &CredentialLease,
    ) -> Result<Vec<u8>> {
        debug!(endpoint = %endpoint, bytes = payload.len(), "POST to responder");

        let response = self
            .client
            .post(endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .header(SESSION_HEADER, correlation_token)
            .bearer_auth(&lease.credentials.session_token)
            .body(payload)
            .send()
            .await
            .map_err(|e| {
                error!("Responder request failed: {}", e);
                OrchestrationError::Transport(format!("Request to {} failed: {}", endpoint, e))
            })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            OrchestrationError::Transport(format!("Failed reading response body: {}", e))
        })?;

        if !status.is_success() {
            return Err(OrchestrationError::Transport(format!(
                "Responder returned {}: {}",
                status,
                String::from_utf8_lossy(&body).trim()
            )));
        }

        Ok(body.to_vec())
    }
}
