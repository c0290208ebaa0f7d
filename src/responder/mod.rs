//! Responder adapter
//!
//! Calls one remote specialist for one domain. Each call carries a fresh
//! correlation token and the shared credential lease, runs under a
//! timeout, and has its envelope normalized to text. Errors never escape
//! `invoke`; they come back as a failed [`ResponderResult`].

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ResponderConfig;
use crate::credentials::CredentialLease;
use crate::data::DataSource;
use crate::error::OrchestrationError;
use crate::models::{Domain, ResponderResult};
use crate::Result;

pub mod demo;
pub mod enrichment;
pub mod envelope;
pub mod http;

pub use demo::DemoResponder;
pub use enrichment::Enricher;
pub use http::HttpResponder;

/// Transport to a remote responder
#[async_trait]
pub trait RemoteResponder: Send + Sync {
    /// Deliver `payload` to `endpoint` and return the raw response envelope.
    async fn call(
        &self,
        endpoint: &str,
        correlation_token: &str,
        payload: Vec<u8>,
        lease: &CredentialLease,
    ) -> Result<Vec<u8>>;
}

/// Text used when a responder succeeds with nothing to say.
pub fn empty_response_text(domain: Domain) -> String {
    format!("Agent {} completed but returned empty response.", domain)
}

pub struct ResponderAdapter {
    config: ResponderConfig,
    enricher: Enricher,
    remote: Arc<dyn RemoteResponder>,
}

impl ResponderAdapter {
    pub fn new(
        config: ResponderConfig,
        data: Arc<dyn DataSource>,
        remote: Arc<dyn RemoteResponder>,
    ) -> Self {
        let enricher = Enricher::new(data, config.transaction_count);
        Self {
            config,
            enricher,
            remote,
        }
    }

    /// Invoke the responder for `domain`. Always yields a result.
    pub async fn invoke(
        &self,
        domain: Domain,
        query: &str,
        lease: &CredentialLease,
    ) -> ResponderResult {
        let start = Instant::now();

        match self.try_invoke(domain, query, lease).await {
            Ok(text) => {
                info!(
                    domain = %domain,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    chars = text.len(),
                    "Responder succeeded"
                );
                ResponderResult::success(domain, text)
            }
            Err(e) => {
                warn!(
                    domain = %domain,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    error = %e,
                    "Responder failed"
                );
                ResponderResult::failure(domain, e.to_string())
            }
        }
    }

    async fn try_invoke(&self, domain: Domain, query: &str, lease: &CredentialLease) -> Result<String> {
        let endpoint = self.config.endpoint(domain).ok_or_else(|| {
            OrchestrationError::Configuration(format!("No endpoint configured for {}", domain))
        })?;

        let correlation_token = Uuid::new_v4().to_string();
        let prompt = self.enricher.enrich(domain, query).await;
        let payload = serde_json::to_vec(&json!({ "inputText": prompt }))?;

        debug!(
            domain = %domain,
            endpoint = %endpoint,
            correlation_token = %correlation_token,
            "Calling responder"
        );

        let raw = tokio::time::timeout(
            self.config.timeout,
            self.remote.call(endpoint, &correlation_token, payload, lease),
        )
        .await
        .map_err(|_| OrchestrationError::Timeout(self.config.timeout.as_secs()))??;

        let text = envelope::normalize(&raw);
        if text.trim().is_empty() {
            return Ok(empty_response_text(domain));
        }
        Ok(text)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scriptable responders for unit tests.

    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    pub enum Script {
        Reply(&'static str),
        Fail(&'static str),
        Hang,
        Panic,
    }

    /// Remote responder keyed by endpoint suffix, recording every call.
    pub struct ScriptedResponder {
        scripts: Vec<(Domain, Script)>,
        calls: Mutex<Vec<(String, String, String)>>,
    }

    impl ScriptedResponder {
        pub fn new(scripts: Vec<(Domain, Script)>) -> Self {
            Self {
                scripts,
                calls: Mutex::new(Vec::new()),
            }
        }

        /// `(endpoint, token, inputText)` of each call.
        pub fn calls(&self) -> Vec<(String, String, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RemoteResponder for ScriptedResponder {
        async fn call(
            &self,
            endpoint: &str,
            correlation_token: &str,
            payload: Vec<u8>,
            _lease: &CredentialLease,
        ) -> Result<Vec<u8>> {
            let body: serde_json::Value = serde_json::from_slice(&payload)?;
            let input = body["inputText"].as_str().unwrap_or_default().to_string();
            self.calls.lock().unwrap().push((
                endpoint.to_string(),
                correlation_token.to_string(),
                input,
            ));

            let script = self
                .scripts
                .iter()
                .find(|(domain, _)| endpoint.ends_with(domain.as_str()))
                .map(|(_, script)| script);

            match script {
                Some(Script::Reply(body)) => Ok(body.as_bytes().to_vec()),
                Some(Script::Fail(msg)) => Err(OrchestrationError::Transport(msg.to_string())),
                Some(Script::Hang) => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(Vec::new())
                }
                Some(Script::Panic) => panic!("responder crashed"),
                None => Ok(Vec::new()),
            }
        }
    }

    pub fn lease() -> CredentialLease {
        CredentialLease {
            lease_id: Uuid::new_v4(),
            credentials: crate::credentials::Credentials {
                access_key_id: "ASIATEST".to_string(),
                secret_access_key: "secret".to_string(),
                session_token: "token".to_string(),
                expiration: None,
            },
            acquired_at: chrono::Utc::now(),
        }
    }

    pub fn config(timeout: Duration) -> ResponderConfig {
        ResponderConfig {
            timeout,
            ..ResponderConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::data::StaticDataSource;
    use std::time::Duration;

    fn adapter(remote: Arc<ScriptedResponder>, timeout: Duration) -> ResponderAdapter {
        ResponderAdapter::new(config(timeout), Arc::new(StaticDataSource::new()), remote)
    }

    #[tokio::test]
    async fn test_success_is_normalized() {
        let remote = Arc::new(ScriptedResponder::new(vec![(
            Domain::Compliance,
            Script::Reply(r#"{"result": {"content": [{"text": "All controls passing"}]}}"#),
        )]));
        let result = adapter(remote, Duration::from_secs(5))
            .invoke(Domain::Compliance, "SOX status?", &lease())
            .await;

        assert!(result.succeeded);
        assert_eq!(result.text, "All controls passing");
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_empty_response_sentinel() {
        let remote = Arc::new(ScriptedResponder::new(vec![(
            Domain::FraudDetection,
            Script::Reply(r#"{"result": {"content": []}}"#),
        )]));
        let result = adapter(remote, Duration::from_secs(5))
            .invoke(Domain::FraudDetection, "fraud?", &lease())
            .await;

        assert!(result.succeeded);
        assert_eq!(
            result.text,
            "Agent fraud_detection completed but returned empty response."
        );
    }

    #[tokio::test]
    async fn test_transport_failure_is_captured() {
        let remote = Arc::new(ScriptedResponder::new(vec![(
            Domain::RiskAnalysis,
            Script::Fail("connection refused"),
        )]));
        let result = adapter(remote, Duration::from_secs(5))
            .invoke(Domain::RiskAnalysis, "risk?", &lease())
            .await;

        assert!(!result.succeeded);
        assert!(result.text.is_empty());
        assert_eq!(
            result.error.as_deref(),
            Some("Transport error: connection refused")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_captured() {
        let remote = Arc::new(ScriptedResponder::new(vec![(Domain::RiskAnalysis, Script::Hang)]));
        let result = adapter(remote, Duration::from_secs(60))
            .invoke(Domain::RiskAnalysis, "risk?", &lease())
            .await;

        assert!(!result.succeeded);
        assert_eq!(
            result.error.as_deref(),
            Some("Responder timed out after 60 seconds")
        );
    }

    #[tokio::test]
    async fn test_missing_endpoint_is_configuration_failure() {
        let remote = Arc::new(ScriptedResponder::new(vec![]));
        let mut cfg = config(Duration::from_secs(5));
        cfg.endpoints.remove(&Domain::Compliance);
        let adapter =
            ResponderAdapter::new(cfg, Arc::new(StaticDataSource::new()), remote.clone());

        let result = adapter.invoke(Domain::Compliance, "audit?", &lease()).await;

        assert!(!result.succeeded);
        assert!(result.error.unwrap().starts_with("Configuration error"));
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn test_fresh_token_per_call() {
        let remote = Arc::new(ScriptedResponder::new(vec![]));
        let adapter = adapter(remote.clone(), Duration::from_secs(5));
        let lease = lease();

        adapter.invoke(Domain::Compliance, "audit?", &lease).await;
        adapter.invoke(Domain::Compliance, "audit?", &lease).await;

        let calls = remote.calls();
        assert_eq!(calls.len(), 2);
        assert_ne!(calls[0].1, calls[1].1);
        assert!(Uuid::parse_str(&calls[0].1).is_ok());
    }

    #[tokio::test]
    async fn test_risk_prompt_enrichment() {
        let remote = Arc::new(ScriptedResponder::new(vec![]));
        let adapter = adapter(remote.clone(), Duration::from_secs(5));
        let lease = lease();

        adapter
            .invoke(Domain::RiskAnalysis, "VaR for $50,000 portfolio", &lease)
            .await;
        adapter.invoke(Domain::RiskAnalysis, "What's my risk?", &lease).await;

        let calls = remote.calls();
        assert_eq!(calls[0].2, "VaR for $50,000 portfolio");
        assert!(calls[1].2.starts_with("What's my risk?"));
        assert!(calls[1].2.contains("Portfolio Value: $1,000,000"));
    }
}
