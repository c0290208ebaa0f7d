//! Credential checkout for the responder-hosting service
//!
//! A request checks out one lease, shares it read-only with every
//! responder, and checks it back in exactly once. The [`LeaseGuard`]
//! schedules the check-in on drop, so a cancelled request still returns
//! its credentials.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::OrchestrationError;
use crate::Result;

pub mod command;

pub use command::CommandCredentialProvider;

/// Temporary access credentials
#[derive(Clone, PartialEq, Deserialize)]
pub struct Credentials {
    #[serde(rename = "AccessKeyId")]
    pub access_key_id: String,
    #[serde(rename = "SecretAccessKey")]
    pub secret_access_key: String,
    #[serde(rename = "SessionToken")]
    pub session_token: String,
    #[serde(rename = "Expiration", default)]
    pub expiration: Option<String>,
}

impl Credentials {
    /// Short SHA-256 fingerprint of the access key, safe to log.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.access_key_id.as_bytes());
        hex::encode(&digest[..6])
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("fingerprint", &self.fingerprint())
            .field("expiration", &self.expiration)
            .finish_non_exhaustive()
    }
}

/// A checked-out access grant
#[derive(Debug)]
pub struct CredentialLease {
    pub lease_id: Uuid,
    pub credentials: Credentials,
    pub acquired_at: DateTime<Utc>,
}

/// Capability for checking credentials in and out
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn checkout(&self, profile: &str, tenant: &str) -> Result<Credentials>;

    async fn checkin(&self, profile: &str, tenant: &str) -> Result<()>;
}

/// Scoped acquisition of a [`CredentialLease`]
#[derive(Clone)]
pub struct CredentialScope {
    provider: Arc<dyn CredentialProvider>,
    profile: String,
    tenant: String,
}

impl CredentialScope {
    pub fn new(
        provider: Arc<dyn CredentialProvider>,
        profile: impl Into<String>,
        tenant: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            profile: profile.into(),
            tenant: tenant.into(),
        }
    }

    /// Check out a lease. Failures surface as `OrchestrationError::Credential`.
    pub async fn acquire(&self) -> Result<LeaseGuard> {
        let credentials = self
            .provider
            .checkout(&self.profile, &self.tenant)
            .await
            .map_err(|e| match e {
                OrchestrationError::Credential(_) => e,
                other => OrchestrationError::Credential(other.to_string()),
            })?;

        let lease = CredentialLease {
            lease_id: Uuid::new_v4(),
            credentials,
            acquired_at: Utc::now(),
        };

        info!(
            lease_id = %lease.lease_id,
            fingerprint = %lease.credentials.fingerprint(),
            "Credentials checked out"
        );

        Ok(LeaseGuard {
            lease: Arc::new(lease),
            scope: Some(self.clone()),
        })
    }

    async fn checkin(&self, lease_id: Uuid) {
        match self.provider.checkin(&self.profile, &self.tenant).await {
            Ok(()) => info!(lease_id = %lease_id, "Credentials checked in"),
            Err(e) => warn!(lease_id = %lease_id, error = %e, "Credential check-in failed"),
        }
    }
}

/// Owns a checked-out lease until it is released.
pub struct LeaseGuard {
    lease: Arc<CredentialLease>,
    scope: Option<CredentialScope>,
}

impl LeaseGuard {
    /// Shared read-only handle for responders.
    pub fn lease(&self) -> Arc<CredentialLease> {
        Arc::clone(&self.lease)
    }

    /// Check the lease back in. Check-in errors are logged, never returned.
    pub async fn release(mut self) {
        if let Some(scope) = self.scope.take() {
            scope.checkin(self.lease.lease_id).await;
        }
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        let Some(scope) = self.scope.take() else {
            return;
        };
        let lease_id = self.lease.lease_id;

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!(lease_id = %lease_id, "Lease dropped unreleased; scheduling check-in");
                handle.spawn(async move { scope.checkin(lease_id).await });
            }
            Err(_) => warn!(lease_id = %lease_id, "Lease dropped outside runtime; check-in skipped"),
        }
    }
}

/// In-memory provider for development & testing.
/// Hands out fixed credentials and counts checkouts/check-ins.
pub struct StaticCredentialProvider {
    credentials: Credentials,
    fail_with: Option<String>,
    checkouts: AtomicUsize,
    checkins: AtomicUsize,
}

impl StaticCredentialProvider {
    pub fn new() -> Self {
        Self {
            credentials: Credentials {
                access_key_id: "ASIADEMOACCESSKEY".to_string(),
                secret_access_key: "demo-secret".to_string(),
                session_token: "demo-session-token".to_string(),
                expiration: None,
            },
            fail_with: None,
            checkouts: AtomicUsize::new(0),
            checkins: AtomicUsize::new(0),
        }
    }

    /// Provider whose checkout always fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_with: Some(message.into()),
            ..Self::new()
        }
    }

    pub fn checkouts(&self) -> usize {
        self.checkouts.load(Ordering::SeqCst)
    }

    pub fn checkins(&self) -> usize {
        self.checkins.load(Ordering::SeqCst)
    }
}

impl Default for StaticCredentialProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn checkout(&self, _profile: &str, _tenant: &str) -> Result<Credentials> {
        self.checkouts.fetch_add(1, Ordering::SeqCst);
        match &self.fail_with {
            Some(message) => Err(OrchestrationError::Credential(message.clone())),
            None => Ok(self.credentials.clone()),
        }
    }

    async fn checkin(&self, _profile: &str, _tenant: &str) -> Result<()> {
        self.checkins.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
