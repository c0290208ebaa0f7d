use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{CredentialProvider, Credentials};
use crate::error::OrchestrationError;
use crate::Result;

/// Provider that shells out to a credential checkout tool
/// (`<program> checkout <profile> -t <tenant>`).
#[derive(Debug, Clone)]
pub struct CommandCredentialProvider {
    program: String,
    timeout: Duration,
}

impl CommandCredentialProvider {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    async fn run(&self, action: &str, profile: &str, tenant: &str) -> Result<String> {
        debug!(program = %self.program, action, "Invoking credential tool");

        let output = tokio::time::timeout(self.timeout, async {
            Command::new(&self.program)
                .args([action, profile, "-t", tenant])
                .kill_on_drop(true)
                .output()
                .await
        })
        .await
        .map_err(|_| {
            OrchestrationError::Credential(format!(
                "{} {} timed out after {} seconds",
                self.program,
                action,
                self.timeout.as_secs()
            ))
        })?
        .map_err(|e| {
            OrchestrationError::Credential(format!("Failed to spawn {}: {}", self.program, e))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(status = %output.status, stderr = %stderr, "Credential tool failed");
            return Err(OrchestrationError::Credential(format!(
                "{} {} exited {}: {}",
                self.program,
                action,
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Parse checkout output. The tool may print progress dots before the JSON.
pub fn parse_checkout_output(stdout: &str) -> Result<Credentials> {
    let trimmed = stdout.trim();
    let start = trimmed.find('{').ok_or_else(|| {
        OrchestrationError::Credential("No JSON found in checkout output".to_string())
    })?;

    serde_json::from_str::<Credentials>(&trimmed[start..]).map_err(|e| {
        OrchestrationError::Credential(format!("Could not parse checkout credentials: {}", e))
    })
}

#[async_trait]
impl CredentialProvider for CommandCredentialProvider {
    async fn checkout(&self, profile: &str, tenant: &str) -> Result<Credentials> {
        let stdout = self.run("checkout", profile, tenant).await?;
        parse_checkout_output(&stdout)
    }

    async fn checkin(&self, profile: &str, tenant: &str) -> Result<()> {
        self.run("checkin", profile, tenant).await.map(|_| ())
    }
}
