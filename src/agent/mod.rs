//! Main orchestrator
//!
//! VALIDATE → CLASSIFY → ACQUIRE → FAN OUT → RELEASE → AGGREGATE
//!
//! Responder-level failures never leave this module as errors; they are
//! folded into the [`AggregateReport`]. Only an empty query is rejected.

use std::sync::Arc;
use std::time::Instant;
use tokio::task::{AbortHandle, JoinError};
use tracing::{debug, error, info, warn};

use crate::classifier::QueryClassifier;
use crate::credentials::{CredentialLease, CredentialScope};
use crate::error::OrchestrationError;
use crate::models::{AggregateReport, Domain, ResponderResult, RoutingPlan};
use crate::responder::ResponderAdapter;
use crate::Result;

const SECTION_SEPARATOR: &str = "\n\n---\n\n";

/// Aborts in-flight responder tasks if the request future is dropped.
struct AbortOnDrop(Vec<AbortHandle>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

pub struct Orchestrator {
    classifier: QueryClassifier,
    credentials: CredentialScope,
    responders: Arc<ResponderAdapter>,
}

impl Orchestrator {
    pub fn new(
        classifier: QueryClassifier,
        credentials: CredentialScope,
        responders: Arc<ResponderAdapter>,
    ) -> Self {
        Self {
            classifier,
            credentials,
            responders,
        }
    }

    pub fn classifier(&self) -> &QueryClassifier {
        &self.classifier
    }

    /// Answer one query.
    ///
    /// Returns `Err` only for an empty query. A credential failure yields a
    /// failed report without contacting any responder.
    pub async fn handle(&self, query: &str) -> Result<AggregateReport> {
        let start = Instant::now();

        if query.trim().is_empty() {
            return Err(OrchestrationError::Validation("Query is required".to_string()));
        }

        let plan = self.classifier.classify(query);
        info!(domains = ?plan.domains(), "Orchestrator: routing query");

        let guard = match self.credentials.acquire().await {
            Ok(guard) => guard,
            Err(e) => {
                error!(error = %e, "Credential checkout failed; no responders invoked");
                return Ok(AggregateReport::request_failure(e.to_string()));
            }
        };

        let results = self.dispatch(&plan, query, guard.lease()).await;
        guard.release().await;

        let report = aggregate(&plan, results);
        info!(
            outcome = ?report.outcome(),
            errors = report.errors.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Orchestrator: request complete"
        );
        Ok(report)
    }

    /// Fan out to every planned domain; results come back in plan order.
    async fn dispatch(
        &self,
        plan: &RoutingPlan,
        query: &str,
        lease: Arc<CredentialLease>,
    ) -> Vec<ResponderResult> {
        let query: Arc<str> = Arc::from(query);

        let tasks: Vec<_> = plan
            .iter()
            .map(|&domain| {
                let responders = Arc::clone(&self.responders);
                let query = Arc::clone(&query);
                let lease = Arc::clone(&lease);
                let handle =
                    tokio::spawn(async move { responders.invoke(domain, &query, &lease).await });
                (domain, handle)
            })
            .collect();

        let _abort = AbortOnDrop(tasks.iter().map(|(_, h)| h.abort_handle()).collect());
        debug!(tasks = tasks.len(), "Responders dispatched");

        let mut results = Vec::with_capacity(tasks.len());
        for (domain, handle) in tasks {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => task_failure(domain, e),
            };
            results.push(result);
        }
        results
    }
}

fn task_failure(domain: Domain, e: JoinError) -> ResponderResult {
    let reason = if e.is_panic() {
        "responder panicked".to_string()
    } else {
        e.to_string()
    };
    let err = OrchestrationError::TaskFailed(reason);
    warn!(domain = %domain, error = %err, "Responder task did not complete");
    ResponderResult::failure(domain, err.to_string())
}

/// Merge per-domain results into one report, in plan order.
pub fn aggregate(plan: &RoutingPlan, results: Vec<ResponderResult>) -> AggregateReport {
    let mut sections = Vec::new();
    let mut errors = Vec::new();

    for result in &results {
        if result.succeeded {
            sections.push(format!("### {}\n\n{}", result.domain.title(), result.text));
        } else {
            let message = result.error.as_deref().unwrap_or("unknown error");
            errors.push(format!("❌ {}: {}", result.domain, message));
        }
    }

    let mut combined_text = sections.join(SECTION_SEPARATOR);
    if !errors.is_empty() {
        combined_text.push_str("\n\n**Errors:**\n");
        combined_text.push_str(&errors.join("\n"));
    }

    AggregateReport {
        overall_succeeded: results.iter().any(|r| r.succeeded),
        combined_text,
        domains_invoked: plan.domains().to_vec(),
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::StaticCredentialProvider;
    use crate::data::StaticDataSource;
    use crate::models::ReportOutcome;
    use crate::responder::testing::{config, Script, ScriptedResponder};
    use std::time::Duration;

    fn orchestrator(
        remote: Arc<ScriptedResponder>,
        provider: Arc<StaticCredentialProvider>,
    ) -> Orchestrator {
        let adapter = ResponderAdapter::new(
            config(Duration::from_secs(5)),
            Arc::new(StaticDataSource::new()),
            remote,
        );
        Orchestrator::new(
            QueryClassifier::default(),
            CredentialScope::new(provider, "profile", "tenant"),
            Arc::new(adapter),
        )
    }

    fn reply(text: &'static str) -> Script {
        Script::Reply(text)
    }

    #[test]
    fn test_aggregate_formats_sections_and_errors() {
        let plan = RoutingPlan::new([Domain::FraudDetection, Domain::Compliance, Domain::RiskAnalysis]);
        let report = aggregate(
            &plan,
            vec![
                ResponderResult::success(Domain::FraudDetection, "No fraud".into()),
                ResponderResult::failure(Domain::Compliance, "Transport error: 503"),
                ResponderResult::success(Domain::RiskAnalysis, "VaR ok".into()),
            ],
        );

        assert!(report.overall_succeeded);
        assert_eq!(
            report.combined_text,
            "### Fraud Detection\n\nNo fraud\n\n---\n\n### Risk Analysis\n\nVaR ok\n\n**Errors:**\n❌ compliance: Transport error: 503"
        );
        assert_eq!(report.errors, vec!["❌ compliance: Transport error: 503"]);
        assert_eq!(report.outcome(), ReportOutcome::PartiallySucceeded);
    }

    #[test]
    fn test_aggregate_all_failed() {
        let plan = RoutingPlan::single(Domain::RiskAnalysis);
        let report = aggregate(
            &plan,
            vec![ResponderResult::failure(Domain::RiskAnalysis, "boom")],
        );

        assert!(!report.overall_succeeded);
        assert_eq!(report.combined_text, "\n\n**Errors:**\n❌ risk_analysis: boom");
        assert_eq!(report.domains_invoked, vec![Domain::RiskAnalysis]);
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let provider = Arc::new(StaticCredentialProvider::new());
        let remote = Arc::new(ScriptedResponder::new(vec![]));
        let orch = orchestrator(remote.clone(), provider.clone());

        let err = orch.handle("   ").await.unwrap_err();
        assert!(matches!(err, OrchestrationError::Validation(_)));
        assert_eq!(provider.checkouts(), 0);
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn test_single_domain_success() {
        let provider = Arc::new(StaticCredentialProvider::new());
        let remote = Arc::new(ScriptedResponder::new(vec![(
            Domain::Compliance,
            reply(r#"{"result": {"content": [{"text": "Next audit in 320 days"}]}}"#),
        )]));
        let orch = orchestrator(remote.clone(), provider.clone());

        let report = orch.handle("When is the next audit?").await.unwrap();

        assert_eq!(report.domains_invoked, vec![Domain::Compliance]);
        assert_eq!(report.combined_text, "### Compliance\n\nNext audit in 320 days");
        assert_eq!(report.outcome(), ReportOutcome::FullySucceeded);
        assert_eq!(provider.checkouts(), 1);
        assert_eq!(provider.checkins(), 1);
    }

    #[tokio::test]
    async fn test_query_is_forwarded_verbatim() {
        let query = "  VaR for $50,000 portfolio\n";
        let remote = Arc::new(ScriptedResponder::new(vec![]));
        let orch = orchestrator(remote.clone(), Arc::new(StaticCredentialProvider::new()));

        orch.handle(query).await.unwrap();

        let calls = remote.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].0.ends_with("risk_analysis"));
        assert_eq!(calls[0].2, query);
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_plan_order() {
        let provider = Arc::new(StaticCredentialProvider::new());
        let remote = Arc::new(ScriptedResponder::new(vec![
            (Domain::FraudDetection, reply(r#"{"output": "fraud ok"}"#)),
            (Domain::Compliance, Script::Fail("503 Service Unavailable")),
            (Domain::RiskAnalysis, reply(r#"{"text": "risk ok"}"#)),
        ]));
        let orch = orchestrator(remote.clone(), provider.clone());

        let report = orch
            .handle("Check suspicious transactions for compliance and risk")
            .await
            .unwrap();

        assert!(report.overall_succeeded);
        assert_eq!(
            report.domains_invoked,
            vec![Domain::FraudDetection, Domain::Compliance, Domain::RiskAnalysis]
        );
        let fraud_at = report.combined_text.find("### Fraud Detection").unwrap();
        let risk_at = report.combined_text.find("### Risk Analysis").unwrap();
        assert!(fraud_at < risk_at);
        assert_eq!(
            report.errors,
            vec!["❌ compliance: Transport error: 503 Service Unavailable"]
        );
        assert_eq!(remote.calls().len(), 3);
        assert_eq!(provider.checkins(), 1);
    }

    #[tokio::test]
    async fn test_credential_failure_skips_dispatch() {
        let provider = Arc::new(StaticCredentialProvider::failing("checkout denied"));
        let remote = Arc::new(ScriptedResponder::new(vec![]));
        let orch = orchestrator(remote.clone(), provider.clone());

        let report = orch.handle("Any fraud today?").await.unwrap();

        assert!(!report.overall_succeeded);
        assert!(report.combined_text.is_empty());
        assert!(!report.responders_ran());
        assert_eq!(report.errors, vec!["Credential error: checkout denied"]);
        assert!(remote.calls().is_empty());
        assert_eq!(provider.checkins(), 0);
    }

    #[tokio::test]
    async fn test_panicking_responder_still_releases_once() {
        let provider = Arc::new(StaticCredentialProvider::new());
        let remote = Arc::new(ScriptedResponder::new(vec![
            (Domain::FraudDetection, Script::Panic),
            (Domain::Compliance, reply(r#"{"message": "compliant"}"#)),
        ]));
        let orch = orchestrator(remote.clone(), provider.clone());

        let report = orch.handle("fraud and sox check").await.unwrap();

        assert!(report.overall_succeeded);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("❌ fraud_detection: Responder task failed"));
        assert_eq!(provider.checkins(), 1);
    }

    #[tokio::test]
    async fn test_unmatched_query_uses_fallback() {
        let provider = Arc::new(StaticCredentialProvider::new());
        let remote = Arc::new(ScriptedResponder::new(vec![]));
        let orch = orchestrator(remote.clone(), provider);

        let report = orch.handle("hello there").await.unwrap();

        let fallback = orch.classifier().fallback();
        assert_eq!(report.domains_invoked, vec![fallback]);
        assert_eq!(
            report.combined_text,
            format!(
                "### {}\n\nAgent {} completed but returned empty response.",
                fallback.title(),
                fallback
            )
        );
    }

    #[tokio::test]
    async fn test_dropped_request_still_checks_in() {
        let provider = Arc::new(StaticCredentialProvider::new());
        let remote = Arc::new(ScriptedResponder::new(vec![(Domain::RiskAnalysis, Script::Hang)]));
        let orch = orchestrator(remote, provider.clone());

        let outcome =
            tokio::time::timeout(Duration::from_millis(50), orch.handle("What's my risk?")).await;
        assert!(outcome.is_err());

        for _ in 0..50 {
            if provider.checkins() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(provider.checkins(), 1);
    }
}
