//! Core data models for the FinOps query router

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::OrchestrationError;

//
// ================= Domain =================
//

/// Specialist analysis category. Closed set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    FraudDetection,
    Compliance,
    RiskAnalysis,
    Supervisor,
}

impl Domain {
    pub const ALL: [Domain; 4] = [
        Domain::FraudDetection,
        Domain::Compliance,
        Domain::RiskAnalysis,
        Domain::Supervisor,
    ];

    /// Domains the classifier may select, in priority order.
    pub const SPECIALISTS: [Domain; 3] = [
        Domain::FraudDetection,
        Domain::Compliance,
        Domain::RiskAnalysis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::FraudDetection => "fraud_detection",
            Domain::Compliance => "compliance",
            Domain::RiskAnalysis => "risk_analysis",
            Domain::Supervisor => "supervisor",
        }
    }

    /// Section heading used in the combined report.
    pub fn title(&self) -> &'static str {
        match self {
            Domain::FraudDetection => "Fraud Detection",
            Domain::Compliance => "Compliance",
            Domain::RiskAnalysis => "Risk Analysis",
            Domain::Supervisor => "Supervisor",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = OrchestrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fraud_detection" | "fraud" => Ok(Domain::FraudDetection),
            "compliance" => Ok(Domain::Compliance),
            "risk_analysis" | "risk" => Ok(Domain::RiskAnalysis),
            "supervisor" => Ok(Domain::Supervisor),
            other => Err(OrchestrationError::Configuration(format!(
                "Unknown domain: {}",
                other
            ))),
        }
    }
}

//
// ================= Routing =================
//

/// Ordered, duplicate-free list of domains selected for one query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoutingPlan {
    domains: Vec<Domain>,
}

impl RoutingPlan {
    pub fn new<I: IntoIterator<Item = Domain>>(domains: I) -> Self {
        let mut plan = Self::default();
        for domain in domains {
            plan.push(domain);
        }
        plan
    }

    pub fn single(domain: Domain) -> Self {
        Self {
            domains: vec![domain],
        }
    }

    /// Appends `domain` unless it is already planned.
    pub(crate) fn push(&mut self, domain: Domain) {
        if !self.domains.contains(&domain) {
            self.domains.push(domain);
        }
    }

    pub fn domains(&self) -> &[Domain] {
        &self.domains
    }

    pub fn iter(&self) -> impl Iterator<Item = &Domain> {
        self.domains.iter()
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

//
// ================= Responder Results =================
//

/// Outcome of one responder invocation within a request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponderResult {
    pub domain: Domain,
    pub succeeded: bool,
    pub text: String,
    pub error: Option<String>,
}

impl ResponderResult {
    pub fn success(domain: Domain, text: String) -> Self {
        Self {
            domain,
            succeeded: true,
            text,
            error: None,
        }
    }

    pub fn failure(domain: Domain, error: impl Into<String>) -> Self {
        Self {
            domain,
            succeeded: false,
            text: String::new(),
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportOutcome {
    FullySucceeded,
    PartiallySucceeded,
    Failed,
}

/// Merged result of one request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregateReport {
    pub overall_succeeded: bool,
    pub combined_text: String,
    pub domains_invoked: Vec<Domain>,
    pub errors: Vec<String>,
}

impl AggregateReport {
    /// Report for a request that failed before any responder ran.
    pub fn request_failure(error: impl Into<String>) -> Self {
        Self {
            overall_succeeded: false,
            combined_text: String::new(),
            domains_invoked: Vec::new(),
            errors: vec![error.into()],
        }
    }

    pub fn responders_ran(&self) -> bool {
        !self.domains_invoked.is_empty()
    }

    pub fn outcome(&self) -> ReportOutcome {
        match (self.overall_succeeded, self.errors.is_empty()) {
            (true, true) => ReportOutcome::FullySucceeded,
            (true, false) => ReportOutcome::PartiallySucceeded,
            (false, _) => ReportOutcome::Failed,
        }
    }
}

//
// ================= Market Data =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: String,
    pub volume: u64,
    pub timestamp: String,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub pe_ratio: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FinancialRatios {
    pub symbol: String,
    pub current_ratio: Option<f64>,
    pub quick_ratio: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub roe: Option<f64>,
    pub roa: Option<f64>,
    pub profit_margin: Option<f64>,
    pub operating_margin: Option<f64>,
    pub gross_margin: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub pb_ratio: Option<f64>,
    pub beta: Option<f64>,
    #[serde(rename = "52_week_high")]
    pub fifty_two_week_high: Option<f64>,
    #[serde(rename = "52_week_low")]
    pub fifty_two_week_low: Option<f64>,
}

//
// ================= Synthetic Records =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub transaction_id: String,
    pub amount: f64,
    pub timestamp: DateTime<Utc>,
    pub merchant: String,
    pub risk_score: f64,
    pub flag: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComplianceSnapshot {
    pub sox_compliance: SoxStatus,
    pub pci_dss: PciStatus,
    pub aml_monitoring: AmlStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SoxStatus {
    pub status: String,
    pub last_audit: String,
    pub next_audit: String,
    pub controls_tested: u32,
    pub controls_passed: u32,
    pub compliance_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PciStatus {
    pub status: String,
    pub certification_expiry: String,
    pub requirements_met: u32,
    pub total_requirements: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AmlStatus {
    pub status: String,
    pub suspicious_activities: u32,
    pub reports_filed: u32,
    pub review_period: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_wire_names() {
        let json = serde_json::to_string(&Domain::FraudDetection).unwrap();
        assert_eq!(json, "\"fraud_detection\"");

        for domain in Domain::ALL {
            assert_eq!(domain.as_str().parse::<Domain>().unwrap(), domain);
        }
        assert!("marketing".parse::<Domain>().is_err());
    }

    #[test]
    fn test_routing_plan_deduplicates() {
        let plan = RoutingPlan::new([
            Domain::Compliance,
            Domain::FraudDetection,
            Domain::Compliance,
        ]);
        assert_eq!(plan.domains(), &[Domain::Compliance, Domain::FraudDetection]);
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn test_report_outcomes() {
        let mut report = AggregateReport {
            overall_succeeded: true,
            combined_text: "### Compliance\n\nok".into(),
            domains_invoked: vec![Domain::Compliance],
            errors: vec![],
        };
        assert_eq!(report.outcome(), ReportOutcome::FullySucceeded);

        report.errors.push("❌ risk_analysis: timeout".into());
        assert_eq!(report.outcome(), ReportOutcome::PartiallySucceeded);

        let failed = AggregateReport::request_failure("Credential error: denied");
        assert_eq!(failed.outcome(), ReportOutcome::Failed);
        assert!(!failed.responders_ran());
        assert!(failed.combined_text.is_empty());
    }
}
