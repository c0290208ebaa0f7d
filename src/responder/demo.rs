//! In-process demo analysts
//!
//! Serves `demo://<domain>` endpoints without any network access so the
//! router works end to end on a laptop. Replies use the same nested
//! `result.content[].text` envelope the hosted responders return.

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{json, Value};
use std::fmt::Write;
use tracing::debug;

use super::RemoteResponder;
use crate::classifier::QueryClassifier;
use crate::credentials::CredentialLease;
use crate::error::OrchestrationError;
use crate::models::Domain;
use crate::Result;

pub const DEMO_SCHEME: &str = "demo://";

/// Daily volatility assumed for VaR
const VOLATILITY: f64 = 0.15;

/// z-score for 95% confidence
const Z_95: f64 = 1.645;

const URGENT_WORDS: &[&str] = &["urgent", "immediate", "critical", "emergency", "alert"];

lazy_static! {
    static ref TRANSACTION_BLOCK: Regex = Regex::new(
        r"Transaction #\d+ \(([^)]+)\):\s*-\s*Amount: \$([\d,]+(?:\.\d+)?)\s*-\s*Risk Score: ([\d.]+)"
    )
    .expect("valid transaction regex");
    static ref THOUSANDS: Regex =
        Regex::new(r"(?i)\$?(\d+(?:\.\d+)?)k\b").expect("valid thousands regex");
    static ref PLAIN_AMOUNT: Regex = Regex::new(r"\$?(\d[\d,]*)").expect("valid amount regex");
}

pub struct DemoResponder {
    fraud_threshold: f64,
    classifier: QueryClassifier,
}

impl DemoResponder {
    pub fn new(fraud_threshold: f64) -> Self {
        Self {
            fraud_threshold,
            classifier: QueryClassifier::default(),
        }
    }

    fn answer(&self, domain: Domain, prompt: &str) -> String {
        match domain {
            Domain::FraudDetection => analyze_transactions(prompt, self.fraud_threshold),
            Domain::Compliance => compliance_dashboard(prompt),
            Domain::RiskAnalysis => match extract_portfolio_value(prompt) {
                Some(value) => value_at_risk(value),
                None => "⚠️ I need a portfolio value to calculate VaR. \
                         Include one, for example \"VaR for $50,000 portfolio\"."
                    .to_string(),
            },
            Domain::Supervisor => self.decompose(prompt),
        }
    }

    fn decompose(&self, prompt: &str) -> String {
        let mut domains = self.classifier.matched_domains(prompt);
        if domains.is_empty() {
            domains = Domain::SPECIALISTS.to_vec();
        }

        let lower = prompt.to_lowercase();
        let priority = if URGENT_WORDS.iter().any(|w| lower.contains(w)) {
            "high"
        } else {
            "normal"
        };

        let subtasks: Vec<Value> = domains
            .iter()
            .enumerate()
            .map(|(i, domain)| {
                json!({
                    "task": subtask_description(*domain),
                    "agent": domain.as_str(),
                    "priority": i + 1,
                })
            })
            .collect();

        let plan = json!({
            "original_query": prompt,
            "subtasks": subtasks,
            "agent_sequence": domains.iter().map(Domain::as_str).collect::<Vec<_>>(),
            "priority": priority,
        });

        serde_json::to_string_pretty(&plan).unwrap_or_else(|_| plan.to_string())
    }
}

fn subtask_description(domain: Domain) -> &'static str {
    match domain {
        Domain::FraudDetection => "Analyze transactions for fraud patterns and suspicious activities",
        Domain::Compliance => "Check compliance status and regulatory requirements",
        Domain::RiskAnalysis => "Calculate risk metrics and assess portfolio exposure",
        Domain::Supervisor => "Coordinate specialist analysis",
    }
}

#[async_trait]
impl RemoteResponder for DemoResponder {
    async fn call(
        &self,
        endpoint: &str,
        correlation_token: &str,
        payload: Vec<u8>,
        _lease: &CredentialLease,
    ) -> Result<Vec<u8>> {
        let domain: Domain = endpoint
            .strip_prefix(DEMO_SCHEME)
            .ok_or_else(|| {
                OrchestrationError::Configuration(format!("Not a demo endpoint: {}", endpoint))
            })?
            .parse()?;

        let body: Value = serde_json::from_slice(&payload)?;
        let prompt = body
            .get("inputText")
            .and_then(Value::as_str)
            .ok_or_else(|| OrchestrationError::Decode("Payload has no inputText".to_string()))?;

        debug!(domain = %domain, correlation_token, "Demo analyst answering");

        let envelope = json!({
            "result": {
                "role": "assistant",
                "content": [{ "text": self.answer(domain, prompt) }],
            }
        });
        Ok(serde_json::to_vec(&envelope)?)
    }
}

/// `$1234.5` -> `$1,234.50`
pub fn format_money(value: f64) -> String {
    let cents = (value.abs() * 100.0).round() as u64;
    let digits = (cents / 100).to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    format!("{}${}.{:02}", sign, grouped, cents % 100)
}

/// Portfolio value stated in free text: `$100k`, `$100,000`, `250000`.
/// Bare numbers shorter than five digits are ignored.
pub fn extract_portfolio_value(text: &str) -> Option<f64> {
    if let Some(caps) = THOUSANDS.captures(text) {
        if let Ok(n) = caps[1].parse::<f64>() {
            return Some(n * 1000.0);
        }
    }

    PLAIN_AMOUNT.captures_iter(text).find_map(|caps| {
        let digits = caps[1].replace(',', "");
        if digits.len() >= 5 {
            digits.parse::<f64>().ok()
        } else {
            None
        }
    })
}

pub fn value_at_risk(portfolio_value: f64) -> String {
    if portfolio_value <= 0.0 {
        return "⚠️ Portfolio value must be greater than zero".to_string();
    }
    let var = portfolio_value * VOLATILITY * Z_95;

    let mut out = String::from("📊 VALUE AT RISK ANALYSIS\n");
    let _ = writeln!(out, "Portfolio Value: {}", format_money(portfolio_value));
    let _ = writeln!(out, "Volatility: {:.2}%", VOLATILITY * 100.0);
    out.push_str("Confidence Level: 95%\n");
    let _ = writeln!(out, "Daily VaR (95%): {}", format_money(var));
    let _ = write!(
        out,
        "\n💡 There is a 5% chance of losing more than {} in a single day.",
        format_money(var)
    );
    out
}

struct ParsedTransaction {
    id: String,
    amount: f64,
    risk_score: f64,
}

pub fn analyze_transactions(prompt: &str, threshold: f64) -> String {
    let transactions: Vec<ParsedTransaction> = TRANSACTION_BLOCK
        .captures_iter(prompt)
        .filter_map(|caps| {
            Some(ParsedTransaction {
                id: caps[1].to_string(),
                amount: caps[2].replace(',', "").parse().ok()?,
                risk_score: caps[3].parse().ok()?,
            })
        })
        .collect();

    if transactions.is_empty() {
        return "⚠️ No transactions provided for analysis".to_string();
    }

    let high_risk: Vec<&ParsedTransaction> = transactions
        .iter()
        .filter(|t| t.risk_score > threshold)
        .collect();

    let mut out = String::from("🔍 FRAUD DETECTION ANALYSIS\n");
    let _ = writeln!(out, "Total Transactions: {}", transactions.len());
    let _ = writeln!(out, "High-Risk Transactions: {}", high_risk.len());
    let _ = writeln!(out, "Risk Threshold: {}", threshold);

    if high_risk.is_empty() {
        out.push_str("\n✅ No high-risk transactions detected");
    } else {
        out.push_str("\nTop High-Risk Transactions:");
        for t in high_risk.iter().take(5) {
            let _ = write!(
                out,
                "\n• {} - {} (Risk: {:.2})",
                t.id,
                format_money(t.amount),
                t.risk_score
            );
        }
    }
    out
}

pub fn compliance_dashboard(prompt: &str) -> String {
    let status_of = |prefix: &str| {
        prompt
            .lines()
            .map(str::trim)
            .find_map(|line| line.strip_prefix(prefix))
            .map(str::trim)
    };

    let (Some(sox), Some(pci), Some(aml)) = (status_of("SOX:"), status_of("PCI-DSS:"), status_of("AML:"))
    else {
        return "⚠️ No compliance status supplied; schedule a full SOX, PCI-DSS and AML review."
            .to_string();
    };

    let mut out = String::from("COMPLIANCE STATUS DASHBOARD\n\n");
    let _ = writeln!(out, "📊 SOX (Sarbanes-Oxley): {}", sox);
    let _ = writeln!(out, "💳 PCI-DSS: {}", pci);
    let _ = writeln!(out, "🏦 AML Monitoring: {}", aml);

    out.push_str("\n✅ Action Items:");
    if aml.contains("suspicious") && !aml.contains("(0 suspicious)") {
        out.push_str("\n• Review flagged AML activities and file reports where required");
    }
    out.push_str("\n• Confirm evidence for upcoming SOX control testing");
    out.push_str("\n• Track PCI-DSS certification renewal");
    out
}
