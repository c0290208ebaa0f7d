//! Query enrichment
//!
//! Appends synthesized domain context to a query before dispatch.

use lazy_static::lazy_static;
use regex::Regex;
use std::fmt::Write;
use std::sync::Arc;
use tracing::{debug, info};

use crate::data::DataSource;
use crate::models::Domain;

/// Holdings quoted in the default portfolio block
const DEFAULT_HOLDINGS: &[&str] = &["AAPL", "MSFT", "GOOGL"];

const DEFAULT_PORTFOLIO_VALUE: &str = "$1,000,000";

lazy_static! {
    /// `100k`, `2.5m`, `3 million`, `1,000,000`, `50000`
    static ref MAGNITUDE: Regex = Regex::new(
        r"(?i)\b\d+(?:\.\d+)?\s*(?:k|m|mm|bn|thousand|million|billion)\b|\d{1,3}(?:,\d{3})+|\d{5,}"
    )
    .expect("valid magnitude regex");

    /// Currency codes and value words, as whole words only
    static ref VALUE_TERMS: Regex =
        Regex::new(r"(?i)\b(?:usd|eur|gbp|portfolios?|value)\b").expect("valid value-term regex");
}

const CURRENCY_SYMBOLS: &[char] = &['$', '€', '£', '¥'];

/// True when the query already states (or refers to) a portfolio value.
pub fn has_portfolio_value_signal(query: &str) -> bool {
    query.contains(CURRENCY_SYMBOLS)
        || VALUE_TERMS.is_match(query)
        || MAGNITUDE.is_match(query)
}

/// Builds domain-enriched prompts from a data source
pub struct Enricher {
    data: Arc<dyn DataSource>,
    transaction_count: usize,
}

impl Enricher {
    pub fn new(data: Arc<dyn DataSource>, transaction_count: usize) -> Self {
        Self {
            data,
            transaction_count,
        }
    }

    pub async fn enrich(&self, domain: Domain, query: &str) -> String {
        debug!(domain = %domain, "Enriching query");

        match domain {
            Domain::FraudDetection => self.with_transactions(query),
            Domain::Compliance => self.with_compliance(query),
            Domain::RiskAnalysis => {
                if has_portfolio_value_signal(query) {
                    info!("Query already carries portfolio data; passing through");
                    query.to_string()
                } else {
                    self.with_default_portfolio(query).await
                }
            }
            Domain::Supervisor => query.to_string(),
        }
    }

    fn with_transactions(&self, query: &str) -> String {
        let transactions = self.data.synthetic_transactions(self.transaction_count);

        let mut out = format!("{}\n\n=== REAL-TIME FINANCIAL DATA ===\n", query);
        out.push_str("\n📊 TRANSACTION DATA:\n");
        for (i, txn) in transactions.iter().enumerate() {
            let _ = write!(
                out,
                "\nTransaction #{} ({}):\n  - Amount: ${:.2}\n  - Risk Score: {:.2}\n  - Status: {}\n",
                i + 1,
                txn.transaction_id,
                txn.amount,
                txn.risk_score,
                txn.flag
            );
        }
        out.push_str("\nAnalyze these transactions for fraud.\n");

        info!(count = transactions.len(), "Added transaction snapshot");
        out
    }

    fn with_compliance(&self, query: &str) -> String {
        let snapshot = self.data.synthetic_compliance();

        let mut out = format!("{}\n\n=== REAL-TIME FINANCIAL DATA ===\n", query);
        out.push_str("\n✅ COMPLIANCE STATUS:\n\n");
        let _ = writeln!(
            out,
            "SOX: {}% - {}",
            snapshot.sox_compliance.compliance_score, snapshot.sox_compliance.status
        );
        let _ = writeln!(out, "PCI-DSS: {}", snapshot.pci_dss.status);
        let _ = writeln!(
            out,
            "AML: {} ({} suspicious)",
            snapshot.aml_monitoring.status, snapshot.aml_monitoring.suspicious_activities
        );
        out.push_str("\nAnalyze compliance and provide recommendations.\n");

        info!("Added compliance snapshot");
        out
    }

    async fn with_default_portfolio(&self, query: &str) -> String {
        let symbols: Vec<String> = DEFAULT_HOLDINGS.iter().map(|s| s.to_string()).collect();
        let quotes = self.data.get_multiple(&symbols).await;

        let mut out = format!("{}\n\n=== PORTFOLIO DATA ===\n", query);
        let _ = writeln!(out, "Portfolio Value: {}\n", DEFAULT_PORTFOLIO_VALUE);
        out.push_str("Stock Holdings:\n");
        for quote in &quotes {
            let _ = writeln!(out, "  - {}: ${:.2}", quote.symbol, quote.price);
        }
        out.push_str("\nPlease calculate VaR and analyze portfolio risk.\n");

        info!(holdings = quotes.len(), "Added default portfolio for vague risk query");
        out
    }
}
