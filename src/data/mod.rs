//! Financial data sources
//!
//! Live quotes come from an HTTP market-data API; transactions and
//! compliance snapshots are synthesized locally.

use async_trait::async_trait;
use chrono::Utc;
use tracing::warn;

use crate::models::{ComplianceSnapshot, FinancialRatios, Quote, Transaction};
use crate::Result;

pub mod market;
pub mod synthetic;

pub use market::MarketDataService;

/// Trait for financial data access
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn get_quote(&self, symbol: &str) -> Result<Quote>;

    async fn get_ratios(&self, symbol: &str) -> Result<FinancialRatios>;

    /// Quotes for every symbol that could be fetched; failures are skipped.
    async fn get_multiple(&self, symbols: &[String]) -> Vec<Quote> {
        let mut quotes = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            match self.get_quote(symbol).await {
                Ok(quote) => quotes.push(quote),
                Err(e) => warn!(symbol = %symbol, error = %e, "Skipping unavailable quote"),
            }
        }
        quotes
    }

    fn synthetic_transactions(&self, count: usize) -> Vec<Transaction>;

    fn synthetic_compliance(&self) -> ComplianceSnapshot;
}

/// Offline data source with fixed quotes and transactions.
/// Keeps the system functional without network access.
pub struct StaticDataSource {
    quotes: Vec<Quote>,
    transactions: Vec<Transaction>,
}

impl StaticDataSource {
    pub fn new() -> Self {
        let quote = |symbol: &str, price: f64, change: f64| Quote {
            symbol: symbol.to_string(),
            price,
            change,
            change_percent: format!("{:+.2}%", change / (price - change) * 100.0),
            volume: 1_000_000,
            timestamp: "2025-09-01T16:00:00Z".to_string(),
            market_cap: None,
            pe_ratio: None,
        };

        let txn = |id: &str, amount: f64, merchant: &str, risk_score: f64, flag: &str| Transaction {
            transaction_id: id.to_string(),
            amount,
            timestamp: Utc::now(),
            merchant: merchant.to_string(),
            risk_score,
            flag: flag.to_string(),
        };

        Self {
            quotes: vec![
                quote("AAPL", 230.50, 1.25),
                quote("MSFT", 415.20, -2.10),
                quote("GOOGL", 168.75, 0.80),
                quote("AMZN", 185.10, 0.35),
            ],
            transactions: vec![
                txn("TXN1000", 24_500.00, "International Wire", 0.90, "Unusually large amount"),
                txn("TXN1001", 9_870.00, "Crypto Exchange", 0.85, "Just below reporting threshold"),
                txn("TXN1002", 642.18, "Online Retailer", 0.75, "Multiple small amounts"),
                txn("TXN1003", 54.20, "Grocery Store", 0.32, "Normal"),
                txn("TXN1004", 18.99, "Pharmacy", 0.12, "Normal"),
            ],
        }
    }
}

impl Default for StaticDataSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataSource for StaticDataSource {
    async fn get_quote(&self, symbol: &str) -> Result<Quote> {
        self.quotes
            .iter()
            .find(|q| q.symbol.eq_ignore_ascii_case(symbol))
            .cloned()
            .ok_or_else(|| {
                crate::error::OrchestrationError::DataSource(format!(
                    "No offline quote for {}",
                    symbol
                ))
            })
    }

    async fn get_ratios(&self, symbol: &str) -> Result<FinancialRatios> {
        Ok(FinancialRatios {
            symbol: symbol.to_uppercase(),
            current_ratio: Some(1.05),
            debt_to_equity: Some(1.45),
            profit_margin: Some(0.24),
            pe_ratio: Some(29.8),
            beta: Some(1.2),
            ..FinancialRatios::default()
        })
    }

    fn synthetic_transactions(&self, count: usize) -> Vec<Transaction> {
        self.transactions.iter().take(count).cloned().collect()
    }

    fn synthetic_compliance(&self) -> ComplianceSnapshot {
        synthetic::compliance_snapshot(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_quotes() {
        let source = StaticDataSource::new();

        let quote = source.get_quote("aapl").await.unwrap();
        assert_eq!(quote.symbol, "AAPL");
        assert!(source.get_quote("ZZZZ").await.is_err());
    }

    #[tokio::test]
    async fn test_get_multiple_skips_missing() {
        let source = StaticDataSource::new();
        let symbols = vec!["AAPL".to_string(), "NOPE".to_string(), "MSFT".to_string()];

        let quotes = source.get_multiple(&symbols).await;
        let found: Vec<&str> = quotes.iter().map(|q| q.symbol.as_str()).collect();
        assert_eq!(found, vec!["AAPL", "MSFT"]);
    }

    #[test]
    fn test_transaction_count_is_capped() {
        let source = StaticDataSource::new();
        assert_eq!(source.synthetic_transactions(3).len(), 3);
        assert_eq!(source.synthetic_transactions(50).len(), 5);
    }
}
