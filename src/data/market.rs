//! Live market data over HTTP
//!
//! Quotes and ratios come from a Yahoo-Finance-compatible API
//! (`/v8/finance/chart` and `/v10/finance/quoteSummary`).
//! Uses a long-lived reqwest::Client for connection pooling.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error};

use super::{synthetic, DataSource};
use crate::error::OrchestrationError;
use crate::models::{ComplianceSnapshot, FinancialRatios, Quote, Transaction};
use crate::Result;

/// Market data service backed by an HTTP quote API
pub struct MarketDataService {
    client: Client,
    base_url: String,
}

impl MarketDataService {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(15))
            .user_agent("finops-agent-router/0.1")
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn get_json(&self, path: &str) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "Fetching market data");

        let response = self.client.get(&url).send().await.map_err(|e| {
            error!("Market data request failed: {}", e);
            OrchestrationError::DataSource(format!("Market data request failed for {}: {}", path, e))
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(OrchestrationError::DataSource(format!(
                "Market data API returned {} for {}",
                status, path
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| OrchestrationError::DataSource(format!("Invalid JSON response: {}", e)))
    }
}

/// Build a quote from a `/v8/finance/chart` body.
pub(crate) fn parse_chart_quote(symbol: &str, body: &Value) -> Result<Quote> {
    let result = body
        .pointer("/chart/result/0")
        .ok_or_else(|| OrchestrationError::DataSource(format!("No chart data for {}", symbol)))?;
    let meta = result.get("meta").unwrap_or(&Value::Null);

    let price = meta
        .get("regularMarketPrice")
        .and_then(Value::as_f64)
        .ok_or_else(|| OrchestrationError::DataSource(format!("No price for {}", symbol)))?;

    // Session open when present, otherwise the previous close.
    let open = result
        .pointer("/indicators/quote/0/open")
        .and_then(Value::as_array)
        .and_then(|opens| opens.iter().rev().find_map(Value::as_f64))
        .or_else(|| meta.get("chartPreviousClose").and_then(Value::as_f64))
        .unwrap_or(price);

    let change = price - open;
    let change_percent = if open != 0.0 { change / open * 100.0 } else { 0.0 };

    let timestamp = meta
        .get("regularMarketTime")
        .and_then(Value::as_i64)
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .map(|t| t.to_rfc3339())
        .unwrap_or_default();

    Ok(Quote {
        symbol: meta
            .get("symbol")
            .and_then(Value::as_str)
            .unwrap_or(symbol)
            .to_string(),
        price,
        change,
        change_percent: format!("{:+.2}%", change_percent),
        volume: meta
            .get("regularMarketVolume")
            .and_then(Value::as_u64)
            .unwrap_or(0),
        timestamp,
        market_cap: None,
        pe_ratio: None,
    })
}

/// Build ratios from a `/v10/finance/quoteSummary` body.
pub(crate) fn parse_quote_summary(symbol: &str, body: &Value) -> Result<FinancialRatios> {
    let result = body.pointer("/quoteSummary/result/0").ok_or_else(|| {
        OrchestrationError::DataSource(format!("No ratio data for {}", symbol))
    })?;

    // Yahoo wraps numbers as {"raw": 1.2, "fmt": "1.20"}
    let raw = |module: &str, field: &str| -> Option<f64> {
        let v = result.get(module)?.get(field)?;
        v.get("raw").and_then(Value::as_f64).or_else(|| v.as_f64())
    };

    Ok(FinancialRatios {
        symbol: symbol.to_uppercase(),
        current_ratio: raw("financialData", "currentRatio"),
        quick_ratio: raw("financialData", "quickRatio"),
        debt_to_equity: raw("financialData", "debtToEquity"),
        roe: raw("financialData", "returnOnEquity"),
        roa: raw("financialData", "returnOnAssets"),
        profit_margin: raw("financialData", "profitMargins"),
        operating_margin: raw("financialData", "operatingMargins"),
        gross_margin: raw("financialData", "grossMargins"),
        pe_ratio: raw("summaryDetail", "trailingPE"),
        pb_ratio: raw("defaultKeyStatistics", "priceToBook"),
        beta: raw("summaryDetail", "beta"),
        fifty_two_week_high: raw("summaryDetail", "fiftyTwoWeekHigh"),
        fifty_two_week_low: raw("summaryDetail", "fiftyTwoWeekLow"),
    })
}

#[async_trait]
impl DataSource for MarketDataService {
    async fn get_quote(&self, symbol: &str) -> Result<Quote> {
        let body = self
            .get_json(&format!("/v8/finance/chart/{}?range=1d&interval=1d", symbol))
            .await?;
        parse_chart_quote(symbol, &body)
    }

    async fn get_ratios(&self, symbol: &str) -> Result<FinancialRatios> {
        let body = self
            .get_json(&format!(
                "/v10/finance/quoteSummary/{}?modules=financialData,defaultKeyStatistics,summaryDetail",
                symbol
            ))
            .await?;
        parse_quote_summary(symbol, &body)
    }

    fn synthetic_transactions(&self, count: usize) -> Vec<Transaction> {
        synthetic::generate_transactions(count, Utc::now())
    }

    fn synthetic_compliance(&self) -> ComplianceSnapshot {
        synthetic::compliance_snapshot(Utc::now())
    }
}
