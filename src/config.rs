//! Process configuration
//!
//! Built once at startup from the environment (optionally a `.env` file)
//! and shared read-only through `Arc<AppConfig>`.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use crate::error::OrchestrationError;
use crate::models::Domain;
use crate::Result;

const DEFAULT_PORT: u16 = 5011;
const DEFAULT_MARKET_DATA_URL: &str = "https://query1.finance.yahoo.com";

/// Static keyword tables, matched as lower-case substrings
const FRAUD_KEYWORDS: &[&str] = &["fraud", "transaction", "suspicious", "anomaly"];

const COMPLIANCE_KEYWORDS: &[&str] = &[
    "compliance", "sox", "pci", "regulation", "regulatory", "audit", "aml", "kyc",
];

const RISK_KEYWORDS: &[&str] = &[
    "risk", "var", "portfolio", "stress", "volatility", "stock", "calculate",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponderMode {
    /// In-process canned analysts
    Demo,
    /// Remote responders reached over HTTP
    Http,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialMode {
    Static,
    Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketDataMode {
    Live,
    Offline,
}

/// Keyword rule for one specialist domain
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordRule {
    pub domain: Domain,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoutingConfig {
    /// Evaluated in order; order defines plan priority.
    pub rules: Vec<KeywordRule>,
    pub fallback: Domain,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        let rule = |domain, words: &[&str]| KeywordRule {
            domain,
            keywords: words.iter().map(|w| w.to_string()).collect(),
        };

        Self {
            rules: vec![
                rule(Domain::FraudDetection, FRAUD_KEYWORDS),
                rule(Domain::Compliance, COMPLIANCE_KEYWORDS),
                rule(Domain::RiskAnalysis, RISK_KEYWORDS),
            ],
            fallback: Domain::FraudDetection,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResponderConfig {
    pub mode: ResponderMode,
    pub endpoints: HashMap<Domain, String>,
    /// Deadline applied to each responder call.
    pub timeout: Duration,
    pub transaction_count: usize,
    pub fraud_threshold: f64,
}

impl ResponderConfig {
    /// Endpoint for `domain`, or `None` when missing or still a placeholder.
    pub fn endpoint(&self, domain: Domain) -> Option<&str> {
        self.endpoints
            .get(&domain)
            .map(|s| s.trim())
            .filter(|s| is_configured(s))
    }
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            mode: ResponderMode::Demo,
            endpoints: demo_endpoints(),
            timeout: Duration::from_secs(60),
            transaction_count: 10,
            fraud_threshold: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CredentialConfig {
    pub mode: CredentialMode,
    pub profile: String,
    pub tenant: String,
    pub command: String,
    pub command_timeout: Duration,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            mode: CredentialMode::Static,
            profile: "finops-demo/FinOps Agentic AI Agent".to_string(),
            tenant: "agentic-ai".to_string(),
            command: "pybritive".to_string(),
            command_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarketDataConfig {
    pub mode: MarketDataMode,
    pub base_url: String,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            mode: MarketDataMode::Live,
            base_url: DEFAULT_MARKET_DATA_URL.to_string(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Bounds one whole `/api/analyze` request.
    pub request_timeout: Duration,
    pub routing: RoutingConfig,
    pub responders: ResponderConfig,
    pub credentials: CredentialConfig,
    pub market_data: MarketDataConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            request_timeout: Duration::from_secs(120),
            routing: RoutingConfig::default(),
            responders: ResponderConfig::default(),
            credentials: CredentialConfig::default(),
            market_data: MarketDataConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load `.env` (if present) and read configuration from the environment.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = AppConfig::default();

        let port = match get("PORT").or_else(|| get("API_PORT")) {
            Some(raw) => parse_value("PORT", &raw)?,
            None => defaults.port,
        };

        let responder_mode = match get("RESPONDER_MODE").as_deref() {
            None | Some("demo") => ResponderMode::Demo,
            Some("http") => ResponderMode::Http,
            Some(other) => {
                return Err(OrchestrationError::Configuration(format!(
                    "RESPONDER_MODE must be 'demo' or 'http', got '{}'",
                    other
                )))
            }
        };

        let mut endpoints = match responder_mode {
            ResponderMode::Demo => demo_endpoints(),
            ResponderMode::Http => HashMap::new(),
        };
        for (domain, key) in [
            (Domain::FraudDetection, "FRAUD_AGENT_ENDPOINT"),
            (Domain::Compliance, "COMPLIANCE_AGENT_ENDPOINT"),
            (Domain::RiskAnalysis, "RISK_AGENT_ENDPOINT"),
            (Domain::Supervisor, "SUPERVISOR_AGENT_ENDPOINT"),
        ] {
            // Placeholders leave the demo endpoint in place
            if let Some(endpoint) = get(key).filter(|e| is_configured(e)) {
                endpoints.insert(domain, endpoint);
            }
        }

        let credential_mode = match get("CREDENTIAL_MODE").as_deref() {
            None | Some("static") => CredentialMode::Static,
            Some("command") => CredentialMode::Command,
            Some(other) => {
                return Err(OrchestrationError::Configuration(format!(
                    "CREDENTIAL_MODE must be 'static' or 'command', got '{}'",
                    other
                )))
            }
        };

        let market_mode = match get("MARKET_DATA_MODE").as_deref() {
            None | Some("live") => MarketDataMode::Live,
            Some("offline") => MarketDataMode::Offline,
            Some(other) => {
                return Err(OrchestrationError::Configuration(format!(
                    "MARKET_DATA_MODE must be 'live' or 'offline', got '{}'",
                    other
                )))
            }
        };

        let fallback = match get("FALLBACK_DOMAIN") {
            Some(raw) => raw.parse::<Domain>()?,
            None => defaults.routing.fallback,
        };

        Ok(Self {
            host: get("HOST").unwrap_or(defaults.host),
            port,
            request_timeout: secs_or(&get, "REQUEST_TIMEOUT_SECS", defaults.request_timeout)?,
            routing: RoutingConfig {
                fallback,
                ..RoutingConfig::default()
            },
            responders: ResponderConfig {
                mode: responder_mode,
                endpoints,
                timeout: secs_or(&get, "RESPONDER_TIMEOUT_SECS", defaults.responders.timeout)?,
                transaction_count: match get("TRANSACTION_COUNT") {
                    Some(raw) => parse_value("TRANSACTION_COUNT", &raw)?,
                    None => defaults.responders.transaction_count,
                },
                fraud_threshold: match get("FRAUD_THRESHOLD") {
                    Some(raw) => parse_value("FRAUD_THRESHOLD", &raw)?,
                    None => defaults.responders.fraud_threshold,
                },
            },
            credentials: CredentialConfig {
                mode: credential_mode,
                profile: get("BRITIVE_PROFILE").unwrap_or(defaults.credentials.profile),
                tenant: get("BRITIVE_TENANT").unwrap_or(defaults.credentials.tenant),
                command: get("BRITIVE_COMMAND").unwrap_or(defaults.credentials.command),
                command_timeout: defaults.credentials.command_timeout,
            },
            market_data: MarketDataConfig {
                mode: market_mode,
                base_url: get("MARKET_DATA_BASE_URL")
                    .map(|url| url.trim_end_matches('/').to_string())
                    .unwrap_or(defaults.market_data.base_url),
            },
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn is_configured(endpoint: &str) -> bool {
    let endpoint = endpoint.trim();
    !endpoint.is_empty() && !endpoint.starts_with("YOUR_")
}

fn demo_endpoints() -> HashMap<Domain, String> {
    Domain::ALL
        .iter()
        .map(|d| (*d, format!("demo://{}", d.as_str())))
        .collect()
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim().parse::<T>().map_err(|_| {
        OrchestrationError::Configuration(format!("Invalid value for {}: '{}'", key, raw))
    })
}

fn secs_or<G>(get: &G, key: &str, default: Duration) -> Result<Duration>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => Ok(Duration::from_secs(parse_value(key, &raw)?)),
        None => Ok(default),
    }
}
