//! Query Classifier
//!
//! Maps a free-text query onto the specialist domains that should answer it.
//! Matching is plain lower-case substring membership against the keyword
//! tables in [`RoutingConfig`]; "transactionism" matches "transaction".

use tracing::debug;

use crate::config::RoutingConfig;
use crate::models::{Domain, RoutingPlan};

/// Keyword classifier
#[derive(Debug, Clone)]
pub struct QueryClassifier {
    routing: RoutingConfig,
}

impl QueryClassifier {
    pub fn new(routing: RoutingConfig) -> Self {
        Self { routing }
    }

    pub fn fallback(&self) -> Domain {
        self.routing.fallback
    }

    /// Classify a query into an ordered routing plan.
    ///
    /// Never rejects input: empty text or text matching no table yields the
    /// single fallback domain.
    pub fn classify(&self, query: &str) -> RoutingPlan {
        let mut plan = RoutingPlan::new(self.matched_domains(query));

        if plan.is_empty() {
            plan.push(self.routing.fallback);
        }

        debug!(domains = ?plan.domains(), "Query classified");
        plan
    }

    /// Specialist domains whose keyword table matches, in table order.
    /// Empty when nothing matches.
    pub fn matched_domains(&self, query: &str) -> Vec<Domain> {
        let text = query.to_lowercase();

        self.routing
            .rules
            .iter()
            .filter(|rule| rule.domain != Domain::Supervisor)
            .filter(|rule| rule.keywords.iter().any(|kw| text.contains(kw.as_str())))
            .map(|rule| rule.domain)
            .collect()
    }
}

impl Default for QueryClassifier {
    fn default() -> Self {
        Self::new(RoutingConfig::default())
    }
}
