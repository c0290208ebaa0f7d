//! Synthetic transaction and compliance generators
//!
//! Figures are illustrative only; nothing here is a fraud or compliance model.

use chrono::{DateTime, Duration, Utc};
use rand::seq::IndexedRandom;
use rand::Rng;

use crate::models::{AmlStatus, ComplianceSnapshot, PciStatus, SoxStatus, Transaction};

/// Share of generated transactions drawn from a suspicious pattern
const SUSPICIOUS_RATE: f64 = 0.3;

const RISKY_MERCHANTS: &[&str] = &[
    "Online Retailer",
    "International Wire",
    "Crypto Exchange",
    "Unknown Merchant",
];

const EVERYDAY_MERCHANTS: &[&str] = &["Grocery Store", "Gas Station", "Restaurant", "Pharmacy"];

struct SuspiciousPattern {
    min: f64,
    max: f64,
    risk: f64,
    reason: &'static str,
}

const SUSPICIOUS_PATTERNS: &[SuspiciousPattern] = &[
    SuspiciousPattern {
        min: 9000.0,
        max: 9999.0,
        risk: 0.85,
        reason: "Just below reporting threshold",
    },
    SuspiciousPattern {
        min: 500.0,
        max: 1000.0,
        risk: 0.75,
        reason: "Multiple small amounts",
    },
    SuspiciousPattern {
        min: 10000.0,
        max: 50000.0,
        risk: 0.90,
        reason: "Unusually large amount",
    },
];

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Generate `count` transactions timestamped within 48h before `now`,
/// sorted by risk score (highest first).
pub fn generate_transactions(count: usize, now: DateTime<Utc>) -> Vec<Transaction> {
    let mut rng = rand::rng();

    let mut transactions: Vec<Transaction> = (0..count)
        .map(|i| {
            let timestamp = now - Duration::hours(rng.random_range(0..=48));
            let transaction_id = format!("TXN{}", 1000 + i);

            if rng.random_bool(SUSPICIOUS_RATE) {
                let pattern = SUSPICIOUS_PATTERNS
                    .choose(&mut rng)
                    .unwrap_or(&SUSPICIOUS_PATTERNS[0]);
                Transaction {
                    transaction_id,
                    amount: round2(rng.random_range(pattern.min..pattern.max)),
                    timestamp,
                    merchant: RISKY_MERCHANTS
                        .choose(&mut rng)
                        .unwrap_or(&RISKY_MERCHANTS[0])
                        .to_string(),
                    risk_score: pattern.risk,
                    flag: pattern.reason.to_string(),
                }
            } else {
                Transaction {
                    transaction_id,
                    amount: round2(rng.random_range(10.0..500.0)),
                    timestamp,
                    merchant: EVERYDAY_MERCHANTS
                        .choose(&mut rng)
                        .unwrap_or(&EVERYDAY_MERCHANTS[0])
                        .to_string(),
                    risk_score: round2(rng.random_range(0.1..0.4)),
                    flag: "Normal".to_string(),
                }
            }
        })
        .collect();

    transactions.sort_by(|a, b| b.risk_score.total_cmp(&a.risk_score));
    transactions
}

/// Fixed compliance snapshot with dates relative to `now`.
pub fn compliance_snapshot(now: DateTime<Utc>) -> ComplianceSnapshot {
    let day = |offset: i64| (now + Duration::days(offset)).format("%Y-%m-%d").to_string();

    ComplianceSnapshot {
        sox_compliance: SoxStatus {
            status: "Active".to_string(),
            last_audit: day(-45),
            next_audit: day(320),
            controls_tested: 156,
            controls_passed: 154,
            compliance_score: 98.7,
        },
        pci_dss: PciStatus {
            status: "Compliant".to_string(),
            certification_expiry: day(180),
            requirements_met: 12,
            total_requirements: 12,
        },
        aml_monitoring: AmlStatus {
            status: "Active".to_string(),
            suspicious_activities: 3,
            reports_filed: 1,
            review_period: "Last 30 days".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_transactions_shape() {
        let now = Utc::now();
        let txns = generate_transactions(25, now);

        assert_eq!(txns.len(), 25);
        for txn in &txns {
            assert!(txn.transaction_id.starts_with("TXN"));
            assert!(txn.timestamp <= now);
            assert!(txn.timestamp >= now - Duration::hours(48));
            assert!(txn.amount >= 10.0 && txn.amount <= 50000.0);
            if txn.flag == "Normal" {
                assert!(txn.risk_score < 0.5);
            } else {
                assert!(txn.risk_score >= 0.75);
            }
        }
    }

    #[test]
    fn test_transactions_sorted_by_risk() {
        let txns = generate_transactions(40, Utc::now());
        assert!(txns.windows(2).all(|w| w[0].risk_score >= w[1].risk_score));
    }

    #[test]
    fn test_zero_transactions() {
        assert!(generate_transactions(0, Utc::now()).is_empty());
    }

    #[test]
    fn test_compliance_dates() {
        let now = Utc.with_ymd_and_hms(2025, 9, 1, 12, 0, 0).unwrap();
        let snapshot = compliance_snapshot(now);

        assert_eq!(snapshot.sox_compliance.last_audit, "2025-07-18");
        assert_eq!(snapshot.pci_dss.certification_expiry, "2026-02-28");
        assert_eq!(snapshot.aml_monitoring.suspicious_activities, 3);
        assert_eq!(snapshot.sox_compliance.compliance_score, 98.7);
    }
}
