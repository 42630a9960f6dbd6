// src/alerts.rs
//
// Alert classification and the session-wide violation tally.
//
// The alert-class set is explicit configuration injected into the overlay
// renderer and the result-processing path. A detection whose label is in
// the set is a safety violation (missing PPE); everything else renders as
// a normal detection.

use crate::types::DetectionResult;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct AlertPolicy {
    classes: Arc<HashSet<String>>,
}

impl AlertPolicy {
    pub fn new(classes: impl IntoIterator<Item = String>) -> Self {
        Self {
            classes: Arc::new(classes.into_iter().collect()),
        }
    }

    /// Exact string membership — no prefix or case matching.
    pub fn is_alert(&self, class: &str) -> bool {
        self.classes.contains(class)
    }
}

/// Counts results that contained at least one alert-class detection.
/// Shared between the inbound handler and the teardown summary.
#[derive(Debug, Clone, Default)]
pub struct AlertTally {
    count: Arc<AtomicU64>,
}

impl AlertTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self) -> u64 {
        self.count.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

/// Result-processing side of the inbound path: log the result the way the
/// results panel lists it, and bump the tally once if anything in it is an
/// alert class.
pub fn process_result(result: &DetectionResult, policy: &AlertPolicy, tally: &AlertTally) {
    for det in &result.detections {
        debug!(
            "{} {} {}% at {}",
            if policy.is_alert(&det.class) { "⚠" } else { "✓" },
            det.class,
            (det.confidence * 100.0).round() as i32,
            result.received_at.format("%H:%M:%S"),
        );
    }

    if result.detections.iter().any(|d| policy.is_alert(&d.class)) {
        let total = tally.record();
        let violations: Vec<&str> = result
            .detections
            .iter()
            .filter(|d| policy.is_alert(&d.class))
            .map(|d| d.class.as_str())
            .collect();
        warn!(
            "Safety violation: {} (alert #{})",
            violations.join(", "),
            total
        );
    } else if !result.is_empty() {
        info!("{} detections, no violations", result.detections.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Detection, DetectionMessage};

    fn test_policy() -> AlertPolicy {
        AlertPolicy::new(
            ["No-Hardhat", "No-Safety Vest", "No-Goggles"]
                .iter()
                .map(|s| s.to_string()),
        )
    }

    fn detection(class: &str) -> Detection {
        Detection {
            class: class.to_string(),
            confidence: 0.9,
            bbox: [0.1, 0.1, 0.3, 0.4],
        }
    }

    fn result_of(classes: &[&str]) -> DetectionResult {
        DetectionResult::from_message(DetectionMessage {
            detections: classes.iter().map(|c| detection(c)).collect(),
        })
    }

    #[test]
    fn test_alert_membership_is_exact() {
        let policy = test_policy();

        assert!(policy.is_alert("No-Hardhat"));
        assert!(!policy.is_alert("Hardhat"));
        assert!(!policy.is_alert("no-hardhat"));
        assert!(!policy.is_alert("No-Hardhat "));
    }

    #[test]
    fn test_tally_increments_once_per_result() {
        let policy = test_policy();
        let tally = AlertTally::new();

        // Two alert detections in one result still count as one alert
        process_result(
            &result_of(&["No-Hardhat", "No-Goggles"]),
            &policy,
            &tally,
        );
        assert_eq!(tally.count(), 1);

        process_result(&result_of(&["No-Safety Vest"]), &policy, &tally);
        assert_eq!(tally.count(), 2);
    }

    #[test]
    fn test_tally_ignores_normal_results() {
        let policy = test_policy();
        let tally = AlertTally::new();

        process_result(&result_of(&["Hardhat", "Person"]), &policy, &tally);
        process_result(&result_of(&[]), &policy, &tally);

        assert_eq!(tally.count(), 0);
    }
}
