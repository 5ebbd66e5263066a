//! Authorization metrics.
//!
//! Recorded through the `metrics` facade. The host process installs the
//! recorder and exporter; without one these calls are no-ops.

use metrics::{counter, describe_counter};

/// Store lookups that failed or timed out and were treated as no membership.
pub const STORE_FAILURES_TOTAL: &str = "welltrack_authz_store_failures_total";

/// Access decisions, labelled by `outcome` (`allow` / `deny`) and `reason`.
pub const DECISIONS_TOTAL: &str = "welltrack_authz_decisions_total";

/// Register metric descriptions with the installed recorder.
pub fn describe_metrics() {
    describe_counter!(
        STORE_FAILURES_TOTAL,
        "Membership lookups that failed closed"
    );
    describe_counter!(DECISIONS_TOTAL, "Authorization decisions by outcome");
}

pub fn record_store_failure(operation: &'static str, kind: &'static str) {
    counter!(STORE_FAILURES_TOTAL, "operation" => operation, "kind" => kind).increment(1);
}

pub fn record_decision(outcome: &'static str, reason: &'static str) {
    counter!(DECISIONS_TOTAL, "outcome" => outcome, "reason" => reason).increment(1);
}

/// In-process recorder that keeps counter totals, for asserting on emitted metrics.
#[cfg(test)]
pub(crate) mod capture {
    use metrics::{
        Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit,
    };
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    pub(crate) struct CapturingRecorder {
        counters: Mutex<HashMap<String, Arc<AtomicU64>>>,
    }

    fn render(name: &str, labels: &[(&str, &str)]) -> String {
        let mut labels: Vec<String> = labels.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        labels.sort();
        format!("{}{{{}}}", name, labels.join(","))
    }

    impl CapturingRecorder {
        /// Total for the counter with exactly these labels.
        pub(crate) fn count(&self, name: &str, labels: &[(&str, &str)]) -> u64 {
            self.counters
                .lock()
                .unwrap()
                .get(&render(name, labels))
                .map(|c| c.load(Ordering::SeqCst))
                .unwrap_or(0)
        }

        /// Sum over every label combination of `name`.
        pub(crate) fn total(&self, name: &str) -> u64 {
            let prefix = format!("{}{{", name);
            self.counters
                .lock()
                .unwrap()
                .iter()
                .filter(|(k, _)| k.starts_with(&prefix))
                .map(|(_, c)| c.load(Ordering::SeqCst))
                .sum()
        }
    }

    impl Recorder for CapturingRecorder {
        fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
            let labels: Vec<(&str, &str)> = key.labels().map(|l| (l.key(), l.value())).collect();
            let rendered = render(key.name(), &labels);
            let counter = self
                .counters
                .lock()
                .unwrap()
                .entry(rendered)
                .or_default()
                .clone();
            Counter::from_arc(counter)
        }

        fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
            Gauge::noop()
        }

        fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
            Histogram::noop()
        }
    }
}
