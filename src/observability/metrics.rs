//! Protocol metrics.
//!
//! # Metrics
//! - `relation_hooks_total` (counter): hooks handled, by role and kind
//! - `relation_config_writes_total` (counter): effective Consumer `config` writes
//! - `relation_status_total` (counter): statuses written by the Provider, by outcome
//! - `relation_status_observed_total` (counter): statuses decoded by the Consumer, by outcome
//! - `relation_validation_failures_total` (counter): rejected config sets, by side

use metrics::counter;

use crate::relation::HookKind;
use crate::status::Outcome;

pub fn record_hook(role: &'static str, kind: HookKind) {
    counter!("relation_hooks_total", "role" => role, "kind" => kind.as_str()).increment(1);
}

pub fn record_config_write() {
    counter!("relation_config_writes_total").increment(1);
}

pub fn record_status_written(outcome: Outcome) {
    counter!("relation_status_total", "outcome" => outcome.as_str()).increment(1);
}

pub fn record_status_observed(outcome: Outcome) {
    counter!("relation_status_observed_total", "outcome" => outcome.as_str()).increment(1);
}

pub fn record_validation_failure(side: &'static str) {
    counter!("relation_validation_failures_total", "side" => side).increment(1);
}
