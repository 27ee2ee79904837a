use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

/// One certificate status change, logged as a structured event.
#[derive(Debug, Clone, Serialize)]
pub struct LifecycleEvent<'a> {
    pub certificate_id: &'a str,
    pub identity: Option<&'a str>,
    pub score: u8,
    pub from: &'a str,
    pub to: &'a str,
}

#[derive(Debug, Default)]
struct TelemetryState {
    submissions_total: HashMap<String, u64>,
    rejects_total: HashMap<String, u64>,
    quota_denied_total: HashMap<String, u64>,
    stamp_failures_total: u64,
    approvals_total: u64,
    downloads_total: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    pub submissions_total: HashMap<String, u64>,
    pub rejects_total: HashMap<String, u64>,
    pub quota_denied_total: HashMap<String, u64>,
    pub stamp_failures_total: u64,
    pub approvals_total: u64,
    pub downloads_total: u64,
}

#[derive(Debug, Clone, Default)]
pub struct Telemetry {
    state: Arc<Mutex<TelemetryState>>,
}

impl Telemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lifecycle_event(&self, event: &LifecycleEvent<'_>) {
        tracing::info!(target: "verifyd.lifecycle", event = ?event, "certificate lifecycle transition");
    }

    pub fn record_submission(&self, status: &str) {
        let mut guard = self.state.lock();
        let entry = guard
            .submissions_total
            .entry(status.to_string())
            .or_insert(0);
        *entry = entry.saturating_add(1);
    }

    pub fn record_reject(&self, reason: &str) {
        let mut guard = self.state.lock();
        let entry = guard.rejects_total.entry(reason.to_string()).or_insert(0);
        *entry = entry.saturating_add(1);
    }

    pub fn record_quota_denied(&self, identity: &str) {
        let mut guard = self.state.lock();
        let entry = guard
            .quota_denied_total
            .entry(identity.to_string())
            .or_insert(0);
        *entry = entry.saturating_add(1);
    }

    pub fn record_stamp_failure(&self) {
        let mut guard = self.state.lock();
        guard.stamp_failures_total = guard.stamp_failures_total.saturating_add(1);
    }

    pub fn record_approval(&self) {
        let mut guard = self.state.lock();
        guard.approvals_total = guard.approvals_total.saturating_add(1);
    }

    pub fn record_download(&self) {
        let mut guard = self.state.lock();
        guard.downloads_total = guard.downloads_total.saturating_add(1);
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let guard = self.state.lock();
        TelemetrySnapshot {
            submissions_total: guard.submissions_total.clone(),
            rejects_total: guard.rejects_total.clone(),
            quota_denied_total: guard.quota_denied_total.clone(),
            stamp_failures_total: guard.stamp_failures_total,
            approvals_total: guard.approvals_total,
            downloads_total: guard.downloads_total,
        }
    }
}
