//! Per-Context Failure Tracking
//!
//! A deliberately simple two-state circuit per dependency. Each context is
//! healthy until it accumulates a configured number of consecutive failures,
//! then tripped until a recorded success or an explicit reset restores it.
//! There is no time-based probation: recovery requires evidence that the
//! dependency actually works again.
//!
//! Counting is per context, so a storage outage never blocks OCR calls.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::TrackerConfig;

/// Health of one failure context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextHealth {
    Healthy,
    Tripped,
}

#[derive(Debug, Clone)]
struct ContextState {
    consecutive_failures: u32,
    threshold: u32,
    total_successes: u64,
    total_failures: u64,
    last_failure_at: Option<DateTime<Utc>>,
}

impl ContextState {
    fn new(threshold: u32) -> Self {
        Self {
            consecutive_failures: 0,
            threshold,
            total_successes: 0,
            total_failures: 0,
            last_failure_at: None,
        }
    }

    fn tripped(&self) -> bool {
        self.consecutive_failures >= self.threshold
    }

    fn health(&self) -> ContextHealth {
        if self.tripped() {
            ContextHealth::Tripped
        } else {
            ContextHealth::Healthy
        }
    }
}

/// Point-in-time view of one failure context
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureSnapshot {
    pub context: String,
    pub health: ContextHealth,
    pub consecutive_failures: u32,
    pub threshold: u32,
    pub total_successes: u64,
    pub total_failures: u64,
    pub last_failure_at: Option<DateTime<Utc>>,
}

impl FailureSnapshot {
    pub fn is_tripped(&self) -> bool {
        self.health == ContextHealth::Tripped
    }
}

/// Tracks consecutive failures per dependency and trips contexts that keep
/// failing, so callers can fail fast instead of piling work onto a
/// dependency that is down.
#[derive(Debug)]
pub struct FailureTracker {
    contexts: DashMap<String, ContextState>,
    config: TrackerConfig,
}

impl FailureTracker {
    /// Create a tracker with the given threshold configuration
    pub fn new(config: TrackerConfig) -> Self {
        info!(
            default_threshold = config.default_threshold,
            context_overrides = config.context_thresholds.len(),
            "🛡️ Failure tracker initialized"
        );
        Self {
            contexts: DashMap::new(),
            config,
        }
    }

    /// Record a successful call, restoring the context to healthy.
    ///
    /// The consecutive-failure count drops to exactly zero regardless of how
    /// high it was.
    pub fn record_success(&self, context: &str) {
        let mut state = self
            .contexts
            .entry(context.to_string())
            .or_insert_with(|| ContextState::new(self.config.threshold_for(context)));

        let was_tripped = state.tripped();
        state.consecutive_failures = 0;
        state.total_successes += 1;

        if was_tripped {
            info!(context = %context, "🟢 Failure context recovered (circuit closed)");
        } else {
            debug!(context = %context, "🟢 Operation succeeded");
        }
    }

    /// Record a failed call, counting toward the trip threshold.
    ///
    /// Once tripped the count saturates at the threshold rather than growing
    /// unbounded.
    pub fn record_failure(&self, context: &str) {
        let mut state = self
            .contexts
            .entry(context.to_string())
            .or_insert_with(|| ContextState::new(self.config.threshold_for(context)));

        state.total_failures += 1;
        state.last_failure_at = Some(Utc::now());

        if state.tripped() {
            debug!(
                context = %context,
                consecutive_failures = state.consecutive_failures,
                "🔴 Failure recorded on already-tripped context"
            );
            return;
        }

        state.consecutive_failures += 1;

        if state.tripped() {
            error!(
                context = %context,
                consecutive_failures = state.consecutive_failures,
                failure_threshold = state.threshold,
                "🔴 Failure context tripped (failing fast)"
            );
        } else {
            warn!(
                context = %context,
                consecutive_failures = state.consecutive_failures,
                failure_threshold = state.threshold,
                "🔴 Operation failed"
            );
        }
    }

    /// Whether calls for this context should be rejected without attempting.
    /// Contexts that were never recorded report healthy.
    pub fn is_tripped(&self, context: &str) -> bool {
        self.contexts
            .get(context)
            .map(|state| state.tripped())
            .unwrap_or(false)
    }

    /// Force a context back to healthy regardless of its failure count
    pub fn reset(&self, context: &str) {
        let mut state = self
            .contexts
            .entry(context.to_string())
            .or_insert_with(|| ContextState::new(self.config.threshold_for(context)));

        state.consecutive_failures = 0;
        warn!(context = %context, "🚨 Failure context forced to healthy");
    }

    /// Point-in-time view of one context. Unknown contexts report healthy
    /// with zero failures.
    pub fn snapshot(&self, context: &str) -> FailureSnapshot {
        match self.contexts.get(context) {
            Some(state) => build_snapshot(context, &state),
            None => FailureSnapshot {
                context: context.to_string(),
                health: ContextHealth::Healthy,
                consecutive_failures: 0,
                threshold: self.config.threshold_for(context),
                total_successes: 0,
                total_failures: 0,
                last_failure_at: None,
            },
        }
    }

    /// Snapshots for every context that has recorded at least one call,
    /// sorted by context name
    pub fn snapshot_all(&self) -> Vec<FailureSnapshot> {
        let mut snapshots: Vec<FailureSnapshot> = self
            .contexts
            .iter()
            .map(|entry| build_snapshot(entry.key(), entry.value()))
            .collect();
        snapshots.sort_by(|a, b| a.context.cmp(&b.context));
        snapshots
    }

    /// Names of every tracked context, sorted
    pub fn contexts(&self) -> Vec<String> {
        let mut names: Vec<String> = self.contexts.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Fraction of tracked contexts currently healthy (1.0 when none tracked)
    pub fn health_score(&self) -> f64 {
        let total = self.contexts.len();
        if total == 0 {
            return 1.0;
        }
        let healthy = self
            .contexts
            .iter()
            .filter(|entry| !entry.value().tripped())
            .count();
        healthy as f64 / total as f64
    }
}

fn build_snapshot(context: &str, state: &ContextState) -> FailureSnapshot {
    FailureSnapshot {
        context: context.to_string(),
        health: state.health(),
        consecutive_failures: state.consecutive_failures,
        threshold: state.threshold,
        total_successes: state.total_successes,
        total_failures: state.total_failures,
        last_failure_at: state.last_failure_at,
    }
}
