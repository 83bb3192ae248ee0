//! Per-source poll cycle: fetch, maybe rebase, delta, aggregate, rank.
//!
//! A [`PollCycle`] owns one [`MetricSource`] together with its cached
//! `current` and `baseline` snapshots. It is driven by a single thread, so
//! ticks and user commands for one source are naturally serialized.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use super::CollectError;
use super::source::MetricSource;
use crate::engine;
use crate::model::{CounterRow, Snapshot, SourceSchema};
use crate::view::ViewBundle;

/// Lifecycle of a source's poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    /// No successful fetch yet, so no baseline either.
    Uninitialized,
    /// At least one snapshot fetched; baseline exists.
    Live,
}

/// Whether rows show lifetime counters or the delta since the baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    Absolute,
    Relative,
}

impl DisplayMode {
    pub fn toggled(self) -> Self {
        match self {
            DisplayMode::Absolute => DisplayMode::Relative,
            DisplayMode::Relative => DisplayMode::Absolute,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DisplayMode::Absolute => "absolute",
            DisplayMode::Relative => "relative",
        }
    }
}

/// Freshness of the published data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceHealth {
    Healthy,
    /// Last fetch failed; the bundle shows the previous data.
    Stale { failures: u32, error: CollectError },
    /// Too many consecutive failures; polling stopped until re-enabled.
    Failed { error: CollectError },
}

impl SourceHealth {
    pub fn is_stale(&self) -> bool {
        !matches!(self, SourceHealth::Healthy)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, SourceHealth::Failed { .. })
    }
}

/// Fetch budget and escalation threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub fetch_timeout: Duration,
    pub max_consecutive_failures: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(5),
            max_consecutive_failures: 3,
        }
    }
}

/// State machine for one source.
pub struct PollCycle {
    source: Box<dyn MetricSource>,
    schema: Arc<SourceSchema>,
    policy: RetryPolicy,
    phase: CyclePhase,
    mode: DisplayMode,
    enabled: bool,
    current: Option<Snapshot>,
    baseline: Option<Snapshot>,
    health: SourceHealth,
    consecutive_failures: u32,
}

impl PollCycle {
    pub fn new(source: Box<dyn MetricSource>, policy: RetryPolicy, mode: DisplayMode) -> Self {
        let schema = Arc::clone(source.schema());
        Self {
            source,
            schema,
            policy,
            phase: CyclePhase::Uninitialized,
            mode,
            enabled: true,
            current: None,
            baseline: None,
            health: SourceHealth::Healthy,
            consecutive_failures: 0,
        }
    }

    pub fn schema(&self) -> &Arc<SourceSchema> {
        &self.schema
    }

    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    /// Requested mode. Sources that cannot be shown relative always render
    /// absolute regardless, see [`effective_mode`](Self::effective_mode).
    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    pub fn effective_mode(&self) -> DisplayMode {
        if self.schema.relative_capable {
            self.mode
        } else {
            DisplayMode::Absolute
        }
    }

    pub fn health(&self) -> &SourceHealth {
        &self.health
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn current(&self) -> Option<&Snapshot> {
        self.current.as_ref()
    }

    pub fn baseline(&self) -> Option<&Snapshot> {
        self.baseline.as_ref()
    }

    /// Whether the next tick performs a fetch.
    pub fn is_scheduled(&self) -> bool {
        self.enabled && !self.health.is_failed()
    }

    /// Runs one poll.
    ///
    /// Failures are absorbed into [`health`](Self::health) and also returned
    /// so the caller can log or count them. A disabled or failed source is
    /// skipped without fetching.
    pub fn tick(&mut self) -> Result<(), CollectError> {
        if !self.is_scheduled() {
            return Ok(());
        }

        let started = Instant::now();
        let result = self.source.fetch();
        let elapsed = started.elapsed();

        let fetched = match result {
            Ok(_) if elapsed > self.policy.fetch_timeout => {
                Err(CollectError::Timeout(self.policy.fetch_timeout))
            }
            other => other,
        };

        match fetched {
            Ok(current) => {
                debug!(
                    source = self.schema.id,
                    rows = current.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "poll ok"
                );
                self.accept(current);
                Ok(())
            }
            Err(e) => {
                self.record_failure(e.clone());
                Err(e)
            }
        }
    }

    fn accept(&mut self, current: Snapshot) {
        let missing = self.baseline.as_ref().is_none_or(Snapshot::is_empty);
        let reset = !missing
            && self
                .baseline
                .as_ref()
                .is_some_and(|b| engine::needs_rebase(b, &current, self.schema.dominant));

        if reset {
            info!(source = self.schema.id, "counters went backwards, rebasing");
        }
        if missing || reset {
            self.baseline = Some(engine::rebase(&current));
        }

        self.current = Some(current);
        self.phase = CyclePhase::Live;
        self.consecutive_failures = 0;
        self.health = SourceHealth::Healthy;
    }

    fn record_failure(&mut self, error: CollectError) {
        if !error.is_recoverable() {
            warn!(source = self.schema.id, %error, "poll aborted");
            self.health = SourceHealth::Stale {
                failures: self.consecutive_failures,
                error,
            };
            return;
        }

        self.consecutive_failures += 1;
        if self.consecutive_failures >= self.policy.max_consecutive_failures {
            error!(
                source = self.schema.id,
                failures = self.consecutive_failures,
                %error,
                "source failed, polling stopped"
            );
            self.health = SourceHealth::Failed { error };
        } else {
            warn!(
                source = self.schema.id,
                failures = self.consecutive_failures,
                %error,
                "poll failed, will retry"
            );
            self.health = SourceHealth::Stale {
                failures: self.consecutive_failures,
                error,
            };
        }
    }

    /// Rows for the current mode, unranked. Empty until the first fetch.
    pub fn display_rows(&self) -> Vec<CounterRow> {
        let Some(current) = &self.current else {
            return Vec::new();
        };
        match (self.effective_mode(), &self.baseline) {
            (DisplayMode::Relative, Some(baseline)) => engine::compute_relative(current, baseline),
            _ => current.rows().to_vec(),
        }
    }

    /// Builds the immutable bundle the presenter reads. No I/O.
    pub fn build_bundle(&self) -> ViewBundle {
        let rows = self.display_rows();
        let totals = engine::sum(&rows, self.schema.width());
        let ranked = engine::rank(rows, self.schema.dominant);

        ViewBundle {
            schema: Arc::clone(&self.schema),
            mode: self.effective_mode(),
            rows: ranked,
            totals,
            collected_at: self.current.as_ref().map(Snapshot::collected_at),
            baseline_at: self.baseline.as_ref().map(Snapshot::collected_at),
            health: self.health.clone(),
            enabled: self.enabled,
        }
    }

    /// Flips absolute/relative and returns the new requested mode.
    pub fn toggle_mode(&mut self) -> DisplayMode {
        self.set_mode(self.mode.toggled());
        self.mode
    }

    pub fn set_mode(&mut self, mode: DisplayMode) {
        if mode != self.mode {
            debug!(source = self.schema.id, mode = mode.as_str(), "display mode");
        }
        self.mode = mode;
    }

    /// Replaces the baseline with the last fetched snapshot.
    ///
    /// Returns `false` if nothing was fetched yet.
    pub fn force_rebase(&mut self) -> bool {
        match &self.current {
            Some(current) => {
                info!(source = self.schema.id, "baseline reset by user");
                self.baseline = Some(engine::rebase(current));
                true
            }
            None => false,
        }
    }

    /// Adds the source to or removes it from the polled set.
    ///
    /// Enabling a failed source clears its failure count; cached snapshots
    /// and the baseline are kept either way.
    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled && (!self.enabled || self.health.is_failed()) {
            info!(source = self.schema.id, "source enabled");
            self.consecutive_failures = 0;
            if self.health.is_failed() {
                self.health = SourceHealth::Healthy;
            }
        } else if !enabled && self.enabled {
            info!(source = self.schema.id, "source disabled");
        }
        self.enabled = enabled;
    }
}
