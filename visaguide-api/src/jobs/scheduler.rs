//! Scheduled Repopulation
//!
//! Runs the bulk repopulator on a fixed interval until a shutdown signal is
//! received. Disabled unless `VISAGUIDE_REPOPULATE_ENABLED=true`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use visaguide_core::{ConfigError, Provider};

use super::repopulate::{BulkRepopulator, RepopulateRequest};
use crate::constants::{
    DEFAULT_REPOPULATE_CONCURRENCY, DEFAULT_REPOPULATE_DAYS, DEFAULT_REPOPULATE_LIMIT,
    DEFAULT_SCHEDULE_INTERVAL_SECS,
};

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepopulateScheduleConfig {
    pub enabled: bool,
    /// Time between runs. The first run happens one interval after start.
    pub interval: Duration,
    pub days: u32,
    pub limit: usize,
    pub concurrency: usize,
    pub provider: Provider,
}

impl Default for RepopulateScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: Duration::from_secs(DEFAULT_SCHEDULE_INTERVAL_SECS),
            days: DEFAULT_REPOPULATE_DAYS,
            limit: DEFAULT_REPOPULATE_LIMIT,
            concurrency: DEFAULT_REPOPULATE_CONCURRENCY,
            provider: Provider::default(),
        }
    }
}

impl RepopulateScheduleConfig {
    /// Create the schedule from environment variables.
    ///
    /// # Environment Variables
    /// - `VISAGUIDE_REPOPULATE_ENABLED`: "true" to enable (default: false)
    /// - `VISAGUIDE_REPOPULATE_INTERVAL_SECS` (default: 86400)
    /// - `VISAGUIDE_REPOPULATE_DAYS` (default: 30)
    /// - `VISAGUIDE_REPOPULATE_LIMIT` (default: 500)
    /// - `VISAGUIDE_REPOPULATE_CONCURRENCY` (default: 5)
    /// - `VISAGUIDE_REPOPULATE_PROVIDER` (default: openai)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        let provider = match var("VISAGUIDE_REPOPULATE_PROVIDER") {
            Some(raw) => raw.parse()?,
            None => defaults.provider,
        };

        let config = Self {
            enabled: var("VISAGUIDE_REPOPULATE_ENABLED")
                .map(|s| s.trim().eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.enabled),
            interval: var("VISAGUIDE_REPOPULATE_INTERVAL_SECS")
                .and_then(|s| s.trim().parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.interval),
            days: var("VISAGUIDE_REPOPULATE_DAYS")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(defaults.days),
            limit: var("VISAGUIDE_REPOPULATE_LIMIT")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(defaults.limit),
            concurrency: var("VISAGUIDE_REPOPULATE_CONCURRENCY")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(defaults.concurrency),
            provider,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "repopulate_interval".to_string(),
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "repopulate_concurrency".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn request(&self) -> RepopulateRequest {
        RepopulateRequest {
            days: self.days,
            provider: self.provider,
            limit: self.limit,
            concurrency: self.concurrency,
        }
    }
}

// ============================================================================
// METRICS
// ============================================================================

/// Counters for scheduled runs since startup.
#[derive(Debug, Default)]
pub struct ScheduleMetrics {
    pub runs: AtomicU64,
    pub refreshed: AtomicU64,
    pub failed: AtomicU64,
    /// Runs aborted before any job started
    pub run_errors: AtomicU64,
}

impl ScheduleMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ScheduleSnapshot {
        ScheduleSnapshot {
            runs: self.runs.load(Ordering::Relaxed),
            refreshed: self.refreshed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            run_errors: self.run_errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleSnapshot {
    pub runs: u64,
    pub refreshed: u64,
    pub failed: u64,
    pub run_errors: u64,
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

/// Background task running [`BulkRepopulator::run`] every `config.interval`.
///
/// Returns the collected counters once `shutdown_rx` flips to `true` or its
/// sender is dropped. A run in progress is finished before the signal is
/// observed.
pub async fn repopulate_schedule_task(
    repopulator: BulkRepopulator,
    config: RepopulateScheduleConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<ScheduleMetrics> {
    let metrics = Arc::new(ScheduleMetrics::new());

    let mut ticker = interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately.
    ticker.tick().await;

    tracing::info!(
        interval_secs = config.interval.as_secs(),
        days = config.days,
        limit = config.limit,
        concurrency = config.concurrency,
        provider = %config.provider,
        "Repopulation schedule started"
    );

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("Repopulation schedule shutting down");
                    break;
                }
            }

            _ = ticker.tick() => {
                run_once(&repopulator, &config, &metrics).await;
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        runs = snapshot.runs,
        refreshed = snapshot.refreshed,
        failed = snapshot.failed,
        run_errors = snapshot.run_errors,
        "Repopulation schedule stopped"
    );

    metrics
}

async fn run_once(
    repopulator: &BulkRepopulator,
    config: &RepopulateScheduleConfig,
    metrics: &ScheduleMetrics,
) {
    metrics.runs.fetch_add(1, Ordering::Relaxed);

    match repopulator.run(config.request()).await {
        Ok(summary) => {
            metrics
                .refreshed
                .fetch_add(summary.refreshed as u64, Ordering::Relaxed);
            metrics
                .failed
                .fetch_add(summary.failed as u64, Ordering::Relaxed);
            if summary.failed > 0 {
                tracing::warn!(
                    requested = summary.requested,
                    failed = summary.failed,
                    "Scheduled repopulation finished with failures"
                );
            }
        }
        Err(e) => {
            metrics.run_errors.fetch_add(1, Ordering::Relaxed);
            tracing::error!(error = %e, "Scheduled repopulation aborted");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_disabled_by_default() {
        let config = RepopulateScheduleConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.interval, Duration::from_secs(DEFAULT_SCHEDULE_INTERVAL_SECS));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_request_mirrors_config() {
        let config = RepopulateScheduleConfig {
            days: 7,
            limit: 20,
            concurrency: 2,
            provider: Provider::Anthropic,
            ..Default::default()
        };
        let request = config.request();
        assert_eq!(request.days, 7);
        assert_eq!(request.limit, 20);
        assert_eq!(request.concurrency, 2);
        assert_eq!(request.provider, Provider::Anthropic);
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let config = RepopulateScheduleConfig {
            interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_metrics_snapshot() {
        let metrics = ScheduleMetrics::new();
        metrics.runs.store(3, Ordering::Relaxed);
        metrics.refreshed.store(12, Ordering::Relaxed);
        metrics.failed.store(1, Ordering::Relaxed);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.runs, 3);
        assert_eq!(snapshot.refreshed, 12);
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.run_errors, 0);
    }
}
