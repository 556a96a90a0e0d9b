//! Shared defaults for the API layer.

// ============================================================================
// SERVER
// ============================================================================

pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_CORS_MAX_AGE_SECS: u64 = 86_400;
pub const DEFAULT_MIRROR_CHANNEL_CAPACITY: usize = 1_000;

// ============================================================================
// MAINTENANCE
// ============================================================================

/// Header carrying the shared maintenance secret.
pub const MAINTENANCE_SECRET_HEADER: &str = "x-maintenance-secret";

/// Maximum number of per-key errors returned in a repopulation summary.
pub const ERROR_PREVIEW_LIMIT: usize = 20;

pub const DEFAULT_REPOPULATE_DAYS: u32 = 30;
pub const DEFAULT_REPOPULATE_LIMIT: usize = 500;
pub const DEFAULT_REPOPULATE_CONCURRENCY: usize = 5;

/// Rows not touched within this many days are eligible for purge.
pub const DEFAULT_PURGE_DAYS: u32 = 365;

// ============================================================================
// SCHEDULER
// ============================================================================

pub const DEFAULT_SCHEDULE_INTERVAL_SECS: u64 = 24 * 60 * 60;
