//! Background Jobs for the VisaGuide API
//!
//! - `repopulate`: refreshes every stale record under bounded concurrency
//! - `scheduler`: runs `repopulate` on an interval until shutdown
//!
//! # Usage
//!
//! ```ignore
//! use visaguide_api::jobs::{repopulate_schedule_task, RepopulateScheduleConfig};
//! use tokio::sync::watch;
//!
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! let config = RepopulateScheduleConfig::from_env()?;
//! tokio::spawn(repopulate_schedule_task(repopulator, config, shutdown_rx));
//!
//! // On shutdown
//! let _ = shutdown_tx.send(true);
//! ```

pub mod repopulate;
pub mod scheduler;

pub use repopulate::{BulkRepopulator, RepopulateRequest};
pub use scheduler::{
    repopulate_schedule_task, RepopulateScheduleConfig, ScheduleMetrics, ScheduleSnapshot,
};
