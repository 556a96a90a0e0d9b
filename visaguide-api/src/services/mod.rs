//! Service Layer
//!
//! The request coordinator, the regeneration job it launches, and the
//! in-process guard that keeps one job per key running at a time.

mod coordinator;
mod inflight;
mod regeneration;

pub use coordinator::*;
pub use inflight::*;
pub use regeneration::*;
