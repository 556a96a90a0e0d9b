//! VisaGuide Storage
//!
//! Store traits, the freshness policy, and in-memory implementations of the
//! record and mirror stores. The Postgres record store lives in the API crate
//! next to its pool configuration.

pub mod freshness;
pub mod memory;
pub mod mirror;
pub mod traits;

pub use freshness::{is_fresh, stale_cutoff, FreshnessPolicy, DEFAULT_FRESHNESS_DAYS};
pub use memory::InMemoryRecordStore;
pub use mirror::{
    error_payload, ready_payload, status_payload, BestEffortMirror, InMemoryMirrorStore,
    MirrorChange, DEFAULT_CHANGE_CAPACITY,
};
pub use traits::{MirrorStore, RecordPatch, RecordStore};
