//! VisaGuide Core - Entity Types
//!
//! Pure data structures shared by every other crate: the request key, the
//! content record, status and provider enums, and the error taxonomy.
//! This crate contains no I/O.

pub mod entities;
pub mod enums;
pub mod error;
pub mod identity;

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub use entities::{ContentRecord, GeneratedContent, RequestProfile, MANDATORY_FIELDS};
pub use enums::{Provider, RecordStatus};
pub use error::{
    ConfigError, GenerationError, GuideError, GuideResult, MirrorError, StoreError,
    ValidationError,
};
pub use identity::{CompositeId, RequestKey, CATEGORY_QUALIFIER};

/// Surrogate row identifier using UUIDv7 for timestamp-sortable IDs.
pub type EntityId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Seconds in one day, the unit of every freshness and staleness window.
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Generate a new UUIDv7 EntityId (timestamp-sortable).
pub fn new_entity_id() -> EntityId {
    Uuid::now_v7()
}
