//! Identity types: the five-field request key and its derived composite id.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;

/// Suffix appended to every composite id to qualify the document category.
pub const CATEGORY_QUALIFIER: &str = "visa";

/// Separator used between key fields in a composite id.
const COMPOSITE_SEPARATOR: char = '_';

/// The five-field composite that identifies one cacheable content record.
///
/// Matching is exact and case-sensitive. All five fields are mandatory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RequestKey {
    pub resident_country: String,
    pub nationality: String,
    pub destination: String,
    pub visa_category: String,
    pub visa_type: String,
}

impl RequestKey {
    pub fn new(
        resident_country: impl Into<String>,
        nationality: impl Into<String>,
        destination: impl Into<String>,
        visa_category: impl Into<String>,
        visa_type: impl Into<String>,
    ) -> Self {
        Self {
            resident_country: resident_country.into(),
            nationality: nationality.into(),
            destination: destination.into(),
            visa_category: visa_category.into(),
            visa_type: visa_type.into(),
        }
    }

    /// Field names paired with their values, in canonical order.
    pub fn fields(&self) -> [(&'static str, &str); 5] {
        [
            ("resident_country", self.resident_country.as_str()),
            ("nationality", self.nationality.as_str()),
            ("destination", self.destination.as_str()),
            ("visa_category", self.visa_category.as_str()),
            ("visa_type", self.visa_type.as_str()),
        ]
    }

    /// Reject keys with a blank field. Reports the first offending field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (name, value) in self.fields() {
            if value.trim().is_empty() {
                return Err(ValidationError::RequiredFieldMissing {
                    field: name.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Derive the mirror document id for this key.
    pub fn composite_id(&self) -> CompositeId {
        CompositeId::from_key(self)
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {}, {})",
            self.resident_country,
            self.nationality,
            self.destination,
            self.visa_category,
            self.visa_type
        )
    }
}

/// Document id in the mirror store, also used as an idempotency token.
///
/// Built as `resident_nationality_destination_category_type_visa`. Any `/`
/// inside a field becomes `-` so the id stays a single path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(transparent)]
pub struct CompositeId(String);

impl CompositeId {
    pub fn from_key(key: &RequestKey) -> Self {
        let mut id = String::new();
        for (_, value) in key.fields() {
            id.push_str(&value.replace('/', "-"));
            id.push(COMPOSITE_SEPARATOR);
        }
        id.push_str(CATEGORY_QUALIFIER);
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for CompositeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Wraps an id received from a client, e.g. a path segment. No format check.
impl From<String> for CompositeId {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl AsRef<str> for CompositeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
