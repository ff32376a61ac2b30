//! Sort keys for queries.

use std::fmt;
use std::str::FromStr;

use crate::error::{ResourceError, ResourceResult};
use crate::json::JsonPointer;

/// A field to sort on and the direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: JsonPointer,
    pub ascending: bool,
}

impl SortKey {
    pub fn ascending(field: impl Into<JsonPointer>) -> Self {
        Self {
            field: field.into(),
            ascending: true,
        }
    }

    pub fn descending(field: impl Into<JsonPointer>) -> Self {
        Self {
            field: field.into(),
            ascending: false,
        }
    }

    /// Parse `+field`, `-field`, or `field` (ascending).
    pub fn parse(key: &str) -> ResourceResult<Self> {
        let key = key.trim();
        let (ascending, field) = match key.as_bytes().first() {
            Some(b'+') => (true, &key[1..]),
            Some(b'-') => (false, &key[1..]),
            _ => (true, key),
        };
        if field.is_empty() {
            return Err(ResourceError::BadRequest(format!(
                "The sort key '{key}' could not be parsed because it does not contain a field name"
            )));
        }
        Ok(Self {
            field: JsonPointer::parse(field),
            ascending,
        })
    }

    /// Parse a comma-separated list of keys.
    pub fn parse_list(keys: &str) -> ResourceResult<Vec<Self>> {
        keys.split(',')
            .filter(|k| !k.trim().is_empty())
            .map(Self::parse)
            .collect()
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.ascending { '+' } else { '-' };
        write!(f, "{sign}{}", self.field)
    }
}

impl FromStr for SortKey {
    type Err = ResourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
