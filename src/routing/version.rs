//! API version numbers.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use dashmap::DashMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{ResourceError, ResourceResult};

/// Parsed versions keyed by their source string. Populated on first use
/// and never evicted; the set of distinct version strings is small.
static PARSED: LazyLock<DashMap<String, Version>> = LazyLock::new(DashMap::new);

/// A `major.minor` version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Version {
    major: u32,
    minor: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Parse `"1"` or `"1.2"`.
    pub fn parse(s: &str) -> ResourceResult<Self> {
        if let Some(cached) = PARSED.get(s) {
            return Ok(*cached);
        }
        let version = Self::parse_uncached(s)?;
        PARSED.insert(s.to_string(), version);
        Ok(version)
    }

    fn parse_uncached(s: &str) -> ResourceResult<Self> {
        let invalid = || ResourceError::BadRequest(format!("'{s}' is not a valid version"));
        let (major, minor) = match s.trim().split_once('.') {
            Some((major, minor)) => (major, Some(minor)),
            None => (s.trim(), None),
        };
        let major = major.parse::<u32>().map_err(|_| invalid())?;
        let minor = match minor {
            Some(m) => m.parse::<u32>().map_err(|_| invalid())?,
            None => 0,
        };
        Ok(Self { major, minor })
    }

    pub fn major(&self) -> u32 {
        self.major
    }

    pub fn minor(&self) -> u32 {
        self.minor
    }

    /// True if a resource at this version can serve a request for
    /// `requested`: same major, minor at least as high.
    pub fn is_compatible_with(&self, requested: &Version) -> bool {
        self.major == requested.major && self.minor >= requested.minor
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for Version {
    type Err = ResourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Version::parse(&s).map_err(serde::de::Error::custom)
    }
}
