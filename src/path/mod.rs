//! Resource paths: the addressing primitive.
//!
//! # Data Flow
//! ```text
//! "/users/Alice%20Smith/"           (URL-encoded input)
//!     → ResourcePath::parse
//!         - strip one leading + one trailing '/'
//!         - reject empty segments ("a//b")
//!         - keep encoded original  "users/Alice%20Smith"
//!         - keep encoded lowercase "users/alice%20smith"
//!     → routing keys, comparisons, Display
//! ```
//!
//! # Design Decisions
//! - Immutable; every operation returns a new value
//! - Equality, ordering and hashing use the normalized (lowercase) form
//! - Display returns the original casing, still URL-encoded
//! - Accessors (`get`, `leaf`, `iter`) return percent-decoded segments

mod encoding;

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Serialize, Serializer};

use crate::error::{ResourceError, ResourceResult};

pub use encoding::{decode_segment, encode_segment};

/// An immutable, case-insensitively compared sequence of path segments.
#[derive(Clone)]
pub struct ResourcePath {
    /// URL-encoded, original casing, segments joined by '/'.
    path: Arc<str>,
    /// URL-encoded, lowercase, segments joined by '/'.
    normalized: Arc<str>,
    size: usize,
}

impl ResourcePath {
    /// The zero-segment path. Displays as the empty string.
    pub fn empty() -> Self {
        Self {
            path: Arc::from(""),
            normalized: Arc::from(""),
            size: 0,
        }
    }

    /// Parse a URL-encoded path string.
    pub fn parse(path: &str) -> ResourceResult<Self> {
        if path.is_empty() {
            return Ok(Self::empty());
        }

        let elements: Vec<&str> = path.split('/').collect();
        let sz = elements.len();
        let start = usize::from(elements[0].is_empty());
        let end = if sz > 1 && elements[sz - 1].is_empty() { sz - 1 } else { sz };
        if start >= end {
            return Ok(Self::empty());
        }

        let mut trimmed = String::with_capacity(path.len());
        let mut normalized = String::with_capacity(path.len());
        for (i, element) in elements[start..end].iter().enumerate() {
            if element.is_empty() {
                return Err(ResourceError::BadRequest(format!(
                    "Resource path '{path}' contains empty path elements"
                )));
            }
            if i > 0 {
                trimmed.push('/');
                normalized.push('/');
            }
            trimmed.push_str(element);
            normalized.push_str(&encoding::normalize(&decode_segment(element)));
        }

        Ok(Self::from_parts(trimmed, normalized, end - start))
    }

    /// Build a path from unencoded segments.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        segments
            .into_iter()
            .fold(Self::empty(), |path, segment| path.child(segment))
    }

    /// Substitute each `{}` in `template` with the next URL-encoded
    /// argument, then parse the result.
    ///
    /// ```
    /// # use crest_router::path::ResourcePath;
    /// let path = ResourcePath::format("rest/users/{}", &["bjensen"]).unwrap();
    /// assert_eq!(path.to_string(), "rest/users/bjensen");
    /// ```
    pub fn format<S: AsRef<str>>(template: &str, args: &[S]) -> ResourceResult<Self> {
        let mut out = String::with_capacity(template.len());
        let mut args = args.iter();
        let mut rest = template;
        while let Some(idx) = rest.find("{}") {
            out.push_str(&rest[..idx]);
            match args.next() {
                Some(arg) => out.push_str(&encode_segment(arg.as_ref())),
                None => {
                    return Err(ResourceError::BadRequest(format!(
                        "Too few arguments for resource path template '{template}'"
                    )))
                }
            }
            rest = &rest[idx + 2..];
        }
        out.push_str(rest);
        Self::parse(&out)
    }

    fn from_parts(path: String, normalized: String, size: usize) -> Self {
        Self {
            path: Arc::from(path),
            normalized: Arc::from(normalized),
            size,
        }
    }

    /// A new path with `segment` (unencoded) appended.
    pub fn child(&self, segment: impl AsRef<str>) -> Self {
        let segment = segment.as_ref();
        let encoded = encode_segment(segment);
        let normalized = encoding::normalize(segment);
        if self.is_empty() {
            Self::from_parts(encoded, normalized, 1)
        } else {
            Self::from_parts(
                format!("{}/{}", self.path, encoded),
                format!("{}/{}", self.normalized, normalized),
                self.size + 1,
            )
        }
    }

    /// The path without its last segment, or `None` for the empty path.
    pub fn parent(&self) -> Option<Self> {
        match self.size {
            0 => None,
            n => self.head(n - 1),
        }
    }

    /// This path followed by `suffix`.
    pub fn concat(&self, suffix: &ResourcePath) -> Self {
        if self.is_empty() {
            suffix.clone()
        } else if suffix.is_empty() {
            self.clone()
        } else {
            Self::from_parts(
                format!("{}/{}", self.path, suffix.path),
                format!("{}/{}", self.normalized, suffix.normalized),
                self.size + suffix.size,
            )
        }
    }

    /// True if the leading segments of this path equal `prefix`.
    pub fn starts_with(&self, prefix: &ResourcePath) -> bool {
        if prefix.is_empty() {
            return true;
        }
        match self.normalized.strip_prefix(&*prefix.normalized) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    /// Segments `begin..end`, or `None` if the range is out of bounds.
    pub fn sub_sequence(&self, begin: usize, end: usize) -> Option<Self> {
        if begin > end || end > self.size {
            return None;
        }
        if begin == 0 && end == self.size {
            return Some(self.clone());
        }
        let path = self.encoded_segments().skip(begin).take(end - begin);
        let normalized = self.normalized_segments().skip(begin).take(end - begin);
        Some(Self::from_parts(
            path.collect::<Vec<_>>().join("/"),
            normalized.collect::<Vec<_>>().join("/"),
            end - begin,
        ))
    }

    /// The first `end` segments.
    pub fn head(&self, end: usize) -> Option<Self> {
        self.sub_sequence(0, end)
    }

    /// Everything after the first `begin` segments.
    pub fn tail(&self, begin: usize) -> Option<Self> {
        self.sub_sequence(begin, self.size)
    }

    /// Decoded segment at `index` (0 is closest to the root).
    pub fn get(&self, index: usize) -> Option<String> {
        self.encoded_segments().nth(index).map(decode_segment)
    }

    /// Decoded last segment.
    pub fn leaf(&self) -> Option<String> {
        self.size.checked_sub(1).and_then(|i| self.get(i))
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Decoded segments, root first.
    pub fn iter(&self) -> impl Iterator<Item = String> + '_ {
        self.encoded_segments().map(decode_segment)
    }

    /// URL-encoded form with original casing.
    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// URL-encoded lowercase form used for comparisons.
    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    fn encoded_segments(&self) -> impl Iterator<Item = &str> {
        self.path.split('/').filter(|s| !s.is_empty())
    }

    fn normalized_segments(&self) -> impl Iterator<Item = &str> {
        self.normalized.split('/').filter(|s| !s.is_empty())
    }
}

impl Default for ResourcePath {
    fn default() -> Self {
        Self::empty()
    }
}

impl FromStr for ResourcePath {
    type Err = ResourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

impl fmt::Debug for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourcePath({:?})", &*self.path)
    }
}

impl PartialEq for ResourcePath {
    fn eq(&self, other: &Self) -> bool {
        self.normalized == other.normalized
    }
}

impl Eq for ResourcePath {}

impl Hash for ResourcePath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized.hash(state);
    }
}

impl PartialOrd for ResourcePath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ResourcePath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.normalized.cmp(&other.normalized)
    }
}

impl Serialize for ResourcePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
