use std::fmt;

use serde::{Deserialize, Serialize};

/// One segment of a [`CacheKey`]: a string or an integer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeySegment {
    Num(i64),
    Str(String),
}

impl From<&str> for KeySegment {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<String> for KeySegment {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for KeySegment {
    fn from(n: i64) -> Self {
        Self::Num(n)
    }
}

impl From<i32> for KeySegment {
    fn from(n: i32) -> Self {
        Self::Num(i64::from(n))
    }
}

impl From<u32> for KeySegment {
    fn from(n: u32) -> Self {
        Self::Num(i64::from(n))
    }
}

impl fmt::Display for KeySegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(n) => write!(f, "{n}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

/// Identity of a cache entry: an ordered list of segments.
///
/// Two keys are the same entry iff their segments are equal element-wise,
/// so `["summoner", 1]` and `["summoner", "1"]` are distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(Vec<KeySegment>);

impl CacheKey {
    pub fn from_segments(segments: Vec<KeySegment>) -> Self {
        Self(segments)
    }

    pub fn segments(&self) -> &[KeySegment] {
        &self.0
    }

    /// Extend the key with one more segment.
    pub fn with(mut self, segment: impl Into<KeySegment>) -> Self {
        self.0.push(segment.into());
        self
    }

    /// Whether `prefix` matches the leading segments of this key.
    pub fn starts_with(&self, prefix: &CacheKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, seg) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match seg {
                KeySegment::Num(n) => write!(f, "{n}")?,
                KeySegment::Str(s) => write!(f, "{s:?}")?,
            }
        }
        f.write_str("]")
    }
}

/// Build a [`CacheKey`] from mixed string and integer segments.
///
/// ```
/// use loadout_core::cache_key;
/// let key = cache_key!["summoner", 42];
/// assert_eq!(key.to_string(), r#"["summoner", 42]"#);
/// ```
#[macro_export]
macro_rules! cache_key {
    ($($seg:expr),+ $(,)?) => {
        $crate::query::CacheKey::from_segments(
            ::std::vec![$($crate::query::KeySegment::from($seg)),+]
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_types_are_distinct() {
        assert_ne!(cache_key!["summoner", 1], cache_key!["summoner", "1"]);
        assert_eq!(cache_key!["summoner", 1], cache_key!["summoner", 1_i64]);
    }

    #[test]
    fn serializes_as_plain_array() {
        let key = cache_key!["champion-mastery", 7];
        assert_eq!(
            serde_json::to_value(&key).unwrap_or_default(),
            serde_json::json!(["champion-mastery", 7])
        );
    }

    #[test]
    fn prefix_matching() {
        let key = cache_key!["summoner", 1, "icons"];
        assert!(key.starts_with(&cache_key!["summoner"]));
        assert!(!key.starts_with(&cache_key!["mastery"]));
        assert_eq!(cache_key!["summoner"].with(1).with("icons"), key);
    }
}
