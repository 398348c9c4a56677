//! Dotted numeric versions used to key grammar fragments.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A dotted numeric version such as `8.0.35` or `1.10`.
///
/// Comparison is component-wise and numeric: `1.10 > 1.2`, and missing trailing
/// components count as zero, so `1 == 1.0`.
#[derive(Clone, Debug, Default)]
pub struct Version {
    parts: Vec<u64>,
}

impl Version {
    /// The unconditional (default) version.
    pub const ZERO: Version = Version { parts: Vec::new() };

    /// Build a version from explicit components.
    pub fn new(parts: impl Into<Vec<u64>>) -> Self {
        let mut v = Version {
            parts: parts.into(),
        };
        v.normalize();
        v
    }

    /// Parse a version, keeping the leading dotted numeric components.
    ///
    /// Server version strings carry vendor suffixes (`8.0.35-0ubuntu0`,
    /// `16.2 (Debian 16.2-1)`); everything after the numeric prefix is ignored.
    /// Strings without a numeric prefix parse as [`Version::ZERO`].
    pub fn parse(s: &str) -> Self {
        let mut parts = Vec::new();
        for seg in s.trim().split('.') {
            let digits: String = seg.chars().take_while(|c| c.is_ascii_digit()).collect();
            if digits.is_empty() {
                break;
            }
            match digits.parse::<u64>() {
                Ok(n) => parts.push(n),
                Err(_) => break,
            }
            // A segment like `35-0ubuntu0` ends the numeric prefix.
            if digits.len() != seg.len() {
                break;
            }
        }
        Self::new(parts)
    }

    /// Check if this is the default version.
    pub fn is_zero(&self) -> bool {
        self.parts.is_empty()
    }

    /// Numeric components (trailing zeros stripped).
    pub fn parts(&self) -> &[u64] {
        &self.parts
    }

    fn normalize(&mut self) {
        while self.parts.last() == Some(&0) {
            self.parts.pop();
        }
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.parts == other.parts
    }
}

impl Eq for Version {}

impl std::hash::Hash for Version {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.parts.hash(state);
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        // Both sides are normalized, so lexicographic order on the
        // components matches zero-padded comparison.
        self.parts.cmp(&other.parts)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.parts.is_empty() {
            return f.write_str("0");
        }
        let parts: Vec<String> = self.parts.iter().map(|p| p.to_string()).collect();
        f.write_str(&parts.join("."))
    }
}

impl FromStr for Version {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Version::parse(s))
    }
}

impl From<&str> for Version {
    fn from(s: &str) -> Self {
        Version::parse(s)
    }
}

impl From<String> for Version {
    fn from(s: String) -> Self {
        Version::parse(&s)
    }
}

impl From<u64> for Version {
    fn from(major: u64) -> Self {
        Version::new(vec![major])
    }
}
