//! Version - per content unit snapshot number
//!
//! - Scoped to one content unit id
//! - Strictly increasing, never reused
//! - `FIRST` is 0

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Version number of an archived content unit or element.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(u64);

impl Version {
    /// The first version ever issued for a content unit.
    pub const FIRST: Version = Version(0);

    #[inline]
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn value(&self) -> u64 {
        self.0
    }

    /// The version following this one.
    #[inline]
    pub fn next(&self) -> Version {
        Version(self.0 + 1)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Version {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>().map(Version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_is_zero() {
        assert_eq!(Version::FIRST.value(), 0);
        assert_eq!(Version::FIRST.next(), Version::new(1));
    }

    #[test]
    fn test_display_and_parse() {
        let v = Version::new(17);
        assert_eq!(v.to_string(), "17");
        assert_eq!("17".parse::<Version>().unwrap(), v);
        assert!("-1".parse::<Version>().is_err());
    }

    #[test]
    fn test_serializes_as_number() {
        assert_eq!(serde_json::to_string(&Version::new(3)).unwrap(), "3");
    }
}
