//! Worker identity.
//!
//! [`WorkerId`] is the value a worker presents in its `register` envelope.
//! Host environments assign either numeric or textual identities, so both
//! are accepted on the wire. Text that is exactly the decimal form of an
//! `i64` is canonicalized to the numeric form, which keeps `"42"` (from a
//! URL path or an environment variable) and `42` (from JSON) the same key.
//! Other spellings of a number, such as `"007"` or `"+7"`, stay text and
//! are distinct identities.
//!
//! The text identity [`WILDCARD`] is reserved for observer subscriptions
//! and is refused as a worker identity.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// Identity that stands for every worker in observer subscriptions.
pub const WILDCARD: &str = "*";

/// Stable identity of a worker.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum WorkerId {
    /// Numeric identity (e.g. a ComputerCraft computer id).
    Number(i64),
    /// Free-form textual identity.
    Text(String),
}

impl WorkerId {
    /// Returns `true` for the numeric form.
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::Number(_))
    }

    /// Returns `true` for the reserved [`WILDCARD`] text.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::Text(text) if text == WILDCARD)
    }
}

impl FromStr for WorkerId {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl From<&str> for WorkerId {
    fn from(s: &str) -> Self {
        let trimmed = s.trim();
        if let Ok(n) = trimmed.parse::<i64>()
            && n.to_string() == trimmed
        {
            return Self::Number(n);
        }
        Self::Text(s.to_string())
    }
}

impl From<String> for WorkerId {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<i64> for WorkerId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl<'de> Deserialize<'de> for WorkerId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(i64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(Self::Number(n)),
            Raw::Text(s) => Ok(Self::from(s)),
        }
    }
}
