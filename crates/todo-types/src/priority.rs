use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Three-rank priority of a [`TodoItem`](crate::TodoItem).
///
/// The derived ordering is the natural one: `Low < Medium < High`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    /// All priorities, lowest first.
    pub const ALL: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];

    /// Numeric rank: 0 for low up to 2 for high. Persisted by durable backends.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
        }
    }

    /// Inverse of [`Priority::rank`].
    pub fn from_rank(rank: u8) -> Option<Self> {
        match rank {
            0 => Some(Self::Low),
            1 => Some(Self::Medium),
            2 => Some(Self::High),
            _ => None,
        }
    }

    /// Lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(TypeError::UnknownPriority(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_low_medium_high() {
        assert!(Priority::Low < Priority::Medium);
        assert!(Priority::Medium < Priority::High);
    }

    #[test]
    fn rank_roundtrip() {
        for p in Priority::ALL {
            assert_eq!(Priority::from_rank(p.rank()), Some(p));
        }
        assert_eq!(Priority::from_rank(3), None);
    }

    #[test]
    fn parse_is_exact() {
        assert_eq!("high".parse::<Priority>().unwrap(), Priority::High);
        assert_eq!(
            "High".parse::<Priority>().unwrap_err(),
            TypeError::UnknownPriority("High".into())
        );
    }

    #[test]
    fn serde_uses_lowercase_names() {
        assert_eq!(serde_json::to_string(&Priority::Low).unwrap(), "\"low\"");
        let p: Priority = serde_json::from_str("\"medium\"").unwrap();
        assert_eq!(p, Priority::Medium);
    }

    #[test]
    fn display_matches_as_str() {
        for p in Priority::ALL {
            assert_eq!(p.to_string(), p.as_str());
        }
    }
}
