//! Cipher operations and the persisted cipher profile

use crate::error::{ExtractStep, RytmError};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// One step of a signature transformation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherOperation {
    /// Reverse the whole sequence
    Reverse,
    /// Remove the first `n` characters
    Splice(usize),
    /// Exchange position 0 with position `i mod len`
    Swap(usize),
}

impl CipherOperation {
    /// Operation name used in the stored encoding
    pub fn name(&self) -> &'static str {
        match self {
            CipherOperation::Reverse => "reverse",
            CipherOperation::Splice(_) => "splice",
            CipherOperation::Swap(_) => "swap",
        }
    }

    /// Numeric parameter, 0 for `Reverse`
    pub fn param(&self) -> usize {
        match self {
            CipherOperation::Reverse => 0,
            CipherOperation::Splice(n) | CipherOperation::Swap(n) => *n,
        }
    }

    /// Build an operation of the same kind carrying a new parameter
    pub fn with_param(self, param: usize) -> Self {
        match self {
            CipherOperation::Reverse => CipherOperation::Reverse,
            CipherOperation::Splice(_) => CipherOperation::Splice(param),
            CipherOperation::Swap(_) => CipherOperation::Swap(param),
        }
    }
}

impl fmt::Display for CipherOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CipherOperation::Reverse => f.write_str("reverse"),
            op => write!(f, "{},{}", op.name(), op.param()),
        }
    }
}

impl FromStr for CipherOperation {
    type Err = RytmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, param) = match s.trim().split_once(',') {
            Some((name, param)) => (name.trim(), Some(param.trim())),
            None => (s.trim(), None),
        };
        let param = match param {
            Some(p) => p
                .parse::<usize>()
                .map_err(|_| RytmError::Profile(format!("bad parameter in '{}'", s)))?,
            None => 0,
        };
        match name {
            "reverse" => Ok(CipherOperation::Reverse),
            "splice" => Ok(CipherOperation::Splice(param)),
            "swap" => Ok(CipherOperation::Swap(param)),
            other => Err(RytmError::Profile(format!("unknown operation '{}'", other))),
        }
    }
}

/// Join operations into the `|`-delimited stored form
pub fn encode_operations(operations: &[CipherOperation]) -> String {
    operations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("|")
}

/// Parse the `|`-delimited stored form
pub fn decode_operations(encoded: &str) -> Result<Vec<CipherOperation>, RytmError> {
    encoded
        .split('|')
        .filter(|part| !part.trim().is_empty())
        .map(str::parse)
        .collect()
}

/// The currently believed signature transformation, tied to a script version.
///
/// A profile always carries at least one operation; construction rejects an
/// empty list so the store can never hold one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipherProfile {
    version: String,
    operations: Vec<CipherOperation>,
    updated_at: DateTime<Utc>,
}

impl CipherProfile {
    /// Create a profile stamped with the current time
    pub fn new(
        version: impl Into<String>,
        operations: Vec<CipherOperation>,
    ) -> Result<Self, RytmError> {
        Self::with_timestamp(version, operations, Utc::now())
    }

    /// Create a profile with an explicit update time
    pub fn with_timestamp(
        version: impl Into<String>,
        operations: Vec<CipherOperation>,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, RytmError> {
        if operations.is_empty() {
            return Err(RytmError::Extract(ExtractStep::EmptySequence));
        }
        Ok(Self {
            version: version.into(),
            operations,
            updated_at,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn operations(&self) -> &[CipherOperation] {
        &self.operations
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Time elapsed since the profile was extracted
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.updated_at).to_std().unwrap_or(Duration::ZERO)
    }

    /// Whether the profile is older than `max_age`
    pub fn is_stale(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        self.age(now) > max_age
    }

    /// Apply this profile to an obfuscated signature
    pub fn decipher(&self, signature: &str) -> String {
        super::apply::apply_operations(&self.operations, signature)
    }
}

/// Keyed stored form of a profile: three scalar fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredProfile {
    pub version: String,
    pub operations: String,
    /// Epoch milliseconds
    pub updated_at: i64,
}

impl From<&CipherProfile> for StoredProfile {
    fn from(profile: &CipherProfile) -> Self {
        Self {
            version: profile.version.clone(),
            operations: encode_operations(&profile.operations),
            updated_at: profile.updated_at.timestamp_millis(),
        }
    }
}

impl TryFrom<StoredProfile> for CipherProfile {
    type Error = RytmError;

    fn try_from(stored: StoredProfile) -> Result<Self, Self::Error> {
        let operations = decode_operations(&stored.operations)?;
        let updated_at = Utc
            .timestamp_millis_opt(stored.updated_at)
            .single()
            .ok_or_else(|| RytmError::Profile(format!("bad timestamp {}", stored.updated_at)))?;
        CipherProfile::with_timestamp(stored.version, operations, updated_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_encoding() {
        let ops = vec![
            CipherOperation::Splice(3),
            CipherOperation::Reverse,
            CipherOperation::Swap(42),
        ];
        assert_eq!(encode_operations(&ops), "splice,3|reverse|swap,42");
        assert_eq!(decode_operations("splice,3|reverse|swap,42").unwrap(), ops);
    }

    #[test]
    fn test_decode_tolerates_reverse_param_and_blanks() {
        let ops = decode_operations(" reverse,0 || splice, 2 ").unwrap();
        assert_eq!(ops, vec![CipherOperation::Reverse, CipherOperation::Splice(2)]);
    }

    #[test]
    fn test_decode_rejects_unknown() {
        assert!(decode_operations("rotate,2").is_err());
        assert!(decode_operations("splice,x").is_err());
    }

    #[test]
    fn test_profile_rejects_empty_operations() {
        let err = CipherProfile::new("abc", Vec::new()).unwrap_err();
        assert!(matches!(err, RytmError::Extract(ExtractStep::EmptySequence)));
    }

    #[test]
    fn test_stored_profile_conversion() {
        let updated_at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let profile = CipherProfile::with_timestamp(
            "0ab1c2d3",
            vec![CipherOperation::Reverse, CipherOperation::Swap(7)],
            updated_at,
        )
        .unwrap();

        let stored = StoredProfile::from(&profile);
        assert_eq!(stored.version, "0ab1c2d3");
        assert_eq!(stored.operations, "reverse|swap,7");
        assert_eq!(stored.updated_at, 1_700_000_000_123);

        let restored = CipherProfile::try_from(stored).unwrap();
        assert_eq!(restored, profile);
    }

    #[test]
    fn test_stored_profile_with_empty_operations_is_rejected() {
        let stored = StoredProfile {
            version: "v".to_string(),
            operations: String::new(),
            updated_at: 0,
        };
        assert!(CipherProfile::try_from(stored).is_err());
    }

    #[test]
    fn test_staleness() {
        let now = Utc::now();
        let profile = CipherProfile::with_timestamp(
            "v",
            vec![CipherOperation::Reverse],
            now - chrono::Duration::hours(2),
        )
        .unwrap();
        assert!(profile.is_stale(Duration::from_secs(3600), now));
        assert!(!profile.is_stale(Duration::from_secs(3 * 3600), now));
    }
}
