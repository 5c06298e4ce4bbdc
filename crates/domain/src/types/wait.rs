//! Named wait strategies
//!
//! Each variant names a delay schedule between retry attempts. The schedule
//! itself is computed by `spool_common::resilience::wait_strategy`; this type
//! only carries the name through configuration.

use serde::{Deserialize, Serialize};

use crate::{impl_domain_conversions, SpoolError};

/// Delay schedule applied between failed attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum WaitStrategy {
    /// Fixed 10 ms
    MinimalWait,
    /// Fixed 5 s
    ShortWait,
    /// Fixed 10 s
    LongWait,
    /// 5 s per attempt
    #[default]
    LinearWait,
    /// 10 s per attempt
    LinearWaitLong,
    /// 5 s per attempt, capped at 60 s
    CappedLinearWait,
    /// 10 s per attempt, capped at 60 s
    CappedLinearWaitLong,
}

impl_domain_conversions!(WaitStrategy {
    MinimalWait => "MinimalWait",
    ShortWait => "ShortWait",
    LongWait => "LongWait",
    LinearWait => "LinearWait",
    LinearWaitLong => "LinearWaitLong",
    CappedLinearWait => "CappedLinearWait",
    CappedLinearWaitLong => "CappedLinearWaitLong",
});

impl WaitStrategy {
    /// Every strategy, in declaration order
    pub const ALL: [Self; 7] = [
        Self::MinimalWait,
        Self::ShortWait,
        Self::LongWait,
        Self::LinearWait,
        Self::LinearWaitLong,
        Self::CappedLinearWait,
        Self::CappedLinearWaitLong,
    ];
}

impl TryFrom<String> for WaitStrategy {
    type Error = SpoolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for strategy in WaitStrategy::ALL {
            assert_eq!(strategy.as_str().parse::<WaitStrategy>().unwrap(), strategy);
        }
    }

    /// Validates that unknown names never fall back to a default.
    ///
    /// Assertions:
    /// - Parsing an unknown name yields `InvalidArgument`.
    /// - Deserializing an unknown name fails.
    #[test]
    fn test_unknown_name_rejected() {
        let err = "ExponentialWait".parse::<WaitStrategy>().unwrap_err();
        assert!(matches!(err, SpoolError::InvalidArgument(_)));

        assert!(serde_json::from_str::<WaitStrategy>("\"ExponentialWait\"").is_err());
    }

    #[test]
    fn test_serde_uses_variant_name() {
        let json = serde_json::to_string(&WaitStrategy::CappedLinearWaitLong).unwrap();
        assert_eq!(json, "\"CappedLinearWaitLong\"");
        let parsed: WaitStrategy = serde_json::from_str("\"minimalwait\"").unwrap();
        assert_eq!(parsed, WaitStrategy::MinimalWait);
    }
}
