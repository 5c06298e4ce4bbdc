//! Worker lifecycle status

use serde::{Deserialize, Serialize};

use crate::impl_domain_conversions;

/// Lifecycle state of a worker
///
/// `Stopped -> Running` happens on a successful start. `Running -> Stopped`
/// happens when the drain loop finds the queue empty or when a stop request
/// completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    Running,
    #[default]
    Stopped,
}

impl_domain_conversions!(WorkerStatus {
    Running => "running",
    Stopped => "stopped",
});

impl WorkerStatus {
    /// Whether a drain task is believed to be active
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_stopped() {
        assert_eq!(WorkerStatus::default(), WorkerStatus::Stopped);
        assert!(!WorkerStatus::Stopped.is_running());
        assert!(WorkerStatus::Running.is_running());
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&WorkerStatus::Running).unwrap();
        assert_eq!(json, "\"running\"");
        assert_eq!(WorkerStatus::Running.to_string(), "running");
    }
}
