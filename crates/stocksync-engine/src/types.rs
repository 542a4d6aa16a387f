//! Outcome and phase types.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Classification of one source record against the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationOutcome {
    /// Fingerprints match; nothing written.
    Unchanged,
    /// Row exists with a different fingerprint; overwritten.
    Updated,
    /// No row for the key; created.
    Inserted,
}

impl ReconciliationOutcome {
    /// Get the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconciliationOutcome::Unchanged => "unchanged",
            ReconciliationOutcome::Updated => "updated",
            ReconciliationOutcome::Inserted => "inserted",
        }
    }

    /// Whether the outcome requires a write.
    #[must_use]
    pub fn is_write(&self) -> bool {
        !matches!(self, ReconciliationOutcome::Unchanged)
    }
}

impl Display for ReconciliationOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle of a run.
///
/// ```text
/// Idle → Fetching → Partitioned → Dispatching → Aggregating → Done
///   └───────┴───────────┴─────────────┴─────────────┴──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Idle,
    Fetching,
    Partitioned,
    Dispatching,
    Aggregating,
    Done,
    Failed,
}

impl RunPhase {
    /// Get the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RunPhase::Idle => "idle",
            RunPhase::Fetching => "fetching",
            RunPhase::Partitioned => "partitioned",
            RunPhase::Dispatching => "dispatching",
            RunPhase::Aggregating => "aggregating",
            RunPhase::Done => "done",
            RunPhase::Failed => "failed",
        }
    }

    /// Check if this is a terminal phase.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunPhase::Done | RunPhase::Failed)
    }

    /// Check if the run may move from this phase to `next`.
    #[must_use]
    pub fn can_transition_to(&self, next: RunPhase) -> bool {
        match (self, next) {
            (RunPhase::Idle, RunPhase::Fetching)
            | (RunPhase::Fetching, RunPhase::Partitioned)
            | (RunPhase::Partitioned, RunPhase::Dispatching)
            | (RunPhase::Dispatching, RunPhase::Aggregating)
            | (RunPhase::Aggregating, RunPhase::Done) => true,
            (current, RunPhase::Failed) => !current.is_terminal(),
            _ => false,
        }
    }
}

impl Display for RunPhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RunPhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(RunPhase::Idle),
            "fetching" => Ok(RunPhase::Fetching),
            "partitioned" => Ok(RunPhase::Partitioned),
            "dispatching" => Ok(RunPhase::Dispatching),
            "aggregating" => Ok(RunPhase::Aggregating),
            "done" => Ok(RunPhase::Done),
            "failed" => Ok(RunPhase::Failed),
            _ => Err(format!("Unknown run phase: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [RunPhase; 7] = [
        RunPhase::Idle,
        RunPhase::Fetching,
        RunPhase::Partitioned,
        RunPhase::Dispatching,
        RunPhase::Aggregating,
        RunPhase::Done,
        RunPhase::Failed,
    ];

    #[test]
    fn test_run_phase_happy_path() {
        let path = [
            RunPhase::Idle,
            RunPhase::Fetching,
            RunPhase::Partitioned,
            RunPhase::Dispatching,
            RunPhase::Aggregating,
            RunPhase::Done,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_run_phase_failed_reachable_from_non_terminal() {
        for phase in ALL {
            assert_eq!(
                phase.can_transition_to(RunPhase::Failed),
                !phase.is_terminal(),
                "{phase}"
            );
        }
    }

    #[test]
    fn test_run_phase_rejects_skips_and_reversals() {
        assert!(!RunPhase::Idle.can_transition_to(RunPhase::Dispatching));
        assert!(!RunPhase::Aggregating.can_transition_to(RunPhase::Fetching));
        assert!(!RunPhase::Done.can_transition_to(RunPhase::Idle));
        assert!(!RunPhase::Failed.can_transition_to(RunPhase::Done));
    }

    #[test]
    fn test_run_phase_terminal() {
        assert!(RunPhase::Done.is_terminal());
        assert!(RunPhase::Failed.is_terminal());
        assert!(!RunPhase::Dispatching.is_terminal());
    }

    #[test]
    fn test_run_phase_from_str() {
        for phase in ALL {
            assert_eq!(phase.as_str().parse::<RunPhase>().unwrap(), phase);
        }
        assert!("running".parse::<RunPhase>().is_err());
    }

    #[test]
    fn test_outcome_is_write() {
        assert!(!ReconciliationOutcome::Unchanged.is_write());
        assert!(ReconciliationOutcome::Updated.is_write());
        assert_eq!(ReconciliationOutcome::Inserted.to_string(), "inserted");
    }
}
