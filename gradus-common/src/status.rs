//! Phase status enumeration and current-status derivation
//!
//! A phase instance never stores its status as a mutable field. Status is
//! derived from the append-only `StatusRecord` history: the record with the
//! greatest `created_at` wins, and an empty history means `NotStarted`.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::Error;
use crate::models::StatusRecord;

/// Review status of a phase instance
///
/// Closed set: unknown status strings fail parsing instead of silently
/// defaulting. `Completed` records are written by the project-level
/// completion path; this subsystem only ever writes `Approved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum PhaseStatus {
    /// No status record exists yet
    NotStarted,
    /// Student workspace is open
    InProgress,
    /// Submitted, awaiting teacher review
    UnderReview,
    /// Teacher requested changes, student must respond
    RevisionNeeded,
    /// Teacher signed off
    Approved,
    /// Resolved via project-level completion
    Completed,
    /// Teacher declined the phase
    Failed,
}

impl PhaseStatus {
    /// Canonical wire token for this status
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseStatus::NotStarted => "NotStarted",
            PhaseStatus::InProgress => "InProgress",
            PhaseStatus::UnderReview => "UnderReview",
            PhaseStatus::RevisionNeeded => "RevisionNeeded",
            PhaseStatus::Approved => "Approved",
            PhaseStatus::Completed => "Completed",
            PhaseStatus::Failed => "Failed",
        }
    }

    /// Terminal statuses admit no further teacher action
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PhaseStatus::Approved | PhaseStatus::Completed | PhaseStatus::Failed
        )
    }

    /// Resolved statuses count toward phase completion percentage.
    ///
    /// A `Failed` phase is resolved, not open, so it counts.
    pub fn is_resolved(&self) -> bool {
        self.is_terminal()
    }
}

impl std::fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PhaseStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NotStarted" => Ok(PhaseStatus::NotStarted),
            "InProgress" => Ok(PhaseStatus::InProgress),
            "UnderReview" => Ok(PhaseStatus::UnderReview),
            "RevisionNeeded" => Ok(PhaseStatus::RevisionNeeded),
            "Approved" => Ok(PhaseStatus::Approved),
            "Completed" => Ok(PhaseStatus::Completed),
            "Failed" => Ok(PhaseStatus::Failed),
            other => Err(Error::InvalidInput(format!(
                "unrecognized phase status: {:?}",
                other
            ))),
        }
    }
}

/// Derive the current status of a phase instance from its status history.
///
/// The authoritative rule: the status of the record with the greatest
/// `created_at` wins. Ties resolve to the latest-appended record (the
/// backend returns history in append order). An empty history means the
/// instance is implicitly `NotStarted`.
pub fn current_status(history: &[StatusRecord]) -> PhaseStatus {
    history
        .iter()
        .max_by_key(|record| record.created_at)
        .map(|record| record.status)
        .unwrap_or(PhaseStatus::NotStarted)
}
