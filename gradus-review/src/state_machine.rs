//! Phase state machine
//!
//! The authoritative transition table for a phase instance:
//!
//! | From           | Action          | To             |
//! |----------------|-----------------|----------------|
//! | NotStarted     | Start           | InProgress     |
//! | InProgress     | SendToReview    | UnderReview    |
//! | RevisionNeeded | SendToReview    | UnderReview    |
//! | UnderReview    | Approve         | Approved       |
//! | UnderReview    | Decline         | Failed         |
//! | UnderReview    | RequestRevision | RevisionNeeded |
//!
//! Every other (status, action) pair fails with `IllegalTransition`; there
//! are no silent no-ops. Answering a revision request is not a status
//! transition but has its own legality window, see [`can_respond_to_revision`].

use gradus_common::PhaseStatus;
use serde::{Deserialize, Serialize};

use crate::error::ReviewError;

/// Actions that drive the phase lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseAction {
    /// Student opens the phase for the first time
    Start,
    /// Teacher moves the phase in front of the review panel
    SendToReview,
    /// Teacher signs the phase off
    Approve,
    /// Teacher declines the phase
    Decline,
    /// Teacher opens a revision cycle
    RequestRevision,
    /// Student answers an open revision request
    RespondToRevision,
}

impl std::fmt::Display for PhaseAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PhaseAction::Start => write!(f, "start the phase"),
            PhaseAction::SendToReview => write!(f, "send to review"),
            PhaseAction::Approve => write!(f, "approve"),
            PhaseAction::Decline => write!(f, "decline"),
            PhaseAction::RequestRevision => write!(f, "request a revision"),
            PhaseAction::RespondToRevision => write!(f, "respond to a revision"),
        }
    }
}

/// Compute the status an action leads to from the given current status.
///
/// Returns `IllegalTransition` for every (status, action) pair outside the
/// table, naming the actual current status.
pub fn transition(current: PhaseStatus, action: PhaseAction) -> Result<PhaseStatus, ReviewError> {
    use PhaseAction::*;
    use PhaseStatus::*;

    let next = match (current, action) {
        (NotStarted, Start) => InProgress,
        (InProgress, SendToReview) => UnderReview,
        (RevisionNeeded, SendToReview) => UnderReview,
        (UnderReview, Approve) => Approved,
        (UnderReview, Decline) => Failed,
        (UnderReview, RequestRevision) => RevisionNeeded,
        (current, action) => return Err(ReviewError::IllegalTransition { current, action }),
    };
    Ok(next)
}

/// Whether a student may answer a revision request while the owning
/// instance is in `status`.
///
/// Late answers are permitted after a terminal outcome to preserve the
/// audit trail; only `NotStarted`, `InProgress`, and `UnderReview` close
/// the window.
pub fn can_respond_to_revision(status: PhaseStatus) -> bool {
    matches!(
        status,
        PhaseStatus::RevisionNeeded
            | PhaseStatus::Completed
            | PhaseStatus::Approved
            | PhaseStatus::Failed
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATUSES: [PhaseStatus; 7] = [
        PhaseStatus::NotStarted,
        PhaseStatus::InProgress,
        PhaseStatus::UnderReview,
        PhaseStatus::RevisionNeeded,
        PhaseStatus::Approved,
        PhaseStatus::Completed,
        PhaseStatus::Failed,
    ];

    const TABLE_ACTIONS: [PhaseAction; 5] = [
        PhaseAction::Start,
        PhaseAction::SendToReview,
        PhaseAction::Approve,
        PhaseAction::Decline,
        PhaseAction::RequestRevision,
    ];

    fn expected(current: PhaseStatus, action: PhaseAction) -> Option<PhaseStatus> {
        use PhaseAction::*;
        use PhaseStatus::*;
        match (current, action) {
            (NotStarted, Start) => Some(InProgress),
            (InProgress, SendToReview) => Some(UnderReview),
            (RevisionNeeded, SendToReview) => Some(UnderReview),
            (UnderReview, Approve) => Some(Approved),
            (UnderReview, Decline) => Some(Failed),
            (UnderReview, RequestRevision) => Some(RevisionNeeded),
            _ => None,
        }
    }

    #[test]
    fn every_pair_matches_the_table() {
        for current in ALL_STATUSES {
            for action in TABLE_ACTIONS {
                match (transition(current, action), expected(current, action)) {
                    (Ok(next), Some(want)) => assert_eq!(next, want),
                    (Err(ReviewError::IllegalTransition { current: c, action: a }), None) => {
                        assert_eq!(c, current);
                        assert_eq!(a, action);
                    }
                    (got, want) => {
                        panic!("({current:?}, {action:?}) produced {got:?}, expected {want:?}")
                    }
                }
            }
        }
    }

    #[test]
    fn terminal_statuses_admit_no_action() {
        for current in [
            PhaseStatus::Approved,
            PhaseStatus::Completed,
            PhaseStatus::Failed,
        ] {
            for action in TABLE_ACTIONS {
                assert!(transition(current, action).is_err());
            }
        }
    }

    #[test]
    fn revision_loop_is_reentrant() {
        let back = transition(PhaseStatus::UnderReview, PhaseAction::RequestRevision).unwrap();
        assert_eq!(back, PhaseStatus::RevisionNeeded);
        let again = transition(back, PhaseAction::SendToReview).unwrap();
        assert_eq!(again, PhaseStatus::UnderReview);
    }

    #[test]
    fn respond_window_covers_terminals_and_revision_needed() {
        assert!(can_respond_to_revision(PhaseStatus::RevisionNeeded));
        assert!(can_respond_to_revision(PhaseStatus::Approved));
        assert!(can_respond_to_revision(PhaseStatus::Completed));
        assert!(can_respond_to_revision(PhaseStatus::Failed));

        assert!(!can_respond_to_revision(PhaseStatus::NotStarted));
        assert!(!can_respond_to_revision(PhaseStatus::InProgress));
        assert!(!can_respond_to_revision(PhaseStatus::UnderReview));
    }

    #[test]
    fn illegal_transition_message_names_the_current_state() {
        let err = transition(PhaseStatus::Approved, PhaseAction::SendToReview).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Approved"), "{message}");
        assert!(message.contains("send to review"), "{message}");
    }
}
