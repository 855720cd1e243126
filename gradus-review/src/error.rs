//! Error types for the review workflow

use gradus_common::models::Role;
use gradus_common::PhaseStatus;
use thiserror::Error;
use uuid::Uuid;

use crate::state_machine::PhaseAction;

/// Result type for review operations
pub type Result<T> = std::result::Result<T, ReviewError>;

/// Review workflow errors.
///
/// Every rejected transition names the state the instance is actually in,
/// not just that the action failed. `ExternalUnavailable` is the only
/// nondeterministic variant; all others are pure outcomes of the inputs.
#[derive(Debug, Error)]
pub enum ReviewError {
    /// The requested action is not legal from the current status
    #[error("cannot {action} while the phase is {current}")]
    IllegalTransition {
        current: PhaseStatus,
        action: PhaseAction,
    },

    /// The acting role does not carry the required capability
    #[error("a {role} may not {action}")]
    Forbidden { action: PhaseAction, role: Role },

    /// Review-cycle policy guard rejected the action
    #[error("review policy: {0}")]
    ReviewPolicy(String),

    /// The revision request was already answered; the first file stands
    #[error("revision request {request_id} is already answered")]
    AlreadyAnswered { request_id: Uuid },

    /// Referenced entity is unknown
    #[error("not found: {0}")]
    NotFound(String),

    /// The revision request was recorded but the status append failed.
    ///
    /// Retry with `complete_revision` using the returned request id; do not
    /// re-issue the request, that would duplicate the feedback cycle.
    #[error("revision request {request_id} was recorded but the status append failed: {reason}")]
    PartialCommit { request_id: Uuid, reason: String },

    /// Backend reported an error this subsystem has no mapping for
    #[error("backend rejected {op}: {message}")]
    Backend { op: &'static str, message: String },

    /// Network or backend failure; no local state changed, caller may retry
    #[error("backend unavailable: {0}")]
    ExternalUnavailable(String),

    /// Backend response could not be decoded
    #[error("decode error: {0}")]
    Decode(String),
}
