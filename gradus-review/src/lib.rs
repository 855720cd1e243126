//! # Gradus Review
//!
//! Phase review workflow and progress analytics for student projects:
//! - Phase state machine (submit/review/revise lifecycle)
//! - Revision subsystem (teacher feedback cycles, answer-once semantics)
//! - Progress & risk analytics engine (pure, recomputed on demand)
//! - Gateway to the persistence/notification backend
//!
//! All writes go through the single [`gateway::ReviewBackend`] collaborator;
//! this crate owns transition legality and derived metrics, never storage.

pub mod analytics;
pub mod error;
pub mod gateway;
pub mod service;
pub mod state_machine;

pub use error::{ReviewError, Result};
pub use service::{PhaseView, ReviewService};
pub use state_machine::{transition, PhaseAction};
