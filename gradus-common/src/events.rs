//! Event types for the Gradus event system
//!
//! Provides shared event definitions and EventBus for Gradus services.
//! Events are broadcast after a backend write has committed; they are a
//! notification surface, not a source of truth.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::status::PhaseStatus;

/// Gradus event types
///
/// All services share this central enum for type safety and exhaustive
/// matching. Events can be serialized for SSE transmission by the
/// dashboard shell.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GradusEvent {
    /// A student opened a phase for the first time
    PhaseStarted {
        instance_id: Uuid,
        template_id: Uuid,
        project_id: Uuid,
        /// Student who started the phase
        actor_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// A status record was appended to a phase instance
    PhaseStatusChanged {
        instance_id: Uuid,
        old_status: PhaseStatus,
        new_status: PhaseStatus,
        actor_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// A teacher opened a new revision cycle
    RevisionRequested {
        instance_id: Uuid,
        request_id: Uuid,
        teacher_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// A student answered a revision request
    RevisionAnswered {
        instance_id: Uuid,
        request_id: Uuid,
        student_id: Uuid,
        file_name: String,
        timestamp: DateTime<Utc>,
    },

    /// A discussion message was posted on a phase instance
    DiscussionPosted {
        instance_id: Uuid,
        author_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// A general file was attached to a phase instance
    AttachmentUploaded {
        instance_id: Uuid,
        uploader_id: Uuid,
        file_name: String,
        timestamp: DateTime<Utc>,
    },
}

/// Central event distribution bus
///
/// Wraps `tokio::broadcast`, providing non-blocking publish, multiple
/// concurrent subscribers, and automatic cleanup when subscribers drop.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<GradusEvent>,
}

impl EventBus {
    /// Create a new EventBus with the given channel capacity.
    ///
    /// Old events are dropped once the buffer is full; slow subscribers
    /// observe a lag error rather than blocking producers.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events.
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<GradusEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers.
    ///
    /// Returns `Ok(subscriber_count)` when at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: GradusEvent,
    ) -> Result<usize, broadcast::error::SendError<GradusEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring the case where no subscriber is listening.
    ///
    /// Notification delivery is best-effort; a committed transition is
    /// valid whether or not anyone was watching.
    pub fn emit_lossy(&self, event: GradusEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("event emitted with no subscribers");
        }
    }
}
