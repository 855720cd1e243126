//! Gateway to the persistence/notification backend
//!
//! The backend is one external collaborator reached through
//! operation-tagged request/response exchanges: each request carries an
//! operation discriminator plus a JSON payload, each response a
//! success/error status, an optional machine code, and a message.
//!
//! [`ReviewBackend`] is the seam the review service is written against;
//! [`http::HttpBackend`] is the production implementation, tests supply an
//! in-memory one.

pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use gradus_common::models::{
    Attachment, Discussion, FileRef, PhaseInstance, PhaseKey, RevisionRequest, StatusRecord, Task,
};
use gradus_common::{current_status, PhaseStatus};

use crate::error::Result;

/// Wire envelope for one operation-tagged exchange
#[derive(Debug, Serialize)]
pub struct OpRequest<T: Serialize> {
    /// Operation discriminator, e.g. `"send_to_review"`
    pub op: &'static str,
    pub payload: T,
}

/// Exchange outcome as reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpStatus {
    Success,
    Error,
}

/// Wire envelope for a backend response
#[derive(Debug, Deserialize)]
pub struct OpResponse {
    pub status: OpStatus,
    /// Machine-readable rejection code, e.g. `"not_found"`
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

/// Detail aggregate for one phase instance as stored by the backend.
///
/// `history` is the append-only status log in append order; the current
/// status is always derived from it, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseDetail {
    pub instance: PhaseInstance,
    pub history: Vec<StatusRecord>,
    pub discussions: Vec<Discussion>,
    pub attachments: Vec<Attachment>,
}

impl PhaseDetail {
    /// Current status of the instance, derived from the status history
    pub fn current_status(&self) -> PhaseStatus {
        current_status(&self.history)
    }
}

/// Operations the backend implements for this subsystem.
///
/// The backend owns persistence and the storage-level guards (conditional
/// single write of a revised file, serialized review-cycle outcome per
/// instance); this crate owns the call contract and transition legality.
/// A failed call leaves no local state behind.
#[async_trait]
pub trait ReviewBackend: Send + Sync {
    /// Create the phase instance and its initial `InProgress` record.
    ///
    /// Not idempotent: callers must check for an existing instance first.
    async fn start_phase_instance(&self, key: PhaseKey, actor_id: Uuid) -> Result<Uuid>;

    /// Fetch the detail aggregate, `None` when no instance exists for the
    /// (template, project) pair.
    async fn fetch_phase_detail(&self, key: PhaseKey) -> Result<Option<PhaseDetail>>;

    /// Append an `UnderReview` status record
    async fn send_to_review(&self, instance_id: Uuid, actor_id: Uuid) -> Result<()>;

    /// Append the terminal review outcome: `Approved` when `approve` is
    /// true, `Failed` otherwise.
    async fn approve_phase(&self, instance_id: Uuid, actor_id: Uuid, approve: bool) -> Result<()>;

    /// Record a new revision request (step one of the revision saga)
    async fn create_revision_request(
        &self,
        instance_id: Uuid,
        actor_id: Uuid,
        feedback: &str,
        reference_file: Option<&FileRef>,
    ) -> Result<Uuid>;

    /// Append the `RevisionNeeded` status record (step two of the saga)
    async fn append_revision_status(&self, instance_id: Uuid, actor_id: Uuid) -> Result<()>;

    /// Set the revised file on a request. Exactly-once: the backend guards
    /// against a second write and reports `already_answered`.
    async fn answer_revision(&self, request_id: Uuid, file: &FileRef) -> Result<()>;

    /// Append a discussion message, returning the stored record
    async fn post_discussion(
        &self,
        instance_id: Uuid,
        actor_id: Uuid,
        text: &str,
    ) -> Result<Discussion>;

    /// Append a general file submission, returning the stored record
    async fn upload_attachment(
        &self,
        instance_id: Uuid,
        actor_id: Uuid,
        file: &FileRef,
    ) -> Result<Attachment>;

    /// Revision requests for an instance, in creation order
    async fn list_revisions(&self, instance_id: Uuid) -> Result<Vec<RevisionRequest>>;

    /// Tasks of a project, for the analytics engine
    async fn fetch_tasks(&self, project_id: Uuid) -> Result<Vec<Task>>;
}
