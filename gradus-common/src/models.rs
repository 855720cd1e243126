//! Domain models shared across Gradus services
//!
//! All records are plain serde structs mirroring the backend's storage
//! schema. Status is never a field on an instance; see [`crate::status`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::status::PhaseStatus;

/// Actor role, passed explicitly into every workflow operation.
///
/// Never inferred from ambient state: the caller names who is acting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
    Admin,
}

impl Role {
    /// Reviewer capability: may send to review, approve, decline, request revisions
    pub fn can_review(&self) -> bool {
        matches!(self, Role::Teacher | Role::Admin)
    }

    /// Submitter capability: may start phases and answer revision requests
    pub fn can_submit(&self) -> bool {
        matches!(self, Role::Student)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Student => write!(f, "student"),
            Role::Teacher => write!(f, "teacher"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

/// An acting user: identity plus capability role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }
}

/// Reference to a file already held by the storage service.
///
/// Upload/download mechanics are owned by the backend; this subsystem only
/// carries the handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub guid: Uuid,
    pub name: String,
}

/// Reusable milestone definition owned by a master project.
///
/// Read-only to this subsystem; teachers configure templates elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseTemplate {
    pub id: Uuid,
    pub master_project_id: Uuid,
    pub name: String,
    pub description: String,
    pub planned_start: Option<NaiveDate>,
    pub planned_end: Option<NaiveDate>,
    /// Ordering within the master project
    pub sequence: u32,
}

/// One student project's live attempt at a phase template.
///
/// Created exactly once per (template, project) pair, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseInstance {
    pub id: Uuid,
    pub template_id: Uuid,
    pub project_id: Uuid,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Identifies a phase instance by its owning (template, project) pair.
///
/// The pair is unique by construction, so it addresses at most one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhaseKey {
    pub template_id: Uuid,
    pub project_id: Uuid,
}

impl PhaseKey {
    pub fn new(template_id: Uuid, project_id: Uuid) -> Self {
        Self {
            template_id,
            project_id,
        }
    }
}

/// Append-only status log entry for a phase instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusRecord {
    pub id: Uuid,
    pub instance_id: Uuid,
    pub status: PhaseStatus,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// One teacher feedback cycle, answerable at most once by the student
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionRequest {
    pub id: Uuid,
    pub instance_id: Uuid,
    /// Teacher who opened the cycle
    pub created_by: Uuid,
    pub feedback: String,
    /// Optional file the teacher attached to illustrate the feedback
    pub reference_file: Option<FileRef>,
    /// Student's answer; append-once, `None` until answered
    pub revised_file: Option<FileRef>,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

impl RevisionRequest {
    /// A request is answered the moment its revised file is set
    pub fn is_answered(&self) -> bool {
        self.revised_file.is_some()
    }
}

/// Append-only discussion message on a phase instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discussion {
    pub id: Uuid,
    pub instance_id: Uuid,
    pub author: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Append-only general file submission on a phase instance.
///
/// Distinct from revision files, which are scoped to one feedback cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Uuid,
    pub instance_id: Uuid,
    pub uploaded_by: Uuid,
    pub file: FileRef,
    pub created_at: DateTime<Utc>,
}

/// Task priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

/// Project task, independent of phases.
///
/// Tasks feed the analytics engine only; they take no part in the phase
/// state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub project_id: Uuid,
    pub assignees: Vec<Uuid>,
    pub priority: TaskPriority,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub done: bool,
}
