//! Review workflow orchestration
//!
//! [`ReviewService`] validates every action locally (capability, current
//! status, review policy) before dispatching the corresponding backend
//! operation, then broadcasts an event once the write has committed. A
//! failed backend call leaves nothing applied locally.

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use gradus_common::events::{EventBus, GradusEvent};
use gradus_common::models::{
    Actor, Attachment, Discussion, FileRef, PhaseInstance, PhaseKey, PhaseTemplate,
    RevisionRequest, StatusRecord,
};
use gradus_common::PhaseStatus;

use crate::analytics::{self, ProjectProgress};
use crate::error::{ReviewError, Result};
use crate::gateway::{PhaseDetail, ReviewBackend};
use crate::state_machine::{can_respond_to_revision, transition, PhaseAction};

/// Detail view of one phase instance with its derived current status
#[derive(Debug, Clone, serde::Serialize)]
pub struct PhaseView {
    pub instance: PhaseInstance,
    pub current_status: PhaseStatus,
    pub history: Vec<StatusRecord>,
    pub discussions: Vec<Discussion>,
    pub attachments: Vec<Attachment>,
}

impl From<PhaseDetail> for PhaseView {
    fn from(detail: PhaseDetail) -> Self {
        let current_status = detail.current_status();
        Self {
            instance: detail.instance,
            current_status,
            history: detail.history,
            discussions: detail.discussions,
            attachments: detail.attachments,
        }
    }
}

/// Phase review workflow service
pub struct ReviewService<B: ReviewBackend> {
    backend: B,
    bus: EventBus,
}

impl<B: ReviewBackend> ReviewService<B> {
    pub fn new(backend: B, bus: EventBus) -> Self {
        Self { backend, bus }
    }

    /// Backend access for read paths that need no workflow mediation
    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn require_submitter(&self, actor: &Actor, action: PhaseAction) -> Result<()> {
        if actor.role.can_submit() {
            Ok(())
        } else {
            Err(ReviewError::Forbidden {
                action,
                role: actor.role,
            })
        }
    }

    fn require_reviewer(&self, actor: &Actor, action: PhaseAction) -> Result<()> {
        if actor.role.can_review() {
            Ok(())
        } else {
            Err(ReviewError::Forbidden {
                action,
                role: actor.role,
            })
        }
    }

    async fn require_detail(&self, key: PhaseKey) -> Result<PhaseDetail> {
        self.backend.fetch_phase_detail(key).await?.ok_or_else(|| {
            ReviewError::NotFound(format!(
                "no phase instance for template {} in project {}",
                key.template_id, key.project_id
            ))
        })
    }

    fn emit_status_change(
        &self,
        instance_id: Uuid,
        old_status: PhaseStatus,
        new_status: PhaseStatus,
        actor_id: Uuid,
    ) {
        info!(%instance_id, %old_status, %new_status, "phase status changed");
        self.bus.emit_lossy(GradusEvent::PhaseStatusChanged {
            instance_id,
            old_status,
            new_status,
            actor_id,
            timestamp: Utc::now(),
        });
    }

    /// Fetch the detail view for a phase, `None` when the student has not
    /// started it yet.
    pub async fn phase_detail(&self, key: PhaseKey) -> Result<Option<PhaseView>> {
        Ok(self
            .backend
            .fetch_phase_detail(key)
            .await?
            .map(PhaseView::from))
    }

    /// Student opens a phase for the first time.
    ///
    /// Creation is not idempotent on the backend, so an existing instance
    /// is rejected up front with the state it is actually in.
    pub async fn start_phase(&self, key: PhaseKey, actor: &Actor) -> Result<Uuid> {
        self.require_submitter(actor, PhaseAction::Start)?;

        if let Some(existing) = self.backend.fetch_phase_detail(key).await? {
            return Err(ReviewError::IllegalTransition {
                current: existing.current_status(),
                action: PhaseAction::Start,
            });
        }
        let new_status = transition(PhaseStatus::NotStarted, PhaseAction::Start)?;

        let instance_id = self.backend.start_phase_instance(key, actor.id).await?;
        self.bus.emit_lossy(GradusEvent::PhaseStarted {
            instance_id,
            template_id: key.template_id,
            project_id: key.project_id,
            actor_id: actor.id,
            timestamp: Utc::now(),
        });
        self.emit_status_change(instance_id, PhaseStatus::NotStarted, new_status, actor.id);
        Ok(instance_id)
    }

    /// Teacher moves the phase in front of the review panel.
    ///
    /// Legal from `InProgress` and from `RevisionNeeded` (re-review after
    /// a revision cycle).
    pub async fn send_to_review(&self, key: PhaseKey, actor: &Actor) -> Result<()> {
        self.require_reviewer(actor, PhaseAction::SendToReview)?;

        let detail = self.require_detail(key).await?;
        let current = detail.current_status();
        let next = transition(current, PhaseAction::SendToReview)?;

        self.backend
            .send_to_review(detail.instance.id, actor.id)
            .await?;
        self.emit_status_change(detail.instance.id, current, next, actor.id);
        Ok(())
    }

    /// Teacher signs the phase off
    pub async fn approve(&self, key: PhaseKey, actor: &Actor) -> Result<()> {
        self.review_outcome(key, actor, true).await
    }

    /// Teacher declines the phase
    pub async fn decline(&self, key: PhaseKey, actor: &Actor) -> Result<()> {
        self.review_outcome(key, actor, false).await
    }

    async fn review_outcome(&self, key: PhaseKey, actor: &Actor, approve: bool) -> Result<()> {
        let action = if approve {
            PhaseAction::Approve
        } else {
            PhaseAction::Decline
        };
        self.require_reviewer(actor, action)?;

        let detail = self.require_detail(key).await?;
        let current = detail.current_status();
        let next = transition(current, action)?;

        let revisions = self.backend.list_revisions(detail.instance.id).await?;
        self.check_review_cycle(&revisions, action)?;

        self.backend
            .approve_phase(detail.instance.id, actor.id, approve)
            .await?;
        self.emit_status_change(detail.instance.id, current, next, actor.id);
        Ok(())
    }

    /// Review-cycle policy: a terminal outcome requires at least one
    /// completed feedback cycle, and a repeated request requires the
    /// previous one to be answered.
    fn check_review_cycle(&self, revisions: &[RevisionRequest], action: PhaseAction) -> Result<()> {
        match revisions.last() {
            None if action == PhaseAction::RequestRevision => Ok(()),
            None => Err(ReviewError::ReviewPolicy(format!(
                "cannot {} before at least one revision cycle has been recorded",
                action
            ))),
            Some(latest) if !latest.is_answered() => Err(ReviewError::ReviewPolicy(format!(
                "cannot {} while revision request {} is still awaiting the student's response",
                action, latest.id
            ))),
            Some(_) => Ok(()),
        }
    }

    /// Teacher opens a revision cycle: records the feedback, then appends
    /// the `RevisionNeeded` status.
    ///
    /// The two backend writes are a saga, not a transaction. When the
    /// status append fails after the request was recorded, the error is
    /// `PartialCommit` carrying the new request id; retry with
    /// [`Self::complete_revision`] instead of re-issuing the request.
    pub async fn request_revision(
        &self,
        key: PhaseKey,
        feedback: &str,
        reference_file: Option<&FileRef>,
        actor: &Actor,
    ) -> Result<Uuid> {
        self.require_reviewer(actor, PhaseAction::RequestRevision)?;

        let detail = self.require_detail(key).await?;
        let current = detail.current_status();
        let next = transition(current, PhaseAction::RequestRevision)?;

        let revisions = self.backend.list_revisions(detail.instance.id).await?;
        self.check_review_cycle(&revisions, PhaseAction::RequestRevision)?;

        let request_id = self
            .backend
            .create_revision_request(detail.instance.id, actor.id, feedback, reference_file)
            .await?;

        if let Err(e) = self
            .backend
            .append_revision_status(detail.instance.id, actor.id)
            .await
        {
            warn!(
                instance_id = %detail.instance.id,
                %request_id,
                error = %e,
                "revision request recorded but status append failed"
            );
            return Err(ReviewError::PartialCommit {
                request_id,
                reason: e.to_string(),
            });
        }

        self.bus.emit_lossy(GradusEvent::RevisionRequested {
            instance_id: detail.instance.id,
            request_id,
            teacher_id: actor.id,
            timestamp: Utc::now(),
        });
        self.emit_status_change(detail.instance.id, current, next, actor.id);
        Ok(request_id)
    }

    /// Retry step two of a partially committed revision request.
    ///
    /// Verifies the request exists, then appends the `RevisionNeeded`
    /// status without creating anything. Already-completed sagas return
    /// `Ok` so retries are safe.
    pub async fn complete_revision(
        &self,
        key: PhaseKey,
        request_id: Uuid,
        actor: &Actor,
    ) -> Result<()> {
        self.require_reviewer(actor, PhaseAction::RequestRevision)?;

        let detail = self.require_detail(key).await?;
        let revisions = self.backend.list_revisions(detail.instance.id).await?;
        if !revisions.iter().any(|r| r.id == request_id) {
            return Err(ReviewError::NotFound(format!(
                "revision request {} on instance {}",
                request_id, detail.instance.id
            )));
        }

        let current = detail.current_status();
        if current == PhaseStatus::RevisionNeeded {
            // Step two already landed, nothing left to do.
            return Ok(());
        }
        if current != PhaseStatus::UnderReview {
            return Err(ReviewError::IllegalTransition {
                current,
                action: PhaseAction::RequestRevision,
            });
        }

        self.backend
            .append_revision_status(detail.instance.id, actor.id)
            .await?;
        self.emit_status_change(
            detail.instance.id,
            current,
            PhaseStatus::RevisionNeeded,
            actor.id,
        );
        Ok(())
    }

    /// Student answers a revision request with a revised file.
    ///
    /// Permitted while the instance is in `RevisionNeeded` or any terminal
    /// status (late answers preserve the audit trail), and only once per
    /// request.
    pub async fn respond_to_revision(
        &self,
        key: PhaseKey,
        request_id: Uuid,
        file: &FileRef,
        actor: &Actor,
    ) -> Result<()> {
        self.require_submitter(actor, PhaseAction::RespondToRevision)?;

        let detail = self.require_detail(key).await?;
        let current = detail.current_status();
        if !can_respond_to_revision(current) {
            return Err(ReviewError::IllegalTransition {
                current,
                action: PhaseAction::RespondToRevision,
            });
        }

        let revisions = self.backend.list_revisions(detail.instance.id).await?;
        let request = revisions
            .iter()
            .find(|r| r.id == request_id)
            .ok_or_else(|| {
                ReviewError::NotFound(format!(
                    "revision request {} on instance {}",
                    request_id, detail.instance.id
                ))
            })?;
        if request.is_answered() {
            return Err(ReviewError::AlreadyAnswered { request_id });
        }

        // The backend still guards the write; a concurrent answer loses
        // there and surfaces as AlreadyAnswered.
        self.backend.answer_revision(request_id, file).await?;

        self.bus.emit_lossy(GradusEvent::RevisionAnswered {
            instance_id: detail.instance.id,
            request_id,
            student_id: actor.id,
            file_name: file.name.clone(),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Revision history of a phase, in creation order
    pub async fn revisions(&self, key: PhaseKey) -> Result<Vec<RevisionRequest>> {
        let detail = self.require_detail(key).await?;
        self.backend.list_revisions(detail.instance.id).await
    }

    /// Post a discussion message. Unconstrained by phase status; any role.
    pub async fn post_discussion(
        &self,
        key: PhaseKey,
        text: &str,
        actor: &Actor,
    ) -> Result<Discussion> {
        let detail = self.require_detail(key).await?;
        let record = self
            .backend
            .post_discussion(detail.instance.id, actor.id, text)
            .await?;
        self.bus.emit_lossy(GradusEvent::DiscussionPosted {
            instance_id: detail.instance.id,
            author_id: actor.id,
            timestamp: Utc::now(),
        });
        Ok(record)
    }

    /// Attach a general file. Unconstrained by phase status; any role.
    pub async fn upload_attachment(
        &self,
        key: PhaseKey,
        file: &FileRef,
        actor: &Actor,
    ) -> Result<Attachment> {
        let detail = self.require_detail(key).await?;
        let record = self
            .backend
            .upload_attachment(detail.instance.id, actor.id, file)
            .await?;
        self.bus.emit_lossy(GradusEvent::AttachmentUploaded {
            instance_id: detail.instance.id,
            uploader_id: actor.id,
            file_name: file.name.clone(),
            timestamp: Utc::now(),
        });
        Ok(record)
    }

    /// Recompute the derived progress metrics for one project.
    ///
    /// `templates` enumerates the master project's phase definitions;
    /// templates the student never started count as `NotStarted`.
    pub async fn project_progress(
        &self,
        project_id: Uuid,
        templates: &[PhaseTemplate],
    ) -> Result<ProjectProgress> {
        let mut statuses = Vec::with_capacity(templates.len());
        for template in templates {
            let status = self
                .backend
                .fetch_phase_detail(PhaseKey::new(template.id, project_id))
                .await?
                .map(|detail| detail.current_status())
                .unwrap_or(PhaseStatus::NotStarted);
            statuses.push(status);
        }

        let tasks = self.backend.fetch_tasks(project_id).await?;
        Ok(analytics::analyze(&tasks, &statuses))
    }
}
