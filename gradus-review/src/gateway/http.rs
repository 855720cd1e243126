//! HTTP implementation of the backend gateway
//!
//! All operations go through a single dispatch endpoint. The request body
//! is an [`OpRequest`] envelope; the response an [`OpResponse`]. Transport
//! and HTTP-level failures map to `ExternalUnavailable`, envelope-level
//! rejections map to typed errors by their machine code.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use gradus_common::config::BackendSettings;
use gradus_common::models::{
    Attachment, Discussion, FileRef, PhaseKey, RevisionRequest, Task,
};

use crate::error::{ReviewError, Result};
use crate::gateway::{OpRequest, OpResponse, OpStatus, PhaseDetail, ReviewBackend};

const DISPATCH_PATH: &str = "/api/dispatch";
const USER_AGENT: &str = concat!("gradus/", env!("CARGO_PKG_VERSION"));

/// Backend gateway over HTTP
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
}

/// Dispatch-level failure, mapped per operation into `ReviewError`
#[derive(Debug)]
enum DispatchError {
    Transport(String),
    Http(u16),
    Envelope {
        code: Option<String>,
        message: String,
    },
    Decode(String),
}

impl DispatchError {
    /// Default mapping; operations with their own code handling (e.g.
    /// `answer_revision`) intercept before calling this.
    fn into_review(self, op: &'static str) -> ReviewError {
        match self {
            DispatchError::Transport(message) => ReviewError::ExternalUnavailable(message),
            DispatchError::Http(status) => ReviewError::ExternalUnavailable(format!(
                "backend returned HTTP {} for {}",
                status, op
            )),
            DispatchError::Decode(message) => ReviewError::Decode(message),
            DispatchError::Envelope { code, message } => match code.as_deref() {
                Some("not_found") => ReviewError::NotFound(message),
                _ => ReviewError::Backend { op, message },
            },
        }
    }
}

impl HttpBackend {
    /// Build a gateway from resolved settings
    pub fn new(settings: &BackendSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| ReviewError::ExternalUnavailable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_token: settings.api_token.clone(),
        })
    }

    /// Run one operation-tagged exchange, returning the `data` field
    /// (`None` when absent or null).
    async fn dispatch<T: Serialize>(
        &self,
        op: &'static str,
        payload: T,
    ) -> std::result::Result<Option<Value>, DispatchError> {
        let url = format!("{}{}", self.base_url, DISPATCH_PATH);
        tracing::debug!(op, url = %url, "dispatching backend operation");

        let mut request = self.client.post(&url).json(&OpRequest { op, payload });
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DispatchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DispatchError::Http(status.as_u16()));
        }

        let envelope: OpResponse = response
            .json()
            .await
            .map_err(|e| DispatchError::Decode(e.to_string()))?;

        match envelope.status {
            OpStatus::Success => Ok(envelope.data.filter(|v| !v.is_null())),
            OpStatus::Error => Err(DispatchError::Envelope {
                code: envelope.code,
                message: envelope
                    .message
                    .unwrap_or_else(|| "backend reported an error without a message".to_string()),
            }),
        }
    }
}

/// Decode the `data` field of a successful exchange
fn decode_data<D: DeserializeOwned>(op: &'static str, data: Option<Value>) -> Result<D> {
    let value = data.ok_or_else(|| {
        ReviewError::Decode(format!("{} succeeded but returned no data", op))
    })?;
    serde_json::from_value(value).map_err(|e| ReviewError::Decode(format!("{}: {}", op, e)))
}

#[derive(Debug, Deserialize)]
struct CreatedId {
    id: Uuid,
}

#[derive(Serialize)]
struct StartPhasePayload {
    template_id: Uuid,
    project_id: Uuid,
    actor_id: Uuid,
}

#[derive(Serialize)]
struct PhaseKeyPayload {
    template_id: Uuid,
    project_id: Uuid,
}

#[derive(Serialize)]
struct InstanceActorPayload {
    instance_id: Uuid,
    actor_id: Uuid,
}

#[derive(Serialize)]
struct ApprovePayload {
    instance_id: Uuid,
    actor_id: Uuid,
    approve: bool,
}

#[derive(Serialize)]
struct CreateRevisionPayload<'a> {
    instance_id: Uuid,
    actor_id: Uuid,
    feedback: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reference_file: Option<&'a FileRef>,
}

#[derive(Serialize)]
struct AnswerRevisionPayload<'a> {
    request_id: Uuid,
    file: &'a FileRef,
}

#[derive(Serialize)]
struct DiscussionPayload<'a> {
    instance_id: Uuid,
    actor_id: Uuid,
    text: &'a str,
}

#[derive(Serialize)]
struct AttachmentPayload<'a> {
    instance_id: Uuid,
    actor_id: Uuid,
    file: &'a FileRef,
}

#[derive(Serialize)]
struct InstancePayload {
    instance_id: Uuid,
}

#[derive(Serialize)]
struct ProjectPayload {
    project_id: Uuid,
}

#[async_trait]
impl ReviewBackend for HttpBackend {
    async fn start_phase_instance(&self, key: PhaseKey, actor_id: Uuid) -> Result<Uuid> {
        const OP: &str = "start_phase_instance";
        let data = self
            .dispatch(
                OP,
                StartPhasePayload {
                    template_id: key.template_id,
                    project_id: key.project_id,
                    actor_id,
                },
            )
            .await
            .map_err(|e| e.into_review(OP))?;
        let created: CreatedId = decode_data(OP, data)?;
        tracing::info!(instance_id = %created.id, "phase instance created");
        Ok(created.id)
    }

    async fn fetch_phase_detail(&self, key: PhaseKey) -> Result<Option<PhaseDetail>> {
        const OP: &str = "fetch_phase_detail";
        let data = self
            .dispatch(
                OP,
                PhaseKeyPayload {
                    template_id: key.template_id,
                    project_id: key.project_id,
                },
            )
            .await
            .map_err(|e| e.into_review(OP))?;
        match data {
            None => Ok(None),
            Some(value) => Ok(Some(decode_data(OP, Some(value))?)),
        }
    }

    async fn send_to_review(&self, instance_id: Uuid, actor_id: Uuid) -> Result<()> {
        const OP: &str = "send_to_review";
        self.dispatch(
            OP,
            InstanceActorPayload {
                instance_id,
                actor_id,
            },
        )
        .await
        .map_err(|e| e.into_review(OP))?;
        Ok(())
    }

    async fn approve_phase(&self, instance_id: Uuid, actor_id: Uuid, approve: bool) -> Result<()> {
        const OP: &str = "approve_phase";
        self.dispatch(
            OP,
            ApprovePayload {
                instance_id,
                actor_id,
                approve,
            },
        )
        .await
        .map_err(|e| e.into_review(OP))?;
        Ok(())
    }

    async fn create_revision_request(
        &self,
        instance_id: Uuid,
        actor_id: Uuid,
        feedback: &str,
        reference_file: Option<&FileRef>,
    ) -> Result<Uuid> {
        const OP: &str = "create_revision_request";
        let data = self
            .dispatch(
                OP,
                CreateRevisionPayload {
                    instance_id,
                    actor_id,
                    feedback,
                    reference_file,
                },
            )
            .await
            .map_err(|e| e.into_review(OP))?;
        let created: CreatedId = decode_data(OP, data)?;
        Ok(created.id)
    }

    async fn append_revision_status(&self, instance_id: Uuid, actor_id: Uuid) -> Result<()> {
        const OP: &str = "append_revision_status";
        self.dispatch(
            OP,
            InstanceActorPayload {
                instance_id,
                actor_id,
            },
        )
        .await
        .map_err(|e| e.into_review(OP))?;
        Ok(())
    }

    async fn answer_revision(&self, request_id: Uuid, file: &FileRef) -> Result<()> {
        const OP: &str = "answer_revision";
        self.dispatch(OP, AnswerRevisionPayload { request_id, file })
            .await
            .map_err(|e| match e {
                DispatchError::Envelope {
                    code: Some(ref code),
                    ..
                } if code == "already_answered" => ReviewError::AlreadyAnswered { request_id },
                other => other.into_review(OP),
            })?;
        Ok(())
    }

    async fn post_discussion(
        &self,
        instance_id: Uuid,
        actor_id: Uuid,
        text: &str,
    ) -> Result<Discussion> {
        const OP: &str = "post_discussion";
        let data = self
            .dispatch(
                OP,
                DiscussionPayload {
                    instance_id,
                    actor_id,
                    text,
                },
            )
            .await
            .map_err(|e| e.into_review(OP))?;
        decode_data(OP, data)
    }

    async fn upload_attachment(
        &self,
        instance_id: Uuid,
        actor_id: Uuid,
        file: &FileRef,
    ) -> Result<Attachment> {
        const OP: &str = "upload_attachment";
        let data = self
            .dispatch(
                OP,
                AttachmentPayload {
                    instance_id,
                    actor_id,
                    file,
                },
            )
            .await
            .map_err(|e| e.into_review(OP))?;
        decode_data(OP, data)
    }

    async fn list_revisions(&self, instance_id: Uuid) -> Result<Vec<RevisionRequest>> {
        const OP: &str = "list_revisions";
        let data = self
            .dispatch(OP, InstancePayload { instance_id })
            .await
            .map_err(|e| e.into_review(OP))?;
        // An instance with no revisions may come back with no data at all
        match data {
            None => Ok(Vec::new()),
            Some(value) => decode_data(OP, Some(value)),
        }
    }

    async fn fetch_tasks(&self, project_id: Uuid) -> Result<Vec<Task>> {
        const OP: &str = "fetch_tasks";
        let data = self
            .dispatch(OP, ProjectPayload { project_id })
            .await
            .map_err(|e| e.into_review(OP))?;
        match data {
            None => Ok(Vec::new()),
            Some(value) => decode_data(OP, Some(value)),
        }
    }
}
