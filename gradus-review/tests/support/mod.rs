//! Shared test support: an in-memory backend implementing the gateway
//! trait, plus fixture helpers.
//!
//! The fake honors the storage-layer guards the real backend provides:
//! conditional single write of a revised file and append-only logs. It
//! also exposes failure-injection switches for outage and saga tests.

// Each test binary compiles its own copy; not every binary uses every helper.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use gradus_common::events::EventBus;
use gradus_common::models::{
    Actor, Attachment, Discussion, FileRef, PhaseInstance, PhaseKey, PhaseTemplate,
    RevisionRequest, Role, StatusRecord, Task, TaskPriority,
};
use gradus_common::PhaseStatus;
use gradus_review::gateway::{PhaseDetail, ReviewBackend};
use gradus_review::{ReviewError, ReviewService};

pub fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn student() -> Actor {
    Actor::new(Uuid::new_v4(), Role::Student)
}

pub fn teacher() -> Actor {
    Actor::new(Uuid::new_v4(), Role::Teacher)
}

pub fn file(name: &str) -> FileRef {
    FileRef {
        guid: Uuid::new_v4(),
        name: name.to_string(),
    }
}

/// Phase templates for a master project, in sequence order
pub fn templates(master_project_id: Uuid, names: &[&str]) -> Vec<PhaseTemplate> {
    names
        .iter()
        .enumerate()
        .map(|(i, name)| PhaseTemplate {
            id: Uuid::new_v4(),
            master_project_id,
            name: name.to_string(),
            description: format!("{name} deliverables"),
            planned_start: None,
            planned_end: None,
            sequence: i as u32,
        })
        .collect()
}

#[derive(Default)]
struct Store {
    instances: HashMap<Uuid, PhaseInstance>,
    by_key: HashMap<(Uuid, Uuid), Uuid>,
    history: HashMap<Uuid, Vec<StatusRecord>>,
    revisions: HashMap<Uuid, Vec<RevisionRequest>>,
    discussions: HashMap<Uuid, Vec<Discussion>>,
    attachments: HashMap<Uuid, Vec<Attachment>>,
    tasks: HashMap<Uuid, Vec<Task>>,
    seq: i64,
}

impl Store {
    /// Strictly increasing timestamps so record ordering is deterministic
    fn tick(&mut self, base: DateTime<Utc>) -> DateTime<Utc> {
        self.seq += 1;
        base + Duration::seconds(self.seq)
    }
}

pub struct InMemoryBackend {
    base_time: DateTime<Utc>,
    state: Mutex<Store>,
    /// Fail the next `append_revision_status` call (saga step two)
    pub fail_append_revision: AtomicBool,
    /// Simulate a full outage on every operation
    pub fail_all: AtomicBool,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            base_time: Utc::now(),
            state: Mutex::new(Store::default()),
            fail_append_revision: AtomicBool::new(false),
            fail_all: AtomicBool::new(false),
        }
    }

    fn check_outage(&self) -> Result<(), ReviewError> {
        if self.fail_all.load(Ordering::SeqCst) {
            Err(ReviewError::ExternalUnavailable(
                "injected outage".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    pub fn seed_tasks(&self, project_id: Uuid, done: usize, open: usize) {
        let mut store = self.state.lock().unwrap();
        let tasks = store.tasks.entry(project_id).or_default();
        for i in 0..done + open {
            tasks.push(Task {
                id: Uuid::new_v4(),
                project_id,
                assignees: vec![],
                priority: TaskPriority::Medium,
                start_date: None,
                end_date: None,
                done: i < done,
            });
        }
    }

    /// Number of revision requests stored for an instance
    pub fn revision_count(&self, instance_id: Uuid) -> usize {
        let store = self.state.lock().unwrap();
        store
            .revisions
            .get(&instance_id)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl ReviewBackend for InMemoryBackend {
    async fn start_phase_instance(
        &self,
        key: PhaseKey,
        actor_id: Uuid,
    ) -> Result<Uuid, ReviewError> {
        self.check_outage()?;
        let mut store = self.state.lock().unwrap();
        let map_key = (key.template_id, key.project_id);
        if store.by_key.contains_key(&map_key) {
            // Unique (template, project) constraint at the storage layer.
            return Err(ReviewError::Backend {
                op: "start_phase_instance",
                message: "phase instance already exists".to_string(),
            });
        }

        let instance_id = Uuid::new_v4();
        let created_at = store.tick(self.base_time);
        store.instances.insert(
            instance_id,
            PhaseInstance {
                id: instance_id,
                template_id: key.template_id,
                project_id: key.project_id,
                created_by: actor_id,
                created_at,
            },
        );
        store.by_key.insert(map_key, instance_id);

        let record_at = store.tick(self.base_time);
        store.history.entry(instance_id).or_default().push(StatusRecord {
            id: Uuid::new_v4(),
            instance_id,
            status: PhaseStatus::InProgress,
            created_by: actor_id,
            created_at: record_at,
        });
        Ok(instance_id)
    }

    async fn fetch_phase_detail(&self, key: PhaseKey) -> Result<Option<PhaseDetail>, ReviewError> {
        self.check_outage()?;
        let store = self.state.lock().unwrap();
        let Some(instance_id) = store.by_key.get(&(key.template_id, key.project_id)) else {
            return Ok(None);
        };
        let instance = store.instances[instance_id].clone();
        Ok(Some(PhaseDetail {
            history: store.history.get(instance_id).cloned().unwrap_or_default(),
            discussions: store
                .discussions
                .get(instance_id)
                .cloned()
                .unwrap_or_default(),
            attachments: store
                .attachments
                .get(instance_id)
                .cloned()
                .unwrap_or_default(),
            instance,
        }))
    }

    async fn send_to_review(&self, instance_id: Uuid, actor_id: Uuid) -> Result<(), ReviewError> {
        self.check_outage()?;
        let mut store = self.state.lock().unwrap();
        let created_at = store.tick(self.base_time);
        store.history.entry(instance_id).or_default().push(StatusRecord {
            id: Uuid::new_v4(),
            instance_id,
            status: PhaseStatus::UnderReview,
            created_by: actor_id,
            created_at,
        });
        Ok(())
    }

    async fn approve_phase(
        &self,
        instance_id: Uuid,
        actor_id: Uuid,
        approve: bool,
    ) -> Result<(), ReviewError> {
        self.check_outage()?;
        let mut store = self.state.lock().unwrap();
        let status = if approve {
            PhaseStatus::Approved
        } else {
            PhaseStatus::Failed
        };
        let created_at = store.tick(self.base_time);
        store.history.entry(instance_id).or_default().push(StatusRecord {
            id: Uuid::new_v4(),
            instance_id,
            status,
            created_by: actor_id,
            created_at,
        });
        Ok(())
    }

    async fn create_revision_request(
        &self,
        instance_id: Uuid,
        actor_id: Uuid,
        feedback: &str,
        reference_file: Option<&FileRef>,
    ) -> Result<Uuid, ReviewError> {
        self.check_outage()?;
        let mut store = self.state.lock().unwrap();
        let request_id = Uuid::new_v4();
        let created_at = store.tick(self.base_time);
        store.revisions.entry(instance_id).or_default().push(RevisionRequest {
            id: request_id,
            instance_id,
            created_by: actor_id,
            feedback: feedback.to_string(),
            reference_file: reference_file.cloned(),
            revised_file: None,
            created_at,
            responded_at: None,
        });
        Ok(request_id)
    }

    async fn append_revision_status(
        &self,
        instance_id: Uuid,
        actor_id: Uuid,
    ) -> Result<(), ReviewError> {
        self.check_outage()?;
        if self.fail_append_revision.swap(false, Ordering::SeqCst) {
            return Err(ReviewError::ExternalUnavailable(
                "injected failure after revision request creation".to_string(),
            ));
        }
        let mut store = self.state.lock().unwrap();
        let created_at = store.tick(self.base_time);
        store.history.entry(instance_id).or_default().push(StatusRecord {
            id: Uuid::new_v4(),
            instance_id,
            status: PhaseStatus::RevisionNeeded,
            created_by: actor_id,
            created_at,
        });
        Ok(())
    }

    async fn answer_revision(&self, request_id: Uuid, file: &FileRef) -> Result<(), ReviewError> {
        self.check_outage()?;
        let mut store = self.state.lock().unwrap();
        let base = self.base_time;
        let responded_at = store.tick(base);
        let request = store
            .revisions
            .values_mut()
            .flat_map(|list| list.iter_mut())
            .find(|r| r.id == request_id)
            .ok_or_else(|| ReviewError::NotFound(format!("revision request {request_id}")))?;
        // Conditional update: the first write wins, ever after rejected.
        if request.revised_file.is_some() {
            return Err(ReviewError::AlreadyAnswered { request_id });
        }
        request.revised_file = Some(file.clone());
        request.responded_at = Some(responded_at);
        Ok(())
    }

    async fn post_discussion(
        &self,
        instance_id: Uuid,
        actor_id: Uuid,
        text: &str,
    ) -> Result<Discussion, ReviewError> {
        self.check_outage()?;
        let mut store = self.state.lock().unwrap();
        let created_at = store.tick(self.base_time);
        let record = Discussion {
            id: Uuid::new_v4(),
            instance_id,
            author: actor_id,
            text: text.to_string(),
            created_at,
        };
        store
            .discussions
            .entry(instance_id)
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    async fn upload_attachment(
        &self,
        instance_id: Uuid,
        actor_id: Uuid,
        file: &FileRef,
    ) -> Result<Attachment, ReviewError> {
        self.check_outage()?;
        let mut store = self.state.lock().unwrap();
        let created_at = store.tick(self.base_time);
        let record = Attachment {
            id: Uuid::new_v4(),
            instance_id,
            uploaded_by: actor_id,
            file: file.clone(),
            created_at,
        };
        store
            .attachments
            .entry(instance_id)
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    async fn list_revisions(&self, instance_id: Uuid) -> Result<Vec<RevisionRequest>, ReviewError> {
        self.check_outage()?;
        let store = self.state.lock().unwrap();
        Ok(store.revisions.get(&instance_id).cloned().unwrap_or_default())
    }

    async fn fetch_tasks(&self, project_id: Uuid) -> Result<Vec<Task>, ReviewError> {
        self.check_outage()?;
        let store = self.state.lock().unwrap();
        Ok(store.tasks.get(&project_id).cloned().unwrap_or_default())
    }
}

/// Service over a fresh in-memory backend, plus the bus it emits on
pub fn service() -> (ReviewService<InMemoryBackend>, EventBus) {
    init_tracing();
    let bus = EventBus::new(64);
    (ReviewService::new(InMemoryBackend::new(), bus.clone()), bus)
}
