//! In-memory job/task registry.
//!
//! Holds one [`JobRecord`] per job id for the lifetime of the process. Every
//! pipeline stage reports through [`TaskRegistry::update`]; pollers read
//! through [`TaskRegistry::status`], which never fails.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use serde_json::Value as JsonValue;
use tokio::sync::broadcast;
use tracing::{debug, trace};
use uuid::Uuid;

use scribe_core::{defaults, JobRecord, JobStatus, JobStatusResponse};

/// Event emitted whenever a job record changes.
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    /// A job was registered.
    Created { job_id: String },
    /// A job reported progress.
    Progress {
        job_id: String,
        status: JobStatus,
        progress: i32,
        message: String,
    },
    /// A job finished successfully.
    Completed { job_id: String },
    /// A job failed.
    Failed { job_id: String, error: String },
}

/// A partial change to a job record. Unset fields keep their previous value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub message: Option<String>,
    pub progress: Option<i32>,
    pub repository_id: Option<Uuid>,
    pub result: Option<JsonValue>,
    pub error: Option<String>,
}

impl JobUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// An in-progress step.
    pub fn started(message: impl Into<String>) -> Self {
        Self::new()
            .status(JobStatus::Started)
            .message(message)
    }

    /// Terminal success with its result payload.
    pub fn success(message: impl Into<String>, result: JsonValue) -> Self {
        Self::new()
            .status(JobStatus::Success)
            .message(message)
            .progress(100)
            .result(result)
    }

    /// Terminal failure with the error text.
    pub fn failure(message: impl Into<String>, error: impl Into<String>) -> Self {
        Self::new()
            .status(JobStatus::Failure)
            .message(message)
            .error(error)
    }

    pub fn status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn progress(mut self, progress: i32) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn repository(mut self, repository_id: Uuid) -> Self {
        self.repository_id = Some(repository_id);
        self
    }

    pub fn result(mut self, result: JsonValue) -> Self {
        self.result = Some(result);
        self
    }

    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Keyed store of job records with a small state machine.
///
/// Cheap to share behind an `Arc`; every write is a whole-record merge
/// under one lock.
pub struct TaskRegistry {
    jobs: RwLock<HashMap<String, JobRecord>>,
    event_tx: broadcast::Sender<JobEvent>,
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::with_event_capacity(defaults::EVENT_BUS_CAPACITY)
    }

    pub fn with_event_capacity(capacity: usize) -> Self {
        let (event_tx, _) = broadcast::channel(capacity.max(1));
        Self {
            jobs: RwLock::new(HashMap::new()),
            event_tx,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, JobRecord>> {
        self.jobs.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, JobRecord>> {
        self.jobs.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a job at `Pending`, replacing any existing record with this id.
    pub fn create(&self, job_id: impl Into<String>) -> JobRecord {
        let record = JobRecord::pending(job_id);
        self.write().insert(record.id.clone(), record.clone());
        debug!(job_id = %record.id, "Job registered");
        let _ = self.event_tx.send(JobEvent::Created {
            job_id: record.id.clone(),
        });
        record
    }

    /// Merge `update` into the record for `job_id`, creating it first if needed.
    ///
    /// A record is never `Pending` after an update. `result` survives only on
    /// `Success` and `error` only on `Failure`.
    pub fn update(&self, job_id: &str, update: JobUpdate) -> JobRecord {
        let record = {
            let mut jobs = self.write();
            let record = jobs
                .entry(job_id.to_string())
                .or_insert_with(|| JobRecord::pending(job_id));

            let status = match update.status.unwrap_or(record.status) {
                JobStatus::Pending => JobStatus::Started,
                other => other,
            };
            record.status = status;
            if let Some(message) = update.message {
                record.message = message;
            }
            if let Some(progress) = update.progress {
                record.progress = progress;
            }
            if let Some(repository_id) = update.repository_id {
                record.repository_id = Some(repository_id);
            }
            if let Some(result) = update.result {
                record.result = Some(result);
            }
            if let Some(error) = update.error {
                record.error = Some(error);
            }
            if status != JobStatus::Success {
                record.result = None;
            }
            if status != JobStatus::Failure {
                record.error = None;
            }
            record.updated_at = Utc::now();
            record.clone()
        };

        trace!(
            job_id,
            status = %record.status,
            progress = record.progress,
            message = %record.message,
            "Job updated"
        );

        let event = match record.status {
            JobStatus::Success => JobEvent::Completed {
                job_id: record.id.clone(),
            },
            JobStatus::Failure => JobEvent::Failed {
                job_id: record.id.clone(),
                error: record.error.clone().unwrap_or_default(),
            },
            status => JobEvent::Progress {
                job_id: record.id.clone(),
                status,
                progress: record.progress,
                message: record.message.clone(),
            },
        };
        let _ = self.event_tx.send(event);
        record
    }

    /// Current record for `job_id`.
    pub fn get(&self, job_id: &str) -> Option<JobRecord> {
        self.read().get(job_id).cloned()
    }

    /// Poll view of a job; unknown ids map to a `not_found` response.
    pub fn status(&self, job_id: &str) -> JobStatusResponse {
        match self.get(job_id) {
            Some(record) => record.into(),
            None => JobStatusResponse::not_found(job_id),
        }
    }

    /// Subscribe to job events.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.event_tx.subscribe()
    }

    /// All records, oldest first.
    pub fn list(&self) -> Vec<JobRecord> {
        let mut records: Vec<JobRecord> = self.read().values().cloned().collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        records
    }

    /// Stop tracking a job. Work already running for it is not affected.
    pub fn remove(&self, job_id: &str) -> Option<JobRecord> {
        self.write().remove(job_id)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
