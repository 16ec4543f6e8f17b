//! Data models for jobs, repositories, analyses, and documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::Result;
use crate::repo_ref::RepoRef;
use crate::traits::RepositoryStore;

// =============================================================================
// JOBS
// =============================================================================

/// Lifecycle status of a background job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Started,
    Success,
    Failure,
    Retry,
}

impl JobStatus {
    /// Terminal statuses are set exactly once, at the end of a pipeline run.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Failure)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Started => "started",
            JobStatus::Success => "success",
            JobStatus::Failure => "failure",
            JobStatus::Retry => "retry",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status/progress/result record tracked per background job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub status: JobStatus,
    pub message: String,
    pub progress: i32,
    pub repository_id: Option<Uuid>,
    /// Present only when `status == Success`.
    pub result: Option<JsonValue>,
    /// Present only when `status == Failure`.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// A freshly registered job.
    pub fn pending(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            status: JobStatus::Pending,
            message: "Task created".to_string(),
            progress: 0,
            repository_id: None,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Status as reported to pollers; adds a sentinel for unknown job ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollStatus {
    Pending,
    Started,
    Success,
    Failure,
    Retry,
    NotFound,
}

impl From<JobStatus> for PollStatus {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Pending => PollStatus::Pending,
            JobStatus::Started => PollStatus::Started,
            JobStatus::Success => PollStatus::Success,
            JobStatus::Failure => PollStatus::Failure,
            JobStatus::Retry => PollStatus::Retry,
        }
    }
}

/// Flat, serializable view of a job for status polling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub job_id: String,
    pub status: PollStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobStatusResponse {
    pub fn not_found(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            status: PollStatus::NotFound,
            message: "Task not found".to_string(),
            progress: None,
            repository_id: None,
            result: None,
            error: Some("Task not found".to_string()),
        }
    }
}

impl From<JobRecord> for JobStatusResponse {
    fn from(record: JobRecord) -> Self {
        Self {
            job_id: record.id,
            status: record.status.into(),
            message: record.message,
            progress: Some(record.progress),
            repository_id: record.repository_id,
            result: record.result,
            error: record.error,
        }
    }
}

// =============================================================================
// REPOSITORIES
// =============================================================================

/// Processing status persisted on the repository itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

/// A work item: one source repository and its top-level artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub id: Uuid,
    pub name: String,
    pub author: String,
    pub repo_url: String,
    #[serde(default)]
    pub status: RepositoryStatus,
    pub ai_summary: Option<String>,
    pub short_description: Option<String>,
    pub fork_url: Option<String>,
    pub social_post_url: Option<String>,
    pub content_preview: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Repository {
    /// A new, unprocessed repository for the given reference.
    pub fn from_ref(repo: &RepoRef) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            name: repo.repo_name.clone(),
            author: repo.owner.clone(),
            repo_url: repo.url.clone(),
            status: RepositoryStatus::Pending,
            ai_summary: None,
            short_description: None,
            fork_url: None,
            social_post_url: None,
            content_preview: None,
            created_at: now,
            updated_at: now,
        }
    }
}

// =============================================================================
// ANALYSES
// =============================================================================

/// Statistics gathered while flattening a repository into text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisStats {
    pub total_files: u64,
    pub total_directories: u64,
    pub files_processed: u64,
    pub total_lines: u64,
    pub total_characters: u64,
    pub estimated_tokens: u64,
    pub total_size_bytes: u64,
    pub large_files_skipped: u64,
    pub binary_files_skipped: u64,
    pub encoding_errors: u64,
}

/// The large text artifact produced for a repository, plus its statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryAnalysis {
    pub id: Uuid,
    pub repository_id: Uuid,
    pub analysis_version: i32,
    pub stats: AnalysisStats,
    pub tree_structure: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Request for storing a new analysis.
#[derive(Debug, Clone)]
pub struct CreateAnalysisRequest {
    pub repository_id: Uuid,
    pub stats: AnalysisStats,
    pub tree_structure: Option<String>,
    pub content: String,
}

// =============================================================================
// DOCUMENTS
// =============================================================================

/// A generated document attached to a repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub repository_id: Uuid,
    /// The analysis this document was generated from.
    pub analysis_id: Option<Uuid>,
    pub document_type: String,
    pub title: String,
    pub description: String,
    pub content: String,
    pub is_current: bool,
    pub version: i32,
    pub model_used: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A generated document not yet persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDocument {
    pub document_type: String,
    pub title: String,
    pub description: String,
    pub content: String,
    pub model_used: Option<String>,
}

/// Request for storing a generated document.
#[derive(Debug, Clone)]
pub struct CreateDocumentRequest {
    pub repository_id: Uuid,
    pub analysis_id: Option<Uuid>,
    pub document: NewDocument,
}

// =============================================================================
// ARTIFACT STATE
// =============================================================================

/// Point-in-time view of which artifacts exist for a work item.
///
/// Read from persistence without a transaction; may be stale by the time it
/// is acted on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSnapshot {
    pub repository_id: Option<Uuid>,
    pub analysis_id: Option<Uuid>,
    /// The repository is known to persistence.
    pub known: bool,
    pub has_analysis: bool,
    pub has_tree_structure: bool,
    pub has_ai_summary: bool,
    pub has_short_description: bool,
    /// Current documents generated from the current analysis.
    pub document_count: usize,
    /// Some current document references an analysis that no longer exists.
    pub has_orphaned_documents: bool,
    pub has_fork_url: bool,
    pub has_social_post: bool,
}

impl ArtifactSnapshot {
    /// Snapshot for a repository persistence has never seen.
    pub fn unknown() -> Self {
        Self::default()
    }

    /// Read the artifact state of the repository at `repo_url`.
    pub async fn load(store: &dyn RepositoryStore, repo_url: &str) -> Result<Self> {
        let Some(repo) = store.find_by_url(repo_url).await? else {
            return Ok(Self::unknown());
        };

        let analysis = store.latest_analysis(repo.id).await?;
        let documents = store.current_documents(repo.id).await?;

        let analysis_id = analysis.as_ref().map(|a| a.id);
        let document_count = match analysis_id {
            Some(id) => documents
                .iter()
                .filter(|d| d.analysis_id == Some(id))
                .count(),
            None => 0,
        };

        let mut has_orphaned_documents = false;
        for referenced in documents.iter().filter_map(|d| d.analysis_id) {
            if Some(referenced) != analysis_id && !store.analysis_exists(referenced).await? {
                has_orphaned_documents = true;
                break;
            }
        }

        Ok(Self {
            repository_id: Some(repo.id),
            analysis_id,
            known: true,
            has_analysis: analysis.is_some(),
            has_tree_structure: analysis
                .as_ref()
                .and_then(|a| a.tree_structure.as_deref())
                .is_some_and(|t| !t.trim().is_empty()),
            has_ai_summary: is_present(repo.ai_summary.as_deref()),
            has_short_description: is_present(repo.short_description.as_deref()),
            document_count,
            has_orphaned_documents,
            has_fork_url: is_present(repo.fork_url.as_deref()),
            has_social_post: is_present(repo.social_post_url.as_deref()),
        })
    }
}

fn is_present(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_job_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(JobStatus::Success).unwrap(),
            json!("success")
        );
        assert_eq!(
            serde_json::to_value(JobStatus::Retry).unwrap(),
            json!("retry")
        );
    }

    #[test]
    fn test_job_status_terminal() {
        assert!(JobStatus::Success.is_terminal());
        assert!(JobStatus::Failure.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Started.is_terminal());
        assert!(!JobStatus::Retry.is_terminal());
    }

    #[test]
    fn test_job_record_pending() {
        let record = JobRecord::pending("job-1");
        assert_eq!(record.id, "job-1");
        assert_eq!(record.status, JobStatus::Pending);
        assert_eq!(record.progress, 0);
        assert!(record.result.is_none());
        assert!(record.error.is_none());
        assert_eq!(record.created_at, record.updated_at);
    }

    #[test]
    fn test_status_response_not_found() {
        let response = JobStatusResponse::not_found("missing");
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["status"], "not_found");
        assert_eq!(value["job_id"], "missing");
        assert!(value.get("progress").is_none());
    }

    #[test]
    fn test_status_response_from_record() {
        let mut record = JobRecord::pending("job-2");
        record.status = JobStatus::Started;
        record.progress = 30;
        let response = JobStatusResponse::from(record);
        assert_eq!(response.status, PollStatus::Started);
        assert_eq!(response.progress, Some(30));
    }

    #[test]
    fn test_repository_from_ref() {
        let repo_ref = RepoRef::parse("https://github.com/tokio-rs/tokio").unwrap();
        let repo = Repository::from_ref(&repo_ref);
        assert_eq!(repo.name, "tokio");
        assert_eq!(repo.author, "tokio-rs");
        assert_eq!(repo.status, RepositoryStatus::Pending);
        assert!(repo.ai_summary.is_none());
    }

    #[test]
    fn test_unknown_snapshot_has_nothing() {
        let snapshot = ArtifactSnapshot::unknown();
        assert!(!snapshot.known);
        assert!(!snapshot.has_analysis);
        assert_eq!(snapshot.document_count, 0);
    }
}
