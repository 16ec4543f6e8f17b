//! Core traits for reposcribe abstractions.
//!
//! These traits define the interfaces of every external collaborator the
//! pipeline talks to, enabling pluggable backends and testability.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;
use crate::repo_ref::RepoRef;

// =============================================================================
// GENERATION TRAITS
// =============================================================================

/// Backend for text generation.
///
/// This is the summarization oracle: every chunk summary, the final
/// aggregation, the short description, and each generated document is a
/// single call on this trait.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate a response for the given prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Generate a response with a system prompt.
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String>;

    /// Get the model name.
    fn model_name(&self) -> &str;

    /// Check if the backend is available and responding.
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

// =============================================================================
// REPOSITORY STORE TRAITS
// =============================================================================

/// Persistence for repositories, analyses, and documents.
#[async_trait]
pub trait RepositoryStore: Send + Sync {
    /// Look up a repository by its canonical URL.
    async fn find_by_url(&self, url: &str) -> Result<Option<Repository>>;

    /// Fetch a repository by id.
    async fn get(&self, id: Uuid) -> Result<Option<Repository>>;

    /// Insert a new repository.
    async fn create(&self, repo: Repository) -> Result<Repository>;

    /// List repositories, oldest first.
    async fn list(&self, limit: usize) -> Result<Vec<Repository>>;

    /// Update the persisted processing status.
    async fn update_status(&self, id: Uuid, status: RepositoryStatus) -> Result<()>;

    /// Store the AI summary.
    async fn set_ai_summary(&self, id: Uuid, summary: &str) -> Result<()>;

    /// Store the short description.
    async fn set_short_description(&self, id: Uuid, description: &str) -> Result<()>;

    /// Store a preview of the raw analysis content.
    async fn set_content_preview(&self, id: Uuid, preview: &str) -> Result<()>;

    /// Store the URL of the derived fork.
    async fn set_fork_url(&self, id: Uuid, url: &str) -> Result<()>;

    /// Store the URL of the published social post.
    async fn set_social_post_url(&self, id: Uuid, url: &str) -> Result<()>;

    /// Most recent analysis for a repository.
    async fn latest_analysis(&self, repository_id: Uuid) -> Result<Option<RepositoryAnalysis>>;

    /// Whether an analysis with this id exists.
    async fn analysis_exists(&self, analysis_id: Uuid) -> Result<bool>;

    /// Insert a new analysis (version numbers increase per repository).
    async fn create_analysis(&self, req: CreateAnalysisRequest) -> Result<RepositoryAnalysis>;

    /// Current (non-superseded) documents for a repository.
    async fn current_documents(&self, repository_id: Uuid) -> Result<Vec<Document>>;

    /// Insert a generated document.
    async fn create_document(&self, req: CreateDocumentRequest) -> Result<Document>;

    /// Mark earlier documents of a type as superseded. Returns how many changed.
    async fn mark_previous_documents_not_current(
        &self,
        repository_id: Uuid,
        document_type: &str,
    ) -> Result<usize>;
}

// =============================================================================
// INGESTION TRAITS
// =============================================================================

/// Flattened text form of a repository plus its statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestOutput {
    pub content: String,
    pub stats: AnalysisStats,
    pub tree_structure: Option<String>,
}

/// Produces the large text artifact for a repository.
#[async_trait]
pub trait RepoIngestor: Send + Sync {
    /// Flatten the repository into text.
    async fn ingest(&self, repo: &RepoRef) -> Result<IngestOutput>;
}

// =============================================================================
// DERIVED ARTIFACT TRAITS
// =============================================================================

/// Repository context handed to document generation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentContext {
    pub repository_url: String,
    pub name: String,
    pub author: String,
    pub stats: AnalysisStats,
    pub tree_structure: Option<String>,
}

/// One document type that could not be generated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentFailure {
    pub document_type: String,
    pub error: String,
}

/// Outcome of generating a set of documents; failures are per type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentBatch {
    pub documents: Vec<NewDocument>,
    pub failures: Vec<DocumentFailure>,
}

/// Generates documents from an AI summary.
#[async_trait]
pub trait DocumentGenerator: Send + Sync {
    /// Document types this generator produces.
    fn document_types(&self) -> Vec<String>;

    /// Generate every document type; individual types may fail.
    async fn generate(&self, summary: &str, context: &DocumentContext) -> DocumentBatch;
}

/// Result of forking a repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForkOutcome {
    pub fork_url: String,
}

/// Creates a derived fork of a repository.
#[async_trait]
pub trait ForkGenerator: Send + Sync {
    async fn fork(&self, repo: &RepoRef) -> Result<ForkOutcome>;
}

/// Result of publishing a social post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialPostOutcome {
    pub post_url: String,
}

/// Publishes a short social post about a repository.
#[async_trait]
pub trait SocialPoster: Send + Sync {
    async fn post(&self, text: &str) -> Result<SocialPostOutcome>;
}
