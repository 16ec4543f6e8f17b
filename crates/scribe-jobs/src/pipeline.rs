//! The per-repository pipeline driver.
//!
//! One run takes a repository URL through ingestion, summarization, the short
//! description, document generation, and the optional derived artifacts,
//! reporting every step to the [`TaskRegistry`]. In
//! [`PipelineMode::Comprehensive`] the run starts at the stage the
//! reconciler says is still missing, so re-running a repository only redoes
//! missing work.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use scribe_core::{
    defaults, AnalysisStats, ArtifactSnapshot, CreateAnalysisRequest, CreateDocumentRequest,
    DocumentContext, DocumentGenerator, Error, ForkGenerator, GenerationBackend, JobStatus,
    RepoIngestor, RepoRef, Repository, RepositoryAnalysis, RepositoryStatus, RepositoryStore,
    Result, SocialPoster,
};

use crate::derived::{DerivedArtifacts, PartialFailure};
use crate::describe::{DescribeContext, ShortDescriber};
use crate::documents::OracleDocumentGenerator;
use crate::reconciler::{next_action, NextAction};
use crate::registry::{JobUpdate, TaskRegistry};
use crate::summarizer::{LargeTextSummarizer, SummarizerConfig, SummaryContext};
use crate::text::truncate_chars;

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Configuration for [`Pipeline`].
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub summarizer: SummarizerConfig,
    pub description_max_chars: usize,
    /// Run the fork generator when one is configured.
    pub enable_fork: bool,
    /// Run the social poster when one is configured.
    pub enable_social: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            summarizer: SummarizerConfig::default(),
            description_max_chars: defaults::DESCRIPTION_MAX_CHARS,
            enable_fork: false,
            enable_social: false,
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `SCRIBE_DESCRIPTION_MAX_CHARS` | `150` |
    /// | `SCRIBE_ENABLE_FORK` | `false` |
    /// | `SCRIBE_ENABLE_SOCIAL` | `false` |
    ///
    /// Summarizer settings come from [`SummarizerConfig::from_env`].
    pub fn from_env() -> Self {
        let description_max_chars = std::env::var("SCRIBE_DESCRIPTION_MAX_CHARS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::DESCRIPTION_MAX_CHARS);

        let flag = |name: &str| {
            std::env::var(name)
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false)
        };

        Self {
            summarizer: SummarizerConfig::from_env(),
            description_max_chars,
            enable_fork: flag("SCRIBE_ENABLE_FORK"),
            enable_social: flag("SCRIBE_ENABLE_SOCIAL"),
        }
    }

    pub fn with_summarizer(mut self, summarizer: SummarizerConfig) -> Self {
        self.summarizer = summarizer;
        self
    }

    pub fn with_description_max_chars(mut self, chars: usize) -> Self {
        self.description_max_chars = chars;
        self
    }

    pub fn with_fork_enabled(mut self, enabled: bool) -> Self {
        self.enable_fork = enabled;
        self
    }

    pub fn with_social_enabled(mut self, enabled: bool) -> Self {
        self.enable_social = enabled;
        self
    }
}

// =============================================================================
// STAGES
// =============================================================================

/// How a run decides where to start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineMode {
    /// Redo every stage.
    #[default]
    Full,
    /// Start at the first stage whose artifacts are missing.
    Comprehensive,
}

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    ExtractingMetadata,
    Analyzing,
    Summarizing,
    Describing,
    GeneratingDocuments,
    DerivedArtifacts,
    Done,
    Failed,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::ExtractingMetadata => "extracting_metadata",
            Stage::Analyzing => "analyzing",
            Stage::Summarizing => "summarizing",
            Stage::Describing => "describing",
            Stage::GeneratingDocuments => "generating_documents",
            Stage::DerivedArtifacts => "derived_artifacts",
            Stage::Done => "done",
            Stage::Failed => "failed",
        }
    }

    /// Registry progress reported when the stage begins.
    pub fn progress(self) -> i32 {
        match self {
            Stage::ExtractingMetadata => 10,
            Stage::Analyzing => 30,
            Stage::Summarizing => 85,
            Stage::Describing => 88,
            Stage::GeneratingDocuments => 90,
            Stage::DerivedArtifacts => 95,
            Stage::Done => 100,
            Stage::Failed => 0,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First stage to run for a reconciled action.
pub fn entry_stage(action: NextAction) -> Stage {
    match action {
        NextAction::FullAnalysis => Stage::ExtractingMetadata,
        NextAction::GenerateSummaryAndDescription => Stage::Summarizing,
        NextAction::GenerateDocuments => Stage::GeneratingDocuments,
        NextAction::AlreadyComplete => Stage::DerivedArtifacts,
    }
}

// =============================================================================
// RESULT
// =============================================================================

/// Result payload stored on a successful job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineResult {
    pub repository_id: Uuid,
    pub repository_url: String,
    pub analysis_id: Option<Uuid>,
    pub started_at_stage: Option<Stage>,
    pub stats: Option<AnalysisStats>,
    pub chunk_count: usize,
    pub successful_chunks: usize,
    pub failed_chunks: usize,
    pub summary_truncated: bool,
    pub summary_generated: bool,
    pub description_generated: bool,
    pub document_ids: Vec<Uuid>,
    pub fork_url: Option<String>,
    pub social_post_url: Option<String>,
    pub partial_failures: Vec<PartialFailure>,
}

struct RunState {
    stage: Stage,
    repository_id: Option<Uuid>,
}

// =============================================================================
// BUILDER
// =============================================================================

/// Assembles a [`Pipeline`] from its collaborators.
pub struct PipelineBuilder {
    store: Arc<dyn RepositoryStore>,
    backend: Arc<dyn GenerationBackend>,
    ingestor: Arc<dyn RepoIngestor>,
    documents: Option<Arc<dyn DocumentGenerator>>,
    fork: Option<Arc<dyn ForkGenerator>>,
    social: Option<Arc<dyn SocialPoster>>,
    registry: Option<Arc<TaskRegistry>>,
    config: PipelineConfig,
}

impl PipelineBuilder {
    pub fn new(
        store: Arc<dyn RepositoryStore>,
        backend: Arc<dyn GenerationBackend>,
        ingestor: Arc<dyn RepoIngestor>,
    ) -> Self {
        Self {
            store,
            backend,
            ingestor,
            documents: None,
            fork: None,
            social: None,
            registry: None,
            config: PipelineConfig::default(),
        }
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(mut self, registry: Arc<TaskRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Defaults to an [`OracleDocumentGenerator`] on the same backend.
    pub fn document_generator(mut self, documents: Arc<dyn DocumentGenerator>) -> Self {
        self.documents = Some(documents);
        self
    }

    /// Used only when `enable_fork` is set.
    pub fn fork_generator(mut self, fork: Arc<dyn ForkGenerator>) -> Self {
        self.fork = Some(fork);
        self
    }

    /// Used only when `enable_social` is set.
    pub fn social_poster(mut self, social: Arc<dyn SocialPoster>) -> Self {
        self.social = Some(social);
        self
    }

    pub fn build(self) -> Pipeline {
        let documents = self
            .documents
            .unwrap_or_else(|| Arc::new(OracleDocumentGenerator::new(self.backend.clone())));

        let mut derived = DerivedArtifacts::new();
        if let Some(fork) = self.fork.filter(|_| self.config.enable_fork) {
            derived = derived.with_fork(fork);
        }
        if let Some(social) = self.social.filter(|_| self.config.enable_social) {
            derived = derived.with_social(social);
        }

        Pipeline {
            summarizer: Arc::new(LargeTextSummarizer::new(
                self.backend.clone(),
                self.config.summarizer.clone(),
            )),
            describer: Arc::new(
                ShortDescriber::new(self.backend).with_max_chars(self.config.description_max_chars),
            ),
            store: self.store,
            ingestor: self.ingestor,
            documents,
            derived,
            registry: self.registry.unwrap_or_default(),
        }
    }
}

// =============================================================================
// PIPELINE
// =============================================================================

/// Drives one repository through every stage. Cheap to clone.
#[derive(Clone)]
pub struct Pipeline {
    store: Arc<dyn RepositoryStore>,
    ingestor: Arc<dyn RepoIngestor>,
    summarizer: Arc<LargeTextSummarizer>,
    describer: Arc<ShortDescriber>,
    documents: Arc<dyn DocumentGenerator>,
    derived: DerivedArtifacts,
    registry: Arc<TaskRegistry>,
}

impl Pipeline {
    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn RepositoryStore> {
        &self.store
    }

    /// Run the pipeline to completion and return the job's terminal status.
    ///
    /// Never returns an error: failures are recorded on the job record and,
    /// once the repository is known, on the repository status.
    pub async fn run(&self, job_id: &str, repo_url: &str, mode: PipelineMode) -> JobStatus {
        self.execute(job_id, repo_url, mode, &AtomicBool::new(false))
            .await
    }

    /// Run the pipeline as a background task.
    ///
    /// Registers the job first if the registry does not know it yet.
    pub fn spawn(
        &self,
        job_id: impl Into<String>,
        repo_url: impl Into<String>,
        mode: PipelineMode,
    ) -> PipelineHandle {
        let job_id = job_id.into();
        let repo_url = repo_url.into();
        if self.registry.get(&job_id).is_none() {
            self.registry.create(job_id.clone());
        }

        let cancel = Arc::new(AtomicBool::new(false));
        let pipeline = self.clone();
        let task_job_id = job_id.clone();
        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            pipeline
                .execute(&task_job_id, &repo_url, mode, &task_cancel)
                .await
        });

        PipelineHandle {
            job_id,
            cancel,
            task,
            registry: self.registry.clone(),
        }
    }

    #[instrument(skip(self, cancel), fields(subsystem = "jobs", component = "pipeline", op = "run"))]
    async fn execute(
        &self,
        job_id: &str,
        repo_url: &str,
        mode: PipelineMode,
        cancel: &AtomicBool,
    ) -> JobStatus {
        let start = Instant::now();
        let mut state = RunState {
            stage: Stage::ExtractingMetadata,
            repository_id: None,
        };

        match self.drive(job_id, repo_url, mode, cancel, &mut state).await {
            Ok(result) => {
                let payload = match serde_json::to_value(&result) {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!(error = %e, "Failed to serialize pipeline result");
                        serde_json::json!({
                            "repository_id": result.repository_id,
                            "repository_url": result.repository_url,
                        })
                    }
                };
                self.registry.update(
                    job_id,
                    JobUpdate::success("Repository processing completed", payload),
                );
                info!(
                    repository_id = %result.repository_id,
                    partial_failures = result.partial_failures.len(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Pipeline completed"
                );
                JobStatus::Success
            }
            Err(e) => {
                error!(
                    stage = %state.stage,
                    error = %e,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Pipeline failed"
                );
                self.registry.update(
                    job_id,
                    JobUpdate::failure(format!("Processing failed: {}", e), e.to_string()),
                );
                if let Some(id) = state.repository_id {
                    if let Err(status_err) =
                        self.store.update_status(id, RepositoryStatus::Failed).await
                    {
                        error!(
                            repository_id = %id,
                            error = %status_err,
                            "Failed to mark repository as failed"
                        );
                    }
                }
                JobStatus::Failure
            }
        }
    }

    fn enter(
        &self,
        job_id: &str,
        state: &mut RunState,
        stage: Stage,
        message: &str,
        cancel: &AtomicBool,
    ) -> Result<()> {
        if cancel.load(Ordering::SeqCst) {
            return Err(Error::Cancelled(format!("before {}", stage)));
        }
        state.stage = stage;
        debug!(job_id, stage = %stage, "Entering stage");
        self.progress(job_id, stage.progress(), message);
        Ok(())
    }

    fn progress(&self, job_id: &str, progress: i32, message: &str) {
        self.registry
            .update(job_id, JobUpdate::started(message).progress(progress));
    }

    async fn drive(
        &self,
        job_id: &str,
        repo_url: &str,
        mode: PipelineMode,
        cancel: &AtomicBool,
        state: &mut RunState,
    ) -> Result<PipelineResult> {
        // Metadata and registration.
        self.enter(
            job_id,
            state,
            Stage::ExtractingMetadata,
            "Extracting repository metadata",
            cancel,
        )?;
        let repo_ref = RepoRef::parse(repo_url)?;
        let repository = match self.store.find_by_url(&repo_ref.url).await? {
            Some(existing) => existing,
            None => self.store.create(Repository::from_ref(&repo_ref)).await?,
        };
        state.repository_id = Some(repository.id);
        self.registry.update(
            job_id,
            JobUpdate::started("Repository registered")
                .progress(20)
                .repository(repository.id),
        );
        self.store
            .update_status(repository.id, RepositoryStatus::Processing)
            .await?;

        let snapshot = ArtifactSnapshot::load(self.store.as_ref(), &repo_ref.url).await?;
        let start_stage = match mode {
            PipelineMode::Full => Stage::ExtractingMetadata,
            PipelineMode::Comprehensive => {
                let action = next_action(&snapshot);
                info!(action = %action, "Reconciled repository state");
                entry_stage(action)
            }
        };

        let mut result = PipelineResult {
            repository_id: repository.id,
            repository_url: repo_ref.url.clone(),
            started_at_stage: Some(start_stage),
            ..PipelineResult::default()
        };

        // Analysis.
        let analysis = if start_stage <= Stage::Analyzing {
            self.enter(
                job_id,
                state,
                Stage::Analyzing,
                "Processing repository content",
                cancel,
            )?;
            self.analyze(job_id, &repository, &repo_ref).await?
        } else {
            self.store
                .latest_analysis(repository.id)
                .await?
                .ok_or_else(|| Error::Job(format!("No analysis found for {}", repo_ref.url)))?
        };
        result.analysis_id = Some(analysis.id);
        result.stats = Some(analysis.stats.clone());

        // Summary.
        let mut summary = repository.ai_summary.clone().filter(|s| !s.trim().is_empty());
        if start_stage <= Stage::Summarizing {
            self.enter(
                job_id,
                state,
                Stage::Summarizing,
                "Generating AI summary",
                cancel,
            )?;
            let reuse = start_stage == Stage::Summarizing && snapshot.has_ai_summary;
            if reuse && summary.is_some() {
                info!("AI summary present, regenerating only the description");
            } else {
                let context = SummaryContext::new(repo_ref.url.clone())
                    .with_stats(analysis.stats.clone())
                    .with_tree(analysis.tree_structure.clone());
                let outcome = self.summarizer.summarize(&analysis.content, &context).await?;
                self.store
                    .set_ai_summary(repository.id, &outcome.final_summary)
                    .await?;
                result.chunk_count = outcome.chunk_count;
                result.successful_chunks = outcome.successful_count;
                result.failed_chunks = outcome.failed_count;
                result.summary_truncated = outcome.truncated;
                result.summary_generated = true;
                summary = Some(outcome.final_summary);
            }

            self.enter(
                job_id,
                state,
                Stage::Describing,
                "Generating short description",
                cancel,
            )?;
            let summary_text = summary
                .as_deref()
                .ok_or_else(|| Error::Job("No AI summary to describe".to_string()))?;
            let describe_context = DescribeContext {
                name: repository.name.clone(),
                author: repository.author.clone(),
                repository_url: repository.repo_url.clone(),
            };
            let description = self
                .describer
                .describe(summary_text, Some(&describe_context))
                .await?;
            self.store
                .set_short_description(repository.id, &description)
                .await?;
            result.description_generated = true;
        }

        // Documents. A description-only repair keeps the existing set.
        if start_stage < Stage::Summarizing || snapshot.document_count == 0 {
            self.enter(
                job_id,
                state,
                Stage::GeneratingDocuments,
                "Generating documents",
                cancel,
            )?;
            let summary_text = summary
                .as_deref()
                .ok_or_else(|| Error::Job("No AI summary for document generation".to_string()))?;
            let (ids, failures) = self
                .generate_documents(&repository, &analysis, summary_text)
                .await?;
            result.document_ids = ids;
            result.partial_failures.extend(failures);
        }

        // Derived artifacts.
        self.enter(
            job_id,
            state,
            Stage::DerivedArtifacts,
            "Creating derived artifacts",
            cancel,
        )?;
        if !self.derived.is_empty() {
            let current = self
                .store
                .get(repository.id)
                .await?
                .ok_or(Error::RepositoryNotFound(repository.id))?;
            let snapshot = ArtifactSnapshot::load(self.store.as_ref(), &repo_ref.url).await?;
            let outcome = self
                .derived
                .produce(self.store.as_ref(), &current, &repo_ref, &snapshot)
                .await;
            result.fork_url = outcome.fork_url;
            result.social_post_url = outcome.social_post_url;
            result.partial_failures.extend(outcome.partial_failures);
        }

        state.stage = Stage::Done;
        self.store
            .update_status(repository.id, RepositoryStatus::Completed)
            .await?;
        Ok(result)
    }

    async fn analyze(
        &self,
        job_id: &str,
        repository: &Repository,
        repo_ref: &RepoRef,
    ) -> Result<RepositoryAnalysis> {
        let output = self.ingestor.ingest(repo_ref).await?;
        self.progress(job_id, 60, "Analysis data extracted");

        self.progress(job_id, 75, "Saving analysis");
        let (preview, _) = truncate_chars(&output.content, defaults::CONTENT_PREVIEW_CHARS);
        let analysis = self
            .store
            .create_analysis(CreateAnalysisRequest {
                repository_id: repository.id,
                stats: output.stats,
                tree_structure: output.tree_structure,
                content: output.content.clone(),
            })
            .await?;
        self.store
            .set_content_preview(repository.id, preview)
            .await?;

        info!(
            analysis_id = %analysis.id,
            analysis_version = analysis.analysis_version,
            total_characters = analysis.stats.total_characters,
            "Analysis saved"
        );
        Ok(analysis)
    }

    async fn generate_documents(
        &self,
        repository: &Repository,
        analysis: &RepositoryAnalysis,
        summary: &str,
    ) -> Result<(Vec<Uuid>, Vec<PartialFailure>)> {
        let context = DocumentContext {
            repository_url: repository.repo_url.clone(),
            name: repository.name.clone(),
            author: repository.author.clone(),
            stats: analysis.stats.clone(),
            tree_structure: analysis.tree_structure.clone(),
        };
        let batch = self.documents.generate(summary, &context).await;

        if batch.documents.is_empty() && !batch.failures.is_empty() {
            return Err(Error::Job(format!(
                "All {} document types failed to generate",
                batch.failures.len()
            )));
        }

        let mut ids = Vec::with_capacity(batch.documents.len());
        for document in batch.documents {
            let superseded = self
                .store
                .mark_previous_documents_not_current(repository.id, &document.document_type)
                .await?;
            if superseded > 0 {
                debug!(
                    document_type = %document.document_type,
                    superseded,
                    "Marked previous documents as not current"
                );
            }
            let stored = self
                .store
                .create_document(CreateDocumentRequest {
                    repository_id: repository.id,
                    analysis_id: Some(analysis.id),
                    document,
                })
                .await?;
            ids.push(stored.id);
        }

        let failures: Vec<PartialFailure> = batch
            .failures
            .into_iter()
            .map(|f| {
                warn!(document_type = %f.document_type, error = %f.error, "Document not generated");
                PartialFailure::new(format!("document:{}", f.document_type), f.error)
            })
            .collect();

        info!(
            generated = ids.len(),
            failed = failures.len(),
            "Documents stored"
        );
        Ok((ids, failures))
    }
}

// =============================================================================
// HANDLE
// =============================================================================

/// Handle to a pipeline run started with [`Pipeline::spawn`].
pub struct PipelineHandle {
    job_id: String,
    cancel: Arc<AtomicBool>,
    task: JoinHandle<JobStatus>,
    registry: Arc<TaskRegistry>,
}

impl PipelineHandle {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Request cancellation. Takes effect before the next stage starts.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the run to finish and return the job's terminal status.
    pub async fn join(self) -> JobStatus {
        match self.task.await {
            Ok(status) => status,
            Err(e) => {
                error!(job_id = %self.job_id, error = %e, "Pipeline task panicked");
                self.registry.update(
                    &self.job_id,
                    JobUpdate::failure("Processing failed: task panicked", e.to_string()),
                );
                JobStatus::Failure
            }
        }
    }
}
