//! Integration tests for the pipeline driver and batch coordinator.
//!
//! This test suite validates:
//! - Job lifecycle: Pending only before the first update, result only on
//!   Success, error only on Failure
//! - Batch windows: 7 items with window 3 run as windows of 3, 3, 1
//! - Batch counting: processed == successful + failed, failures do not stop
//!   the batch
//! - Re-entry: a comprehensive run only redoes missing stages
//! - Pending work discovery feeds comprehensive batch runs

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use scribe_core::{
    AnalysisStats, ArtifactSnapshot, CreateAnalysisRequest, Document, Error, IngestOutput,
    JobStatus, PollStatus, RepoIngestor, RepoRef, Repository, RepositoryStatus, RepositoryStore,
    Result,
};
use scribe_db::MemoryStore;
use scribe_inference::MockGenerationBackend;
use scribe_jobs::{
    find_work, next_action, BatchConfig, BatchCoordinator, BatchStatus, JobEvent, NextAction,
    Pipeline, PipelineBuilder, PipelineMode, ProcessType,
};
use uuid::Uuid;

// ============================================================================
// HELPERS
// ============================================================================

/// Ingestor that fails for repositories named `broken` and tracks concurrency.
#[derive(Default)]
struct TestIngestor {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

#[async_trait]
impl RepoIngestor for TestIngestor {
    async fn ingest(&self, repo: &RepoRef) -> Result<IngestOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if repo.repo_name == "broken" {
            return Err(Error::Ingestion("clone failed".to_string()));
        }
        let content = format!("FILE: README.md\n# {}\n", repo.repo_name);
        Ok(IngestOutput {
            stats: AnalysisStats {
                files_processed: 1,
                total_files: 1,
                total_characters: content.chars().count() as u64,
                ..AnalysisStats::default()
            },
            content,
            tree_structure: Some("README.md\n".to_string()),
        })
    }
}

struct Harness {
    store: MemoryStore,
    backend: MockGenerationBackend,
    ingestor: Arc<TestIngestor>,
    pipeline: Pipeline,
}

fn harness() -> Harness {
    let store = MemoryStore::new();
    let backend = MockGenerationBackend::new().with_fixed_response("Generated text");
    let ingestor = Arc::new(TestIngestor::default());
    let pipeline = PipelineBuilder::new(
        Arc::new(store.clone()),
        Arc::new(backend.clone()),
        ingestor.clone(),
    )
    .build();
    Harness {
        store,
        backend,
        ingestor,
        pipeline,
    }
}

async fn snapshot(store: &MemoryStore, url: &str) -> ArtifactSnapshot {
    ArtifactSnapshot::load(store, url).await.unwrap()
}

// ============================================================================
// JOB LIFECYCLE
// ============================================================================

#[tokio::test]
async fn test_job_lifecycle_success() {
    let h = harness();
    let registry = h.pipeline.registry().clone();
    let mut events = registry.subscribe();

    let created = registry.create("job-ok");
    assert_eq!(created.status, JobStatus::Pending);

    let status = h
        .pipeline
        .run("job-ok", "https://github.com/acme/widget", PipelineMode::Full)
        .await;
    assert_eq!(status, JobStatus::Success);

    let mut saw_created = false;
    let mut last = None;
    while let Ok(event) = events.try_recv() {
        match &event {
            JobEvent::Created { .. } => saw_created = true,
            JobEvent::Progress { status, .. } => assert_ne!(*status, JobStatus::Pending),
            _ => {}
        }
        last = Some(event);
    }
    assert!(saw_created);
    assert!(matches!(last, Some(JobEvent::Completed { .. })));

    let response = registry.status("job-ok");
    assert_eq!(response.status, PollStatus::Success);
    assert_eq!(response.progress, Some(100));
    assert!(response.result.is_some());
    assert!(response.error.is_none());
    assert!(response.repository_id.is_some());
}

#[tokio::test]
async fn test_job_lifecycle_failure() {
    let h = harness();
    let registry = h.pipeline.registry().clone();
    registry.create("job-fail");

    let status = h
        .pipeline
        .run("job-fail", "https://github.com/acme/broken", PipelineMode::Full)
        .await;
    assert_eq!(status, JobStatus::Failure);

    let record = registry.get("job-fail").unwrap();
    assert!(record.result.is_none());
    assert!(record.error.unwrap().contains("clone failed"));

    let repo = h
        .store
        .find_by_url("https://github.com/acme/broken")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(repo.status, RepositoryStatus::Failed);
}

#[tokio::test]
async fn test_unknown_job_polls_not_found() {
    let h = harness();
    let response = h.pipeline.registry().status("nope");
    assert_eq!(response.status, PollStatus::NotFound);
}

#[tokio::test]
async fn test_spawned_run_reports_through_handle() {
    let h = harness();
    let handle = h.pipeline.spawn(
        "job-bg",
        "https://github.com/acme/widget",
        PipelineMode::Full,
    );
    assert_eq!(handle.job_id(), "job-bg");
    assert_eq!(handle.join().await, JobStatus::Success);
    assert_eq!(
        h.pipeline.registry().get("job-bg").unwrap().status,
        JobStatus::Success
    );
}

// ============================================================================
// BATCH COORDINATION
// ============================================================================

#[tokio::test]
async fn test_batch_of_seven_runs_in_windows_of_three() {
    let h = harness();
    let urls: Vec<String> = (1..=7)
        .map(|i| format!("https://github.com/acme/repo-{}", i))
        .collect();
    let coordinator = BatchCoordinator::new(h.pipeline.clone(), BatchConfig::default());

    let report = coordinator.run_batch(&urls, 3).await;

    assert_eq!(report.status, BatchStatus::Completed);
    assert_eq!(report.windows, 3);
    assert_eq!(report.total, 7);
    assert_eq!(report.processed, 7);
    assert_eq!(report.successful, 7);
    assert_eq!(report.failed, 0);
    assert_eq!(report.job_ids.len(), 7);
    assert!(report.completed_at.is_some());
    assert!(h.ingestor.max_in_flight.load(Ordering::SeqCst) <= 3);
    assert_eq!(h.ingestor.calls.load(Ordering::SeqCst), 7);
}

#[tokio::test]
async fn test_batch_failures_do_not_stop_the_batch() {
    let h = harness();
    let urls = vec![
        "https://github.com/acme/one".to_string(),
        "https://github.com/acme/broken".to_string(),
        "not a repository".to_string(),
        "https://github.com/acme/two".to_string(),
    ];
    let coordinator = BatchCoordinator::new(h.pipeline.clone(), BatchConfig::default());

    let report = coordinator.run_batch(&urls, 2).await;

    assert_eq!(report.windows, 2);
    assert_eq!(report.processed, 4);
    assert_eq!(report.successful, 2);
    assert_eq!(report.failed, 2);
    assert_eq!(report.processed, report.successful + report.failed);
    // The invalid URL never becomes a job.
    assert_eq!(report.job_ids.len(), 3);
}

#[tokio::test]
async fn test_window_zero_is_treated_as_one() {
    let h = harness();
    let urls = vec![
        "https://github.com/acme/a".to_string(),
        "https://github.com/acme/b".to_string(),
    ];
    let coordinator = BatchCoordinator::new(h.pipeline.clone(), BatchConfig::default());

    let report = coordinator.run_batch(&urls, 0).await;

    assert_eq!(report.windows, 2);
    assert_eq!(h.ingestor.max_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_configured_window_and_pending_limit() {
    let h = harness();
    let urls: Vec<String> = (0..4)
        .map(|i| format!("https://github.com/acme/repo-{}", i))
        .collect();
    let config = BatchConfig::default().with_window(2).with_pending_limit(1);
    let coordinator = BatchCoordinator::new(h.pipeline.clone(), config);

    let report = coordinator.run_batch_default(&urls).await;
    assert_eq!(report.windows, 2);
    assert_eq!(report.successful, 4);

    for i in 0..3 {
        let repo_ref = RepoRef::parse(&format!("acme/fresh-{}", i)).unwrap();
        h.store.create(Repository::from_ref(&repo_ref)).await.unwrap();
    }
    let pending = coordinator
        .run_pending_default(ProcessType::AnalysisAndDocs)
        .await
        .unwrap();
    assert_eq!(pending.total, 1);
    assert_eq!(pending.successful, 1);
}

// ============================================================================
// RE-ENTRY
// ============================================================================

#[tokio::test]
async fn test_comprehensive_run_redoes_only_missing_documents() {
    let h = harness();
    let url = "https://github.com/acme/widget";
    h.pipeline.run("first", url, PipelineMode::Full).await;

    // Supersede every current document.
    let repo = h.store.find_by_url(url).await.unwrap().unwrap();
    for doc_type in scribe_core::defaults::DEFAULT_DOCUMENT_TYPES {
        h.store
            .mark_previous_documents_not_current(repo.id, doc_type)
            .await
            .unwrap();
    }
    assert_eq!(
        next_action(&snapshot(&h.store, url).await),
        NextAction::GenerateDocuments
    );

    h.backend.clear_calls();
    let ingest_calls = h.ingestor.calls.load(Ordering::SeqCst);
    let status = h
        .pipeline
        .run("second", url, PipelineMode::Comprehensive)
        .await;

    assert_eq!(status, JobStatus::Success);
    assert_eq!(h.ingestor.calls.load(Ordering::SeqCst), ingest_calls);
    // One call per document type, no summarization.
    assert_eq!(h.backend.generate_call_count(), 3);
    assert_eq!(
        next_action(&snapshot(&h.store, url).await),
        NextAction::AlreadyComplete
    );
}

#[tokio::test]
async fn test_comprehensive_run_keeps_summary_when_only_description_missing() {
    let h = harness();
    let url = "https://github.com/acme/widget";
    let repo_ref = RepoRef::parse(url).unwrap();
    h.pipeline.run("first", url, PipelineMode::Full).await;

    // Drop just the description.
    let repo = h.store.find_by_url(url).await.unwrap().unwrap();
    h.store.set_short_description(repo.id, "  ").await.unwrap();
    assert_eq!(
        next_action(&snapshot(&h.store, &repo_ref.url).await),
        NextAction::GenerateSummaryAndDescription
    );

    let mut docs_before: Vec<_> = h
        .store
        .current_documents(repo.id)
        .await
        .unwrap()
        .into_iter()
        .map(|d| d.id)
        .collect();
    docs_before.sort();
    assert_eq!(docs_before.len(), 3);

    h.backend.clear_calls();
    let status = h
        .pipeline
        .run("second", url, PipelineMode::Comprehensive)
        .await;
    assert_eq!(status, JobStatus::Success);

    // Only the describer runs.
    let calls = h.backend.get_calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].input.contains("REPOSITORY SUMMARY TO CONDENSE"));
    let repo = h.store.get(repo.id).await.unwrap().unwrap();
    assert_eq!(repo.short_description.as_deref(), Some("Generated text"));

    let mut docs_after: Vec<_> = h
        .store
        .current_documents(repo.id)
        .await
        .unwrap()
        .into_iter()
        .map(|d| d.id)
        .collect();
    docs_after.sort();
    assert_eq!(docs_after, docs_before);

    let result = h.pipeline.registry().get("second").unwrap().result.unwrap();
    assert_eq!(result["document_ids"], serde_json::json!([]));
}

#[tokio::test]
async fn test_orphaned_documents_trigger_full_analysis() {
    let url = "https://github.com/acme/orphaned";
    let repo_ref = RepoRef::parse(url).unwrap();

    let seed = MemoryStore::new();
    let repo = seed.create(Repository::from_ref(&repo_ref)).await.unwrap();
    seed.set_ai_summary(repo.id, "summary").await.unwrap();
    seed.set_short_description(repo.id, "description").await.unwrap();
    seed.create_analysis(CreateAnalysisRequest {
        repository_id: repo.id,
        stats: AnalysisStats::default(),
        tree_structure: Some("README.md\n".to_string()),
        content: "FILE: README.md\n".to_string(),
    })
    .await
    .unwrap();

    // A current document generated from an analysis that no longer exists.
    let mut state = seed.snapshot().await;
    state.documents.push(Document {
        id: Uuid::new_v4(),
        repository_id: repo.id,
        analysis_id: Some(Uuid::new_v4()),
        document_type: "architecture".to_string(),
        title: "Architecture".to_string(),
        description: "stale".to_string(),
        content: "stale".to_string(),
        is_current: true,
        version: 1,
        model_used: None,
        created_at: Utc::now(),
    });
    let store = MemoryStore::from_snapshot(state);

    let snapshot = ArtifactSnapshot::load(&store, &repo_ref.url).await.unwrap();
    assert!(snapshot.has_analysis);
    assert!(snapshot.has_tree_structure);
    assert!(snapshot.has_orphaned_documents);
    assert_eq!(next_action(&snapshot), NextAction::FullAnalysis);

    let work = find_work(&store, 10, ProcessType::AnalysisOnly).await.unwrap();
    assert_eq!(work.len(), 1);
    assert_eq!(work[0].repository.id, repo.id);
    assert_eq!(work[0].action, NextAction::FullAnalysis);
}

#[tokio::test]
async fn test_run_pending_processes_incomplete_repositories() {
    let h = harness();
    let done = "https://github.com/acme/done";
    h.pipeline.run("done", done, PipelineMode::Full).await;

    let fresh = RepoRef::parse("https://github.com/acme/fresh").unwrap();
    h.store.create(Repository::from_ref(&fresh)).await.unwrap();

    let coordinator = BatchCoordinator::new(h.pipeline.clone(), BatchConfig::default());
    let report = coordinator
        .run_pending(10, ProcessType::AnalysisAndDocs, 3)
        .await
        .unwrap();

    assert_eq!(report.total, 1);
    assert_eq!(report.successful, 1);
    assert_eq!(
        next_action(&snapshot(&h.store, &fresh.url).await),
        NextAction::AlreadyComplete
    );
}
