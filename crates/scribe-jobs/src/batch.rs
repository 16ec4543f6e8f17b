//! Batch coordination: run the pipeline over many repositories in
//! fixed-size concurrency windows.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use scribe_core::{defaults, JobStatus, RepoRef, Result};

use crate::pipeline::{Pipeline, PipelineMode};
use crate::reconciler::{find_work, ProcessType};

/// Configuration for [`BatchCoordinator`].
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Items processed concurrently per window.
    pub window: usize,
    /// Default cap for [`BatchCoordinator::run_pending`].
    pub pending_limit: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            window: defaults::BATCH_WINDOW,
            pending_limit: defaults::PENDING_LIMIT,
        }
    }
}

impl BatchConfig {
    /// Reads `SCRIBE_BATCH_WINDOW` (default `3`) and `SCRIBE_PENDING_LIMIT`.
    pub fn from_env() -> Self {
        let window = std::env::var("SCRIBE_BATCH_WINDOW")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::BATCH_WINDOW)
            .max(1);
        let pending_limit = std::env::var("SCRIBE_PENDING_LIMIT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::PENDING_LIMIT);
        Self {
            window,
            pending_limit,
        }
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window.max(1);
        self
    }

    pub fn with_pending_limit(mut self, limit: usize) -> Self {
        self.pending_limit = limit;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Pending,
    Processing,
    Completed,
}

/// Aggregate outcome of a batch. `processed == successful + failed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub batch_name: String,
    pub status: BatchStatus,
    pub total: usize,
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
    /// Number of windows run.
    pub windows: usize,
    pub job_ids: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl BatchReport {
    fn new(batch_name: String, total: usize) -> Self {
        Self {
            batch_id: Uuid::new_v4(),
            batch_name,
            status: BatchStatus::Pending,
            total,
            processed: 0,
            successful: 0,
            failed: 0,
            windows: 0,
            job_ids: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    fn record(&mut self, status: JobStatus) {
        self.processed += 1;
        if status == JobStatus::Success {
            self.successful += 1;
        } else {
            self.failed += 1;
        }
    }
}

/// Fans a [`Pipeline`] out across many repositories.
pub struct BatchCoordinator {
    pipeline: Pipeline,
    config: BatchConfig,
}

impl BatchCoordinator {
    pub fn new(pipeline: Pipeline, config: BatchConfig) -> Self {
        Self { pipeline, config }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Process `repo_urls` in windows of `window` items (`0` is treated as `1`).
    ///
    /// Every item of a window runs concurrently and the whole window is
    /// awaited before the next starts. Invalid URLs are counted as failed
    /// without creating a job. One item failing never stops the batch.
    pub async fn run_batch(&self, repo_urls: &[String], window: usize) -> BatchReport {
        self.run_batch_with_mode(repo_urls, window, PipelineMode::Full)
            .await
    }

    #[instrument(skip(self, repo_urls), fields(subsystem = "jobs", component = "batch", op = "run_batch", total = repo_urls.len()))]
    pub async fn run_batch_with_mode(
        &self,
        repo_urls: &[String],
        window: usize,
        mode: PipelineMode,
    ) -> BatchReport {
        let window = window.max(1);
        let mut report = BatchReport::new(
            format!("Batch {}", Utc::now().format("%Y-%m-%d %H:%M:%S")),
            repo_urls.len(),
        );
        report.status = BatchStatus::Processing;
        info!(batch_id = %report.batch_id, window, "Starting batch");

        let registry = self.pipeline.registry();
        for (window_index, items) in repo_urls.chunks(window).enumerate() {
            report.windows += 1;
            info!(
                batch_id = %report.batch_id,
                window = window_index + 1,
                size = items.len(),
                "Processing batch window"
            );

            let mut runs = Vec::with_capacity(items.len());
            for url in items {
                if let Err(e) = RepoRef::parse(url) {
                    warn!(url = %url, error = %e, "Rejected repository URL");
                    report.record(JobStatus::Failure);
                    continue;
                }
                let job_id = Uuid::new_v4().to_string();
                registry.create(job_id.clone());
                report.job_ids.push(job_id.clone());
                runs.push(async move {
                    self.pipeline.run(&job_id, url, mode).await;
                    job_id
                });
            }

            for job_id in join_all(runs).await {
                let status = registry
                    .get(&job_id)
                    .map(|r| r.status)
                    .unwrap_or(JobStatus::Failure);
                report.record(status);
            }

            info!(
                batch_id = %report.batch_id,
                processed = report.processed,
                successful = report.successful,
                failed = report.failed,
                "Batch window complete"
            );
        }

        report.status = BatchStatus::Completed;
        report.completed_at = Some(Utc::now());
        info!(
            batch_id = %report.batch_id,
            total = report.total,
            successful = report.successful,
            failed = report.failed,
            "Batch complete"
        );
        report
    }

    /// Find repositories that still need work and process them comprehensively.
    #[instrument(skip(self), fields(subsystem = "jobs", component = "batch", op = "run_pending"))]
    pub async fn run_pending(
        &self,
        limit: usize,
        process_type: ProcessType,
        window: usize,
    ) -> Result<BatchReport> {
        let items = find_work(self.pipeline.store().as_ref(), limit, process_type).await?;
        let urls: Vec<String> = items.into_iter().map(|i| i.repository.repo_url).collect();
        Ok(self
            .run_batch_with_mode(&urls, window, PipelineMode::Comprehensive)
            .await)
    }

    /// [`Self::run_pending`] with the configured limit and window.
    pub async fn run_pending_default(&self, process_type: ProcessType) -> Result<BatchReport> {
        self.run_pending(self.config.pending_limit, process_type, self.config.window)
            .await
    }

    /// [`Self::run_batch`] with the configured window.
    pub async fn run_batch_default(&self, repo_urls: &[String]) -> BatchReport {
        self.run_batch(repo_urls, self.config.window).await
    }
}
