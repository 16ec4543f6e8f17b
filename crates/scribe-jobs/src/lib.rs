//! # scribe-jobs
//!
//! Asynchronous job pipeline and large-document summarization for reposcribe.
//!
//! This crate provides:
//! - A char-safe text splitter with priority-ordered break points
//! - Fan-out/fan-in summarization that tolerates failed chunks
//! - An in-memory task registry with progress events
//! - A stage reconciler that computes the minimal remaining work
//! - The per-repository pipeline driver and the batch coordinator
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use scribe_db::MemoryStore;
//! use scribe_inference::OllamaBackend;
//! use scribe_jobs::{
//!     BatchConfig, BatchCoordinator, IngestConfig, LocalCheckoutIngestor, PipelineBuilder,
//!     PipelineConfig,
//! };
//!
//! let pipeline = PipelineBuilder::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(OllamaBackend::from_env()?),
//!     Arc::new(LocalCheckoutIngestor::new(IngestConfig::from_env("./checkouts"))),
//! )
//! .config(PipelineConfig::from_env())
//! .build();
//!
//! // Single repository in the background
//! let handle = pipeline.spawn("job-1", "https://github.com/tokio-rs/tokio", Default::default());
//! let status = handle.join().await;
//!
//! // Many repositories, three at a time
//! let batch = BatchCoordinator::new(pipeline, BatchConfig::default());
//! let report = batch.run_batch(&urls, 3).await;
//! println!("{}/{} succeeded", report.successful, report.total);
//! ```

pub mod batch;
pub mod derived;
pub mod describe;
pub mod documents;
pub mod ingest;
pub mod pipeline;
pub mod reconciler;
pub mod registry;
pub mod splitter;
pub mod summarizer;
pub mod text;

// Re-export core types
pub use scribe_core::*;

pub use batch::{BatchConfig, BatchCoordinator, BatchReport, BatchStatus};
pub use derived::{compose_social_post, DerivedArtifacts, DerivedOutcome, PartialFailure};
pub use describe::{DescribeContext, ShortDescriber};
pub use documents::OracleDocumentGenerator;
pub use ingest::{IngestConfig, LocalCheckoutIngestor};
pub use pipeline::{
    entry_stage, Pipeline, PipelineBuilder, PipelineConfig, PipelineHandle, PipelineMode,
    PipelineResult, Stage,
};
pub use reconciler::{find_work, next_action, NextAction, ProcessType, WorkItem};
pub use registry::{JobEvent, JobUpdate, TaskRegistry};
pub use splitter::{split, try_split, Chunk};
pub use summarizer::{
    ChunkSummary, LargeTextSummarizer, SummarizerConfig, SummaryContext, SummaryOutcome,
};
