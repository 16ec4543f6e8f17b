//! # scribe-core
//!
//! Core types, traits, and abstractions for the reposcribe pipeline.
//!
//! This crate provides the foundational data structures (job records,
//! repositories, analyses, documents, artifact snapshots) and the trait
//! definitions for every external collaborator the pipeline talks to:
//! the generation backend used as the summarization oracle, persistence,
//! ingestion, document generation, forking, and social posting.

pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod repo_ref;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use repo_ref::RepoRef;
pub use traits::*;
