//! # scribe-db
//!
//! Persistence layer for reposcribe.
//!
//! This crate provides:
//! - `MemoryStore`, an in-process [`RepositoryStore`] implementation
//! - JSON snapshot load/save so state survives between CLI runs
//!
//! ## Example
//!
//! ```rust,ignore
//! use scribe_db::{MemoryStore, Repository, RepoRef, RepositoryStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MemoryStore::load("state.json").await?;
//!     let repo_ref = RepoRef::parse("https://github.com/tokio-rs/tokio")?;
//!     store.create(Repository::from_ref(&repo_ref)).await?;
//!     store.save("state.json").await?;
//!     Ok(())
//! }
//! ```
pub mod memory;

// Re-export core types
pub use scribe_core::*;

pub use memory::{MemoryStore, StoreSnapshot};
