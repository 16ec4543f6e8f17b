//! # scribe-inference
//!
//! Generation backends for reposcribe.
//!
//! This crate provides:
//! - Ollama implementation of [`GenerationBackend`] (default)
//! - A deterministic mock backend with scripted failures (feature `mock`)
//!
//! # Feature Flags
//!
//! - `ollama` (default): Enable Ollama backend
//! - `mock`: Enable the mock backend for downstream tests
//! - `integration`: Enable tests that require a live Ollama server
//!
//! # Example
//!
//! ```rust,no_run
//! use scribe_inference::OllamaBackend;
//! use scribe_core::GenerationBackend;
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = OllamaBackend::from_env().unwrap();
//!     let summary = backend.generate("Summarize: fn main() {}").await.unwrap();
//!     println!("{}", summary);
//! }
//! ```

#[cfg(feature = "ollama")]
pub mod ollama;

// Mock generation backend for testing
#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export core types
pub use scribe_core::*;

#[cfg(feature = "ollama")]
pub use ollama::{OllamaBackend, OllamaConfig};

#[cfg(any(test, feature = "mock"))]
pub use mock::MockGenerationBackend;
