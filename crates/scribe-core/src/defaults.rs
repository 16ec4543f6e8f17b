//! Centralized default constants for the reposcribe pipeline.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates reference these constants instead of defining their own magic
//! numbers. Organized by domain area.

// =============================================================================
// SUMMARIZATION
// =============================================================================

/// Maximum characters per chunk handed to the summarization oracle.
pub const CHUNK_MAX_CHARS: usize = 1_200_000;

/// Fraction of a chunk window (from its end) searched for a natural break point.
pub const CHUNK_BREAK_SEARCH_FRACTION: f64 = 0.1;

/// Absolute ceiling for the final aggregation prompt, in characters.
pub const FINAL_PROMPT_MAX_CHARS: usize = 1_600_000;

/// Maximum length of the generated short description, in characters.
pub const DESCRIPTION_MAX_CHARS: usize = 150;

/// Characters of raw analysis kept on the repository record as a preview.
pub const CONTENT_PREVIEW_CHARS: usize = 1000;

/// Rough characters-per-token ratio used for token estimates.
pub const CHARS_PER_TOKEN: u64 = 4;

// =============================================================================
// INFERENCE
// =============================================================================

/// Default Ollama base URL.
pub const OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Default generation model name (Ollama).
pub const GEN_MODEL: &str = "gpt-oss:20b";

/// Timeout for generation requests in seconds.
///
/// Chunk prompts approach the context window of long-context models, so this
/// is well above a typical chat timeout.
pub const GEN_TIMEOUT_SECS: u64 = 300;

/// Timeout for backend health checks in seconds.
pub const HEALTH_TIMEOUT_SECS: u64 = 5;

/// Generation latency above which a slow-operation warning is logged.
pub const SLOW_GENERATION_MS: u64 = 30_000;

// =============================================================================
// JOB PROCESSING
// =============================================================================

/// Default number of work items processed concurrently per batch window.
pub const BATCH_WINDOW: usize = 3;

/// Default cap on repositories selected by a "needs processing" poll.
pub const PENDING_LIMIT: usize = 5;

/// Default job event broadcast channel capacity.
pub const EVENT_BUS_CAPACITY: usize = 256;

// =============================================================================
// INGESTION
// =============================================================================

/// Files larger than this are skipped during ingestion (10 MiB).
pub const MAX_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;

/// Leading bytes inspected when classifying a file as binary.
pub const BINARY_SNIFF_BYTES: usize = 8192;

// =============================================================================
// DOCUMENTS
// =============================================================================

/// Document types generated from the AI summary when none are requested.
pub const DEFAULT_DOCUMENT_TYPES: [&str; 3] = [
    "project_requirements_document",
    "app_flow_document",
    "tech_stack_document",
];

// =============================================================================
// SOCIAL
// =============================================================================

/// Hard character limit of a social post.
pub const SOCIAL_POST_MAX_CHARS: usize = 280;

/// Maximum description length embedded in a social post before trimming.
pub const SOCIAL_DESCRIPTION_MAX_CHARS: usize = 200;

/// Hashtags appended to every social post.
pub const SOCIAL_HASHTAGS: [&str; 4] = ["#OpenSource", "#GitHub", "#Developer", "#Code"];
