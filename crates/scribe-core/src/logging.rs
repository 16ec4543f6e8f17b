//! Structured logging schema and field name constants for reposcribe.
//!
//! All crates use these names for structured `tracing` fields so log
//! aggregation can query by the same keys across subsystems.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Stage failure, job marked failed |
//! | WARN  | Recoverable issue, fallback applied (failed chunk, partial document set) |
//! | INFO  | Lifecycle events (job start/finish, batch windows), stage completions |
//! | DEBUG | Decision points (reconciler action, chunk boundaries, config choices) |
//! | TRACE | Per-chunk iteration, prompt sizes |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "jobs", "inference", "db", "cli"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "pipeline", "summarizer", "registry", "batch", "ollama"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "run", "summarize", "generate", "ingest"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Job id being processed.
pub const JOB_ID: &str = "job_id";

/// Repository UUID being operated on.
pub const REPOSITORY_ID: &str = "repository_id";

/// Repository URL being operated on.
pub const REPO_URL: &str = "repo_url";

/// Batch UUID.
pub const BATCH_ID: &str = "batch_id";

/// Pipeline stage name.
pub const STAGE: &str = "stage";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of chunks processed.
pub const CHUNK_COUNT: &str = "chunk_count";

/// Character length of a prompt.
pub const PROMPT_LEN: &str = "prompt_len";

/// Character length of a model response.
pub const RESPONSE_LEN: &str = "response_len";

/// Progress percentage reported to the task registry.
pub const PROGRESS: &str = "progress";

// ─── Inference fields ──────────────────────────────────────────────────────

/// Model name used for inference.
pub const MODEL: &str = "model";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// Slow operation threshold exceeded.
pub const SLOW: &str = "slow";
