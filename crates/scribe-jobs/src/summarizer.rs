//! Fan-out/fan-in summarization of arbitrarily large text.
//!
//! The text is split into bounded chunks, every chunk is summarized
//! concurrently, and the per-chunk summaries are aggregated by one final
//! oracle call. Individual chunk failures are replaced by a placeholder and
//! only fail the whole operation when every chunk failed.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace, warn};

use scribe_core::{defaults, AnalysisStats, Error, GenerationBackend, Result};

use crate::splitter::{self, Chunk};
use crate::text::{format_thousands, truncate_chars};

/// System prompt used for both the chunk and the aggregation calls.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an expert code reviewer and software architect. \
Analyze the provided repository content and create a comprehensive summary that helps developers understand:
1. What this codebase does (purpose and functionality)
2. Key architecture and technology choices
3. Main components and how they interact
4. Notable patterns, configurations, or design decisions
5. Overall code structure and organization

Make your summary clear, technical, and actionable for developers who need to understand or work with this codebase.";

/// Configuration for [`LargeTextSummarizer`].
#[derive(Debug, Clone)]
pub struct SummarizerConfig {
    /// Maximum characters per chunk.
    pub chunk_max_chars: usize,
    /// Hard ceiling for the aggregation prompt.
    pub final_prompt_max_chars: usize,
    pub system_prompt: String,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            chunk_max_chars: defaults::CHUNK_MAX_CHARS,
            final_prompt_max_chars: defaults::FINAL_PROMPT_MAX_CHARS,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl SummarizerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `SCRIBE_CHUNK_MAX_CHARS` | `1200000` |
    /// | `SCRIBE_FINAL_PROMPT_MAX_CHARS` | `1600000` |
    pub fn from_env() -> Self {
        let chunk_max_chars = std::env::var("SCRIBE_CHUNK_MAX_CHARS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(defaults::CHUNK_MAX_CHARS);

        let final_prompt_max_chars = std::env::var("SCRIBE_FINAL_PROMPT_MAX_CHARS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(defaults::FINAL_PROMPT_MAX_CHARS);

        Self {
            chunk_max_chars,
            final_prompt_max_chars,
            ..Self::default()
        }
    }

    pub fn with_chunk_max_chars(mut self, chars: usize) -> Self {
        self.chunk_max_chars = chars;
        self
    }

    pub fn with_final_prompt_max_chars(mut self, chars: usize) -> Self {
        self.final_prompt_max_chars = chars;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }
}

/// Repository metadata included in every prompt.
#[derive(Debug, Clone, Default)]
pub struct SummaryContext {
    pub repository_url: String,
    pub stats: AnalysisStats,
    pub tree_structure: Option<String>,
}

impl SummaryContext {
    pub fn new(repository_url: impl Into<String>) -> Self {
        Self {
            repository_url: repository_url.into(),
            ..Self::default()
        }
    }

    pub fn with_stats(mut self, stats: AnalysisStats) -> Self {
        self.stats = stats;
        self
    }

    pub fn with_tree(mut self, tree: Option<String>) -> Self {
        self.tree_structure = tree;
        self
    }

    fn overview(&self) -> String {
        let s = &self.stats;
        let tree = match self.tree_structure.as_deref() {
            Some(tree) if !tree.is_empty() => format!("DIRECTORY TREE:\n{}", tree),
            _ => "DIRECTORY TREE: Not available".to_string(),
        };
        format!(
            "REPOSITORY OVERVIEW:\n\
             URL: {url}\n\n\
             STATISTICS:\n\
             - Files processed: {files_processed}\n\
             - Binary files skipped: {binary}\n\
             - Large files skipped: {large}\n\
             - Encoding errors: {encoding}\n\
             - Total characters: {chars}\n\
             - Total lines: {lines}\n\
             - Total files found: {files}\n\
             - Total directories: {dirs}\n\n\
             {tree}\n\n\
             ---\n",
            url = self.repository_url,
            files_processed = s.files_processed,
            binary = s.binary_files_skipped,
            large = s.large_files_skipped,
            encoding = s.encoding_errors,
            chars = format_thousands(s.total_characters),
            lines = format_thousands(s.total_lines),
            files = s.total_files,
            dirs = s.total_directories,
            tree = tree,
        )
    }
}

/// Outcome of summarizing one chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkSummary {
    /// 1-based chunk position.
    pub index: usize,
    pub total_count: usize,
    /// Oracle output, or a placeholder describing the failure.
    pub summary_text: String,
    pub char_count: usize,
    pub success: bool,
    pub error: Option<String>,
}

/// Result of a successful [`LargeTextSummarizer::summarize`] call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryOutcome {
    pub final_summary: String,
    pub chunk_count: usize,
    pub successful_count: usize,
    pub failed_count: usize,
    pub chunk_results: Vec<ChunkSummary>,
    /// Length of the aggregation prompt actually sent, in chars.
    pub final_prompt_chars: usize,
    /// The aggregation prompt hit the ceiling and was cut.
    pub truncated: bool,
}

/// Summarizes text of any size through a size-limited generation backend.
pub struct LargeTextSummarizer {
    backend: Arc<dyn GenerationBackend>,
    config: SummarizerConfig,
}

impl LargeTextSummarizer {
    pub fn new(backend: Arc<dyn GenerationBackend>, config: SummarizerConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &SummarizerConfig {
        &self.config
    }

    /// Summarize `text`.
    ///
    /// Issues one oracle call per chunk plus one aggregation call. Fails with
    /// [`Error::AllChunksFailed`] (without aggregating) when no chunk succeeded,
    /// and propagates any error from the aggregation call.
    #[instrument(
        skip(self, text, context),
        fields(
            subsystem = "jobs",
            component = "summarizer",
            op = "summarize",
            repo_url = %context.repository_url,
            text_len = text.len(),
        )
    )]
    pub async fn summarize(&self, text: &str, context: &SummaryContext) -> Result<SummaryOutcome> {
        let start = Instant::now();
        let chunks = splitter::try_split(text, self.config.chunk_max_chars)?;
        let chunk_count = chunks.len();
        let overview = context.overview();

        info!(
            chunk_count,
            chunk_max_chars = self.config.chunk_max_chars,
            "Processing chunks of repository data"
        );

        let chunk_results: Vec<ChunkSummary> = join_all(
            chunks
                .iter()
                .map(|chunk| self.summarize_chunk(chunk, &overview)),
        )
        .await;

        let failed: Vec<usize> = chunk_results
            .iter()
            .filter(|c| !c.success)
            .map(|c| c.index)
            .collect();
        let failed_count = failed.len();
        let successful_count = chunk_count - failed_count;

        info!(
            successful_count,
            failed_count, chunk_count, "Chunk processing complete"
        );

        if failed_count > 0 {
            warn!(failed_chunks = ?failed, "Some chunks failed to summarize");
            if failed_count == chunk_count {
                return Err(Error::AllChunksFailed { chunk_count });
            }
        }

        let prompt = self.final_prompt(context, &chunk_results, successful_count, failed_count);
        let prompt_chars = prompt.chars().count();
        let (prompt, truncated) = truncate_chars(&prompt, self.config.final_prompt_max_chars);
        if truncated {
            warn!(
                prompt_chars,
                max_chars = self.config.final_prompt_max_chars,
                "Final summary prompt too long, truncating"
            );
        }
        let final_prompt_chars = if truncated {
            self.config.final_prompt_max_chars
        } else {
            prompt_chars
        };

        let final_summary = self
            .backend
            .generate_with_system(&self.config.system_prompt, prompt)
            .await?;

        info!(
            chunk_count,
            final_prompt_chars,
            response_len = final_summary.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Repository summary generated"
        );

        Ok(SummaryOutcome {
            final_summary,
            chunk_count,
            successful_count,
            failed_count,
            chunk_results,
            final_prompt_chars,
            truncated,
        })
    }

    async fn summarize_chunk(&self, chunk: &Chunk<'_>, overview: &str) -> ChunkSummary {
        let prompt = chunk_prompt(chunk, overview);
        trace!(
            chunk = chunk.index,
            chunk_chars = chunk.char_count,
            prompt_len = prompt.len(),
            "Summarizing chunk"
        );

        match self
            .backend
            .generate_with_system(&self.config.system_prompt, &prompt)
            .await
        {
            Ok(summary) => {
                debug!(
                    chunk = chunk.index,
                    response_len = summary.len(),
                    "Chunk summarized"
                );
                ChunkSummary {
                    index: chunk.index,
                    total_count: chunk.total_count,
                    summary_text: summary,
                    char_count: chunk.char_count,
                    success: true,
                    error: None,
                }
            }
            Err(e) => {
                warn!(chunk = chunk.index, error = %e, "Error processing chunk");
                ChunkSummary {
                    index: chunk.index,
                    total_count: chunk.total_count,
                    summary_text: format!(
                        "Chunk {} processing failed ({}). This chunk contained {} characters \
                         of repository content that could not be analyzed automatically.",
                        chunk.index,
                        e,
                        format_thousands(chunk.char_count as u64)
                    ),
                    char_count: chunk.char_count,
                    success: false,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    fn final_prompt(
        &self,
        context: &SummaryContext,
        results: &[ChunkSummary],
        successful_count: usize,
        failed_count: usize,
    ) -> String {
        let chunk_count = results.len();
        let s = &context.stats;

        let status = if failed_count > 0 {
            format!(
                "IMPORTANT: {} out of {} chunks failed to process due to errors. The analysis \
                 below is based on {} successfully processed chunks. Please note this \
                 limitation in your summary.",
                failed_count, chunk_count, successful_count
            )
        } else {
            format!("All {} chunks were successfully processed.", chunk_count)
        };

        let combined = results
            .iter()
            .map(|c| {
                format!(
                    "--- Chunk {}/{} ({} chars) ---\n{}",
                    c.index,
                    c.total_count,
                    format_thousands(c.char_count as u64),
                    c.summary_text
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let tree = context
            .tree_structure
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or("Detailed structure not available");

        format!(
            "You are creating a comprehensive summary of a repository that was analyzed in \
             {chunk_count} chunks.\n\n\
             Below are the individual summaries for each chunk. Your task is to create a \
             unified, comprehensive summary that:\n\
             1. Captures the overall purpose and functionality of the repository\n\
             2. Highlights the main components and their relationships\n\
             3. Describes the technology stack and architecture\n\
             4. Notes any important patterns, configurations, or notable features\n\
             5. Provides a clear understanding of what this codebase does and how it's structured\n\
             6. If some chunks failed to process, acknowledge this limitation but provide the \
             best analysis possible from available data\n\n\
             Repository Information:\n\
             - URL: {url}\n\
             - Files processed: {files_processed}\n\
             - Total characters: {chars}\n\
             - Total lines: {lines}\n\
             - Total files in structure: {files}\n\
             - Total directories: {dirs}\n\
             - Chunks analyzed: {chunk_count}\n\
             - Successful chunks: {successful_count}\n\
             - Failed chunks: {failed_count}\n\n\
             Repository Structure:\n\
             {tree}\n\n\
             {status}\n\n\
             Individual Chunk Summaries:\n\
             {combined}",
            url = context.repository_url,
            files_processed = s.files_processed,
            chars = format_thousands(s.total_characters),
            lines = format_thousands(s.total_lines),
            files = s.total_files,
            dirs = s.total_directories,
        )
    }
}

fn chunk_prompt(chunk: &Chunk<'_>, overview: &str) -> String {
    format!(
        "You are analyzing chunk {i} of {n} from a repository.\n\
         The repository overview, statistics, and structure are provided for context.\n\
         Focus on the key components, functionality, and structure in this specific chunk.\n\
         Keep your summary comprehensive but concise, and relate it to the overall repository \
         structure when relevant.\n\n\
         {overview}\n\
         CHUNK {i}/{n} CONTENT:\n\
         {text}",
        i = chunk.index,
        n = chunk.total_count,
        overview = overview,
        text = chunk.text,
    )
}
