//! End-to-end behaviour of the chunked summarizer on a large input.
//!
//! Validates:
//! - A 3,000,000-char text with a 1,200,000-char budget splits into three chunks
//! - One failed chunk still yields a final summary from the aggregation call
//! - The aggregation prompt reports the failure and carries the placeholder

use std::sync::Arc;

use scribe_core::{AnalysisStats, Error};
use scribe_inference::MockGenerationBackend;
use scribe_jobs::{split, LargeTextSummarizer, SummarizerConfig, SummaryContext};

const TOTAL_CHARS: usize = 3_000_000;
const BUDGET: usize = 1_200_000;

fn large_text() -> String {
    "x".repeat(TOTAL_CHARS)
}

fn context() -> SummaryContext {
    SummaryContext::new("https://github.com/acme/huge").with_stats(AnalysisStats {
        total_characters: TOTAL_CHARS as u64,
        files_processed: 1,
        ..AnalysisStats::default()
    })
}

#[test]
fn test_three_million_chars_split_into_three_chunks() {
    let text = large_text();
    let chunks = split(&text, BUDGET);
    let sizes: Vec<usize> = chunks.iter().map(|c| c.char_count).collect();
    assert_eq!(sizes, vec![1_200_000, 1_200_000, 600_000]);
    assert!(chunks.iter().all(|c| c.total_count == 3));
}

#[tokio::test]
async fn test_middle_chunk_failure_still_summarizes() {
    let backend = MockGenerationBackend::new()
        .with_failure_on("CHUNK 2/3 CONTENT")
        .with_response_containing("Individual Chunk Summaries", "FINAL SUMMARY")
        .with_fixed_response("chunk summary");
    let summarizer = LargeTextSummarizer::new(
        Arc::new(backend.clone()),
        SummarizerConfig::default().with_chunk_max_chars(BUDGET),
    );

    let outcome = summarizer
        .summarize(&large_text(), &context())
        .await
        .unwrap();

    assert_eq!(outcome.final_summary, "FINAL SUMMARY");
    assert_eq!(outcome.chunk_count, 3);
    assert_eq!(outcome.successful_count, 2);
    assert_eq!(outcome.failed_count, 1);
    assert!(!outcome.truncated);
    assert!(!outcome.chunk_results[1].success);

    // Three chunk calls, then exactly one aggregation call.
    let prompts = backend.prompts();
    assert_eq!(prompts.len(), 4);
    let final_prompt = &prompts[3];
    assert!(final_prompt.contains("1 out of 3 chunks failed"));
    assert!(final_prompt.contains("Chunk 2 processing failed"));
    assert!(final_prompt.contains("--- Chunk 3/3 (600,000 chars) ---"));
}

#[tokio::test]
async fn test_every_chunk_failing_is_fatal() {
    let backend = MockGenerationBackend::new().with_failure_on("CONTENT:");
    let summarizer = LargeTextSummarizer::new(
        Arc::new(backend.clone()),
        SummarizerConfig::default().with_chunk_max_chars(BUDGET),
    );

    let err = summarizer
        .summarize(&large_text(), &context())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::AllChunksFailed { chunk_count: 3 }));
    assert_eq!(backend.generate_call_count(), 3);
}
