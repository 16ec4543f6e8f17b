//! Short description generation from an AI summary.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use scribe_core::{defaults, Error, GenerationBackend, Result};

use crate::text::truncate_with_ellipsis;

/// Repository identity included in the description prompt.
#[derive(Debug, Clone, Default)]
pub struct DescribeContext {
    pub name: String,
    pub author: String,
    pub repository_url: String,
}

/// Condenses a long summary into a one-line description.
pub struct ShortDescriber {
    backend: Arc<dyn GenerationBackend>,
    max_chars: usize,
}

impl ShortDescriber {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self {
            backend,
            max_chars: defaults::DESCRIPTION_MAX_CHARS,
        }
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars.max(4);
        self
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Generate a description of at most `max_chars` chars.
    #[instrument(skip_all, fields(subsystem = "jobs", component = "describer", op = "describe", summary_len = summary.len()))]
    pub async fn describe(&self, summary: &str, context: Option<&DescribeContext>) -> Result<String> {
        let system = self.system_prompt();
        let prompt = user_prompt(summary, context);

        let raw = self.backend.generate_with_system(&system, &prompt).await?;
        let cleaned = strip_wrapping_quotes(raw.trim());
        if cleaned.is_empty() {
            return Err(Error::Inference(
                "Empty short description from generation backend".to_string(),
            ));
        }

        let length = cleaned.chars().count();
        if length > self.max_chars {
            warn!(
                length,
                max_chars = self.max_chars,
                "Generated description exceeds max length, truncating"
            );
        }
        let description = truncate_with_ellipsis(cleaned, self.max_chars);
        info!(
            length = description.chars().count(),
            "Generated short description"
        );
        Ok(description)
    }

    fn system_prompt(&self) -> String {
        format!(
            "You are an expert at creating concise, compelling descriptions from technical content.\n\n\
             Your task is to create a short description (maximum {max} characters) from a detailed \
             repository summary.\n\n\
             Requirements:\n\
             1. Keep it under {max} characters\n\
             2. Focus on what the project DOES, not how it's built\n\
             3. Make it engaging and clear for developers\n\
             4. Use active voice and present tense\n\
             5. No technical jargon unless essential\n\
             6. Start with a strong verb or \"A tool/library/framework that...\"\n\n\
             Examples of good short descriptions:\n\
             - \"A modern REST API for managing GitHub repositories with AI-powered analysis\"\n\
             - \"Real-time chat application built with WebSocket and Redis\"\n\
             - \"CLI tool that converts Markdown files to beautiful PDFs\"\n\n\
             Create a short, engaging description that would make a developer want to learn more.",
            max = self.max_chars
        )
    }
}

fn user_prompt(summary: &str, context: Option<&DescribeContext>) -> String {
    let body = format!("REPOSITORY SUMMARY TO CONDENSE:\n{}\n", summary);
    match context {
        Some(ctx) => format!(
            "REPOSITORY CONTEXT:\nName: {name}\nAuthor: {author}\nURL: {url}\n\n{body}\n\n\
             Focus on creating a description that represents what \"{name}\" does in a compelling way.",
            name = ctx.name,
            author = ctx.author,
            url = ctx.repository_url,
            body = body,
        ),
        None => body,
    }
}

fn strip_wrapping_quotes(s: &str) -> &str {
    for quote in ['"', '\''] {
        if s.len() >= 2 && s.starts_with(quote) && s.ends_with(quote) {
            return s[1..s.len() - 1].trim();
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use scribe_inference::MockGenerationBackend;

    fn describer(response: &str) -> (ShortDescriber, MockGenerationBackend) {
        let backend = MockGenerationBackend::new().with_fixed_response(response);
        (ShortDescriber::new(Arc::new(backend.clone())), backend)
    }

    #[tokio::test]
    async fn test_strips_quotes_and_whitespace() {
        let (d, _) = describer("  \"A fast async runtime for Rust\"\n");
        assert_eq!(
            d.describe("summary", None).await.unwrap(),
            "A fast async runtime for Rust"
        );
    }

    #[tokio::test]
    async fn test_truncates_long_output() {
        let long = "word ".repeat(60);
        let (d, _) = describer(&long);
        let description = d.describe("summary", None).await.unwrap();
        assert!(description.chars().count() <= 150);
        assert!(description.ends_with("..."));
    }

    #[tokio::test]
    async fn test_custom_max_chars() {
        let (d, _) = describer("abcdefghijklmnopqrstuvwxyz");
        let d = d.with_max_chars(10);
        assert_eq!(d.describe("s", None).await.unwrap(), "abcdefg...");
    }

    #[tokio::test]
    async fn test_empty_response_is_error() {
        let (d, _) = describer("\"\"");
        assert!(d.describe("summary", None).await.is_err());
    }

    #[tokio::test]
    async fn test_prompt_includes_context() {
        let (d, backend) = describer("ok");
        let ctx = DescribeContext {
            name: "tokio".to_string(),
            author: "tokio-rs".to_string(),
            repository_url: "https://github.com/tokio-rs/tokio".to_string(),
        };
        d.describe("the summary", Some(&ctx)).await.unwrap();

        let call = &backend.get_calls()[0];
        assert!(call.system.contains("maximum 150 characters"));
        assert!(call.input.contains("Name: tokio"));
        assert!(call.input.contains("the summary"));
        assert!(call.input.contains("what \"tokio\" does"));
    }
}
