//! Document generation from an AI summary.
//!
//! Each document type is one oracle call; all types are generated
//! concurrently and fail independently.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{info, instrument, warn};

use scribe_core::{
    defaults, DocumentBatch, DocumentContext, DocumentFailure, DocumentGenerator, Error,
    GenerationBackend, NewDocument, Result,
};

use crate::text::format_thousands;

const ACRONYMS: [&str; 12] = [
    "api", "url", "id", "http", "https", "ui", "ux", "html", "css", "js", "json", "xml",
];

/// [`DocumentGenerator`] backed by a generation backend.
pub struct OracleDocumentGenerator {
    backend: Arc<dyn GenerationBackend>,
    document_types: Vec<String>,
}

impl OracleDocumentGenerator {
    /// Generator for the default document set.
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self {
            backend,
            document_types: defaults::DEFAULT_DOCUMENT_TYPES
                .iter()
                .map(|t| t.to_string())
                .collect(),
        }
    }

    pub fn with_document_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.document_types = types.into_iter().map(Into::into).collect();
        self
    }

    async fn generate_one(
        &self,
        document_type: &str,
        summary: &str,
        context: &DocumentContext,
    ) -> Result<NewDocument> {
        let system = system_prompt_for(document_type);
        let prompt = document_prompt(summary, context);
        let content = self.backend.generate_with_system(&system, &prompt).await?;
        if content.trim().is_empty() {
            return Err(Error::Inference(format!(
                "No document content generated for {}",
                document_type
            )));
        }
        Ok(NewDocument {
            document_type: document_type.to_string(),
            title: document_title(document_type),
            description: document_description(document_type),
            content,
            model_used: Some(self.backend.model_name().to_string()),
        })
    }
}

#[async_trait]
impl DocumentGenerator for OracleDocumentGenerator {
    fn document_types(&self) -> Vec<String> {
        self.document_types.clone()
    }

    #[instrument(skip_all, fields(subsystem = "jobs", component = "documents", op = "generate", repo_url = %context.repository_url))]
    async fn generate(&self, summary: &str, context: &DocumentContext) -> DocumentBatch {
        let results = join_all(
            self.document_types
                .iter()
                .map(|t| self.generate_one(t, summary, context)),
        )
        .await;

        let mut batch = DocumentBatch::default();
        for (document_type, result) in self.document_types.iter().zip(results) {
            match result {
                Ok(doc) => batch.documents.push(doc),
                Err(e) => {
                    warn!(document_type = %document_type, error = %e, "Document generation failed");
                    batch.failures.push(DocumentFailure {
                        document_type: document_type.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            generated = batch.documents.len(),
            failed = batch.failures.len(),
            "Completed document generation"
        );
        batch
    }
}

/// `snake_case` type name to a display name, keeping known acronyms upper-case.
pub fn display_name(document_type: &str) -> String {
    document_type
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            if ACRONYMS.contains(&word.to_ascii_lowercase().as_str()) {
                word.to_ascii_uppercase()
            } else {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                    None => String::new(),
                }
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn document_title(document_type: &str) -> String {
    display_name(document_type)
}

pub fn document_description(document_type: &str) -> String {
    match document_type {
        "project_requirements_document" => {
            "Comprehensive project requirements document generated from codebase analysis"
                .to_string()
        }
        "app_flow_document" => {
            "Detailed application flow and architecture document generated from codebase analysis"
                .to_string()
        }
        "tech_stack_document" => {
            "Complete technology stack documentation generated from codebase analysis".to_string()
        }
        other => format!("AI-generated {} document", display_name(other).to_lowercase()),
    }
}

fn system_prompt_for(document_type: &str) -> String {
    match document_type {
        "project_requirements_document" => "You are a technical documentation specialist.\n\
            Create a comprehensive project requirements document based on the repository content that includes:\n\
            1. Project Overview and Objectives\n\
            2. Functional Requirements\n\
            3. Non-functional Requirements\n\
            4. Technical Requirements\n\
            5. Dependencies and Prerequisites\n\
            6. Assumptions and Constraints\n\
            7. Success Criteria\n\n\
            Make the document clear, structured, and actionable for project managers and developers."
            .to_string(),
        "app_flow_document" => "You are a software architect and technical documentation specialist.\n\
            Analyze the repository and create a detailed application flow document that includes:\n\
            1. High-level Architecture Overview\n\
            2. Component Interaction Diagram (text-based)\n\
            3. Data Flow Description\n\
            4. User Journey/Workflow\n\
            5. API Endpoints and Interactions\n\
            6. Database Schema Overview\n\
            7. External Service Integrations\n\
            8. Error Handling and Fallbacks\n\n\
            Focus on how data and control flow through the application. Be specific and technical."
            .to_string(),
        "tech_stack_document" => "You are a technical lead and documentation specialist.\n\
            Create a comprehensive technology stack document based on the repository that includes:\n\
            1. Programming Languages and Versions\n\
            2. Frameworks and Libraries (with versions)\n\
            3. Database Technologies\n\
            4. Infrastructure and Deployment Tools\n\
            5. Development and Build Tools\n\
            6. Testing Frameworks and Tools\n\
            7. Monitoring and Observability Tools\n\
            8. Third-party Services and APIs\n\
            9. Security Tools and Practices\n\
            10. DevOps and CI/CD Tools\n\n\
            Include version information where available and explain the purpose of each technology."
            .to_string(),
        other => format!(
            "You are a technical documentation specialist.\n\
             Create a comprehensive {} based on the repository content.\n\
             Make the document clear, structured, and actionable for developers and stakeholders.",
            display_name(other).to_lowercase()
        ),
    }
}

fn document_prompt(summary: &str, context: &DocumentContext) -> String {
    let s = &context.stats;
    let mut prompt = format!(
        "REPOSITORY INFORMATION:\n\
         URL: {url}\n\
         Name: {name}\n\
         Author: {author}\n\n\
         REPOSITORY STATISTICS:\n\
         - Files processed: {files_processed}\n\
         - Binary files skipped: {binary}\n\
         - Large files skipped: {large}\n\
         - Encoding errors: {encoding}\n\
         - Total characters: {chars}\n\
         - Total lines: {lines}\n\
         - Total files found: {files}\n\
         - Total directories: {dirs}\n",
        url = context.repository_url,
        name = context.name,
        author = context.author,
        files_processed = s.files_processed,
        binary = s.binary_files_skipped,
        large = s.large_files_skipped,
        encoding = s.encoding_errors,
        chars = format_thousands(s.total_characters),
        lines = format_thousands(s.total_lines),
        files = s.total_files,
        dirs = s.total_directories,
    );
    if let Some(tree) = context.tree_structure.as_deref().filter(|t| !t.is_empty()) {
        prompt.push_str("\nANALYSIS DATA:\n");
        prompt.push_str(tree);
        prompt.push('\n');
    }
    prompt.push_str("\nREPOSITORY AI SUMMARY:\n");
    prompt.push_str(summary);
    prompt
}
