//! Stage reconciliation: decide what a work item still needs.
//!
//! [`next_action`] is a pure function of an [`ArtifactSnapshot`]; the only I/O
//! happens when the snapshot is loaded. Because the decision is recomputed
//! from persisted state each time, re-running the pipeline for the same work
//! item only redoes what is missing.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use scribe_core::{ArtifactSnapshot, Repository, RepositoryStore, Result};

/// The single remaining action for a work item, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextAction {
    FullAnalysis,
    GenerateSummaryAndDescription,
    GenerateDocuments,
    AlreadyComplete,
}

impl NextAction {
    pub fn as_str(self) -> &'static str {
        match self {
            NextAction::FullAnalysis => "full_analysis",
            NextAction::GenerateSummaryAndDescription => "generate_summary_and_description",
            NextAction::GenerateDocuments => "generate_documents",
            NextAction::AlreadyComplete => "already_complete",
        }
    }
}

impl std::fmt::Display for NextAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which kinds of work a polling run picks up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessType {
    /// Only items that need a full analysis.
    AnalysisOnly,
    /// Only items that need documents.
    DocsOnly,
    /// Anything that is not complete.
    #[default]
    AnalysisAndDocs,
}

impl ProcessType {
    /// Whether an item with this pending action is selected.
    pub fn accepts(self, action: NextAction) -> bool {
        match self {
            ProcessType::AnalysisOnly => action == NextAction::FullAnalysis,
            ProcessType::DocsOnly => action == NextAction::GenerateDocuments,
            ProcessType::AnalysisAndDocs => action != NextAction::AlreadyComplete,
        }
    }
}

impl std::str::FromStr for ProcessType {
    type Err = scribe_core::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "analysis_only" => Ok(ProcessType::AnalysisOnly),
            "docs_only" => Ok(ProcessType::DocsOnly),
            "analysis_and_docs" => Ok(ProcessType::AnalysisAndDocs),
            other => Err(scribe_core::Error::InvalidInput(format!(
                "unknown process type '{}'",
                other
            ))),
        }
    }
}

/// Decide the next action. First match wins.
pub fn next_action(snapshot: &ArtifactSnapshot) -> NextAction {
    if !snapshot.known
        || !snapshot.has_analysis
        || !snapshot.has_tree_structure
        || snapshot.has_orphaned_documents
    {
        return NextAction::FullAnalysis;
    }
    if !snapshot.has_ai_summary || !snapshot.has_short_description {
        return NextAction::GenerateSummaryAndDescription;
    }
    if snapshot.document_count == 0 {
        return NextAction::GenerateDocuments;
    }
    NextAction::AlreadyComplete
}

/// A repository selected for processing.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub repository: Repository,
    pub action: NextAction,
}

/// Find repositories that still need work, most urgent first.
///
/// Ordered by action priority, then oldest first; at most `limit` items.
#[instrument(skip(store), fields(subsystem = "jobs", component = "reconciler", op = "find_work"))]
pub async fn find_work(
    store: &dyn RepositoryStore,
    limit: usize,
    process_type: ProcessType,
) -> Result<Vec<WorkItem>> {
    let repositories = store.list(usize::MAX).await?;
    let scanned = repositories.len();

    let mut items = Vec::new();
    for repository in repositories {
        let snapshot = ArtifactSnapshot::load(store, &repository.repo_url).await?;
        let action = next_action(&snapshot);
        debug!(
            repository_id = %repository.id,
            action = %action,
            "Reconciled repository"
        );
        if process_type.accepts(action) {
            items.push(WorkItem { repository, action });
        }
    }

    items.sort_by(|a, b| {
        a.action
            .cmp(&b.action)
            .then(a.repository.created_at.cmp(&b.repository.created_at))
    });
    items.truncate(limit);

    info!(
        scanned,
        selected = items.len(),
        "Found repositories needing processing"
    );
    Ok(items)
}
