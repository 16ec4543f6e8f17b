//! Repository ingestion from a local checkout.
//!
//! Flattens every text file under `<root>/<owner>/<repo>` into a single
//! document with `FILE:` markers, preceded by a directory tree.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};
use walkdir::{DirEntry, WalkDir};

use scribe_core::{defaults, AnalysisStats, Error, IngestOutput, RepoIngestor, RepoRef, Result};

/// Directories never descended into.
const SKIPPED_DIRS: [&str; 7] = [
    ".git",
    "node_modules",
    "target",
    "__pycache__",
    ".venv",
    "dist",
    "build",
];

const FILE_RULE: &str = "================================================";

/// Configuration for [`LocalCheckoutIngestor`].
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub root: PathBuf,
    pub max_file_size_bytes: u64,
}

impl IngestConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_file_size_bytes: defaults::MAX_FILE_SIZE_BYTES,
        }
    }

    /// Reads `SCRIBE_MAX_FILE_SIZE_BYTES`; the root is always explicit.
    pub fn from_env(root: impl Into<PathBuf>) -> Self {
        let mut config = Self::new(root);
        if let Some(size) = std::env::var("SCRIBE_MAX_FILE_SIZE_BYTES")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.max_file_size_bytes = size;
        }
        config
    }

    pub fn with_max_file_size_bytes(mut self, bytes: u64) -> Self {
        self.max_file_size_bytes = bytes;
        self
    }
}

/// [`RepoIngestor`] reading an already-cloned repository from disk.
#[derive(Debug, Clone)]
pub struct LocalCheckoutIngestor {
    config: IngestConfig,
}

impl LocalCheckoutIngestor {
    pub fn new(config: IngestConfig) -> Self {
        Self { config }
    }

    /// Checkout directory for a repository.
    pub fn checkout_path(&self, repo: &RepoRef) -> PathBuf {
        self.config.root.join(&repo.owner).join(&repo.repo_name)
    }
}

#[async_trait]
impl RepoIngestor for LocalCheckoutIngestor {
    #[instrument(skip(self), fields(subsystem = "jobs", component = "ingest", op = "ingest", repo = %repo.full_name))]
    async fn ingest(&self, repo: &RepoRef) -> Result<IngestOutput> {
        let path = self.checkout_path(repo);
        if !path.is_dir() {
            return Err(Error::Ingestion(format!(
                "No checkout found for {} at {}",
                repo.full_name,
                path.display()
            )));
        }

        let full_name = repo.full_name.clone();
        let max_size = self.config.max_file_size_bytes;
        let output = tokio::task::spawn_blocking(move || flatten(&path, &full_name, max_size))
            .await
            .map_err(|e| Error::Internal(format!("ingestion task panicked: {}", e)))??;

        info!(
            files_processed = output.stats.files_processed,
            total_characters = output.stats.total_characters,
            binary_files_skipped = output.stats.binary_files_skipped,
            large_files_skipped = output.stats.large_files_skipped,
            "Repository ingested"
        );
        Ok(output)
    }
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| SKIPPED_DIRS.contains(&name))
}

fn flatten(root: &Path, full_name: &str, max_size: u64) -> Result<IngestOutput> {
    let mut stats = AnalysisStats::default();
    let mut tree = String::new();
    let mut files = String::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_skipped_dir(e));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Error accessing entry");
                continue;
            }
        };
        if entry.depth() == 0 {
            continue;
        }

        let indent = "    ".repeat(entry.depth() - 1);
        let name = entry.file_name().to_string_lossy();
        if entry.file_type().is_dir() {
            stats.total_directories += 1;
            tree.push_str(&format!("{}{}/\n", indent, name));
            continue;
        }
        if !entry.file_type().is_file() {
            continue;
        }

        stats.total_files += 1;
        tree.push_str(&format!("{}{}\n", indent, name));

        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        if size > max_size {
            debug!(path = %entry.path().display(), size, "Skipping large file");
            stats.large_files_skipped += 1;
            continue;
        }

        let bytes = match std::fs::read(entry.path()) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %entry.path().display(), error = %e, "Failed to read file");
                stats.encoding_errors += 1;
                continue;
            }
        };
        if looks_binary(&bytes) {
            stats.binary_files_skipped += 1;
            continue;
        }

        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => {
                stats.encoding_errors += 1;
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        };

        let relative = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");
        stats.files_processed += 1;
        stats.total_size_bytes += size;
        stats.total_lines += text.lines().count() as u64;

        files.push_str(&format!("\n{}\nFILE: {}\n{}\n", FILE_RULE, relative, FILE_RULE));
        files.push_str(&text);
        if !text.ends_with('\n') {
            files.push('\n');
        }
    }

    let mut content = format!("Repository: {}\n\nDirectory structure:\n{}", full_name, tree);
    content.push_str(&files);

    let file_chars = files.chars().count() as u64;
    stats.total_characters = file_chars;
    stats.estimated_tokens = file_chars / defaults::CHARS_PER_TOKEN;

    Ok(IngestOutput {
        content,
        stats,
        tree_structure: Some(tree),
    })
}

/// A NUL byte in the first few KiB marks a file as binary.
fn looks_binary(bytes: &[u8]) -> bool {
    let sniff = bytes.len().min(defaults::BINARY_SNIFF_BYTES);
    bytes[..sniff].contains(&0)
}
