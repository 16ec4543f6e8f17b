//! In-process repository store.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use scribe_core::{
    CreateAnalysisRequest, CreateDocumentRequest, Document, Error, Repository, RepositoryAnalysis,
    RepositoryStatus, RepositoryStore, Result,
};

#[derive(Debug, Default)]
struct StoreState {
    repositories: BTreeMap<Uuid, Repository>,
    analyses: BTreeMap<Uuid, RepositoryAnalysis>,
    documents: BTreeMap<Uuid, Document>,
}

/// Serializable copy of everything a [`MemoryStore`] holds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub repositories: Vec<Repository>,
    #[serde(default)]
    pub analyses: Vec<RepositoryAnalysis>,
    #[serde(default)]
    pub documents: Vec<Document>,
}

/// [`RepositoryStore`] backed by in-memory maps.
///
/// Cloning is cheap and clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<StoreState>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a snapshot.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let state = StoreState {
            repositories: snapshot
                .repositories
                .into_iter()
                .map(|r| (r.id, r))
                .collect(),
            analyses: snapshot.analyses.into_iter().map(|a| (a.id, a)).collect(),
            documents: snapshot.documents.into_iter().map(|d| (d.id, d)).collect(),
        };
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Copy the current contents into a snapshot.
    pub async fn snapshot(&self) -> StoreSnapshot {
        let state = self.state.read().await;
        StoreSnapshot {
            repositories: state.repositories.values().cloned().collect(),
            analyses: state.analyses.values().cloned().collect(),
            documents: state.documents.values().cloned().collect(),
        }
    }

    /// Load a store from a JSON snapshot file. A missing file yields an empty store.
    #[instrument(skip_all, fields(subsystem = "db", component = "memory_store", op = "load"))]
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No state file, starting empty");
                return Ok(Self::new());
            }
            Err(e) => return Err(e.into()),
        };
        let snapshot: StoreSnapshot = serde_json::from_slice(&bytes)?;
        info!(
            path = %path.display(),
            repositories = snapshot.repositories.len(),
            analyses = snapshot.analyses.len(),
            documents = snapshot.documents.len(),
            "Loaded state file"
        );
        Ok(Self::from_snapshot(snapshot))
    }

    /// Write the store to a JSON snapshot file, replacing it atomically.
    #[instrument(skip_all, fields(subsystem = "db", component = "memory_store", op = "save"))]
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let snapshot = self.snapshot().await;
        let json = serde_json::to_vec_pretty(&snapshot)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, path).await?;

        debug!(path = %path.display(), bytes = json.len(), "Saved state file");
        Ok(())
    }

    async fn modify_repository<F>(&self, id: Uuid, f: F) -> Result<()>
    where
        F: FnOnce(&mut Repository) + Send,
    {
        let mut state = self.state.write().await;
        let repo = state
            .repositories
            .get_mut(&id)
            .ok_or(Error::RepositoryNotFound(id))?;
        f(repo);
        repo.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl RepositoryStore for MemoryStore {
    async fn find_by_url(&self, url: &str) -> Result<Option<Repository>> {
        let state = self.state.read().await;
        Ok(state
            .repositories
            .values()
            .find(|r| r.repo_url == url)
            .cloned())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Repository>> {
        Ok(self.state.read().await.repositories.get(&id).cloned())
    }

    async fn create(&self, repo: Repository) -> Result<Repository> {
        let mut state = self.state.write().await;
        if state
            .repositories
            .values()
            .any(|r| r.repo_url == repo.repo_url)
        {
            return Err(Error::Storage(format!(
                "Repository already exists: {}",
                repo.repo_url
            )));
        }
        state.repositories.insert(repo.id, repo.clone());
        Ok(repo)
    }

    async fn list(&self, limit: usize) -> Result<Vec<Repository>> {
        let state = self.state.read().await;
        let mut repos: Vec<Repository> = state.repositories.values().cloned().collect();
        repos.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        repos.truncate(limit);
        Ok(repos)
    }

    async fn update_status(&self, id: Uuid, status: RepositoryStatus) -> Result<()> {
        self.modify_repository(id, |r| r.status = status).await
    }

    async fn set_ai_summary(&self, id: Uuid, summary: &str) -> Result<()> {
        let summary = summary.to_string();
        self.modify_repository(id, move |r| r.ai_summary = Some(summary))
            .await
    }

    async fn set_short_description(&self, id: Uuid, description: &str) -> Result<()> {
        let description = description.to_string();
        self.modify_repository(id, move |r| r.short_description = Some(description))
            .await
    }

    async fn set_content_preview(&self, id: Uuid, preview: &str) -> Result<()> {
        let preview = preview.to_string();
        self.modify_repository(id, move |r| r.content_preview = Some(preview))
            .await
    }

    async fn set_fork_url(&self, id: Uuid, url: &str) -> Result<()> {
        let url = url.to_string();
        self.modify_repository(id, move |r| r.fork_url = Some(url))
            .await
    }

    async fn set_social_post_url(&self, id: Uuid, url: &str) -> Result<()> {
        let url = url.to_string();
        self.modify_repository(id, move |r| r.social_post_url = Some(url))
            .await
    }

    async fn latest_analysis(&self, repository_id: Uuid) -> Result<Option<RepositoryAnalysis>> {
        let state = self.state.read().await;
        Ok(state
            .analyses
            .values()
            .filter(|a| a.repository_id == repository_id)
            .max_by_key(|a| a.analysis_version)
            .cloned())
    }

    async fn analysis_exists(&self, analysis_id: Uuid) -> Result<bool> {
        Ok(self.state.read().await.analyses.contains_key(&analysis_id))
    }

    async fn create_analysis(&self, req: CreateAnalysisRequest) -> Result<RepositoryAnalysis> {
        let mut state = self.state.write().await;
        if !state.repositories.contains_key(&req.repository_id) {
            return Err(Error::RepositoryNotFound(req.repository_id));
        }
        let version = state
            .analyses
            .values()
            .filter(|a| a.repository_id == req.repository_id)
            .map(|a| a.analysis_version)
            .max()
            .unwrap_or(0)
            + 1;
        let analysis = RepositoryAnalysis {
            id: Uuid::now_v7(),
            repository_id: req.repository_id,
            analysis_version: version,
            stats: req.stats,
            tree_structure: req.tree_structure,
            content: req.content,
            created_at: Utc::now(),
        };
        state.analyses.insert(analysis.id, analysis.clone());
        Ok(analysis)
    }

    async fn current_documents(&self, repository_id: Uuid) -> Result<Vec<Document>> {
        let state = self.state.read().await;
        let mut docs: Vec<Document> = state
            .documents
            .values()
            .filter(|d| d.repository_id == repository_id && d.is_current)
            .cloned()
            .collect();
        docs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(docs)
    }

    async fn create_document(&self, req: CreateDocumentRequest) -> Result<Document> {
        let mut state = self.state.write().await;
        if !state.repositories.contains_key(&req.repository_id) {
            return Err(Error::RepositoryNotFound(req.repository_id));
        }
        let version = state
            .documents
            .values()
            .filter(|d| {
                d.repository_id == req.repository_id
                    && d.document_type == req.document.document_type
            })
            .count() as i32
            + 1;
        let doc = Document {
            id: Uuid::now_v7(),
            repository_id: req.repository_id,
            analysis_id: req.analysis_id,
            document_type: req.document.document_type,
            title: req.document.title,
            description: req.document.description,
            content: req.document.content,
            is_current: true,
            version,
            model_used: req.document.model_used,
            created_at: Utc::now(),
        };
        state.documents.insert(doc.id, doc.clone());
        Ok(doc)
    }

    async fn mark_previous_documents_not_current(
        &self,
        repository_id: Uuid,
        document_type: &str,
    ) -> Result<usize> {
        let mut state = self.state.write().await;
        let mut changed = 0;
        for doc in state.documents.values_mut() {
            if doc.repository_id == repository_id
                && doc.document_type == document_type
                && doc.is_current
            {
                doc.is_current = false;
                changed += 1;
            }
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scribe_core::{AnalysisStats, NewDocument, RepoRef};

    fn repo(url: &str) -> Repository {
        Repository::from_ref(&RepoRef::parse(url).unwrap())
    }

    fn new_doc(document_type: &str) -> NewDocument {
        NewDocument {
            document_type: document_type.to_string(),
            title: "Title".to_string(),
            description: "Description".to_string(),
            content: "Body".to_string(),
            model_used: Some("mock".to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_and_find_by_url() {
        let store = MemoryStore::new();
        let created = store.create(repo("https://github.com/a/b")).await.unwrap();

        let found = store
            .find_by_url("https://github.com/a/b")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, created.id);
        assert!(store
            .find_by_url("https://github.com/a/c")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_url() {
        let store = MemoryStore::new();
        store.create(repo("https://github.com/a/b")).await.unwrap();
        let err = store
            .create(repo("https://github.com/a/b"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }

    #[tokio::test]
    async fn test_setters_require_existing_repository() {
        let store = MemoryStore::new();
        let err = store
            .set_ai_summary(Uuid::now_v7(), "summary")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RepositoryNotFound(_)));
    }

    #[tokio::test]
    async fn test_setters_update_fields() {
        let store = MemoryStore::new();
        let r = store.create(repo("https://github.com/a/b")).await.unwrap();

        store.set_ai_summary(r.id, "summary").await.unwrap();
        store.set_short_description(r.id, "short").await.unwrap();
        store
            .update_status(r.id, RepositoryStatus::Completed)
            .await
            .unwrap();

        let r = store.get(r.id).await.unwrap().unwrap();
        assert_eq!(r.ai_summary.as_deref(), Some("summary"));
        assert_eq!(r.short_description.as_deref(), Some("short"));
        assert_eq!(r.status, RepositoryStatus::Completed);
    }

    #[tokio::test]
    async fn test_analysis_versions_increase() {
        let store = MemoryStore::new();
        let r = store.create(repo("https://github.com/a/b")).await.unwrap();

        for content in ["first", "second"] {
            store
                .create_analysis(CreateAnalysisRequest {
                    repository_id: r.id,
                    stats: AnalysisStats::default(),
                    tree_structure: Some("tree".to_string()),
                    content: content.to_string(),
                })
                .await
                .unwrap();
        }

        let latest = store.latest_analysis(r.id).await.unwrap().unwrap();
        assert_eq!(latest.analysis_version, 2);
        assert_eq!(latest.content, "second");
        assert!(store.analysis_exists(latest.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_mark_previous_documents_not_current() {
        let store = MemoryStore::new();
        let r = store.create(repo("https://github.com/a/b")).await.unwrap();

        for doc_type in ["prd", "prd", "flow"] {
            store
                .create_document(CreateDocumentRequest {
                    repository_id: r.id,
                    analysis_id: None,
                    document: new_doc(doc_type),
                })
                .await
                .unwrap();
        }
        assert_eq!(store.current_documents(r.id).await.unwrap().len(), 3);

        let changed = store
            .mark_previous_documents_not_current(r.id, "prd")
            .await
            .unwrap();
        assert_eq!(changed, 2);

        let current = store.current_documents(r.id).await.unwrap();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].document_type, "flow");
    }

    #[tokio::test]
    async fn test_document_versions_per_type() {
        let store = MemoryStore::new();
        let r = store.create(repo("https://github.com/a/b")).await.unwrap();
        let first = store
            .create_document(CreateDocumentRequest {
                repository_id: r.id,
                analysis_id: None,
                document: new_doc("prd"),
            })
            .await
            .unwrap();
        let second = store
            .create_document(CreateDocumentRequest {
                repository_id: r.id,
                analysis_id: None,
                document: new_doc("prd"),
            })
            .await
            .unwrap();
        assert_eq!(first.version, 1);
        assert_eq!(second.version, 2);
    }

    #[tokio::test]
    async fn test_list_respects_limit() {
        let store = MemoryStore::new();
        for name in ["a", "b", "c"] {
            store
                .create(repo(&format!("https://github.com/o/{}", name)))
                .await
                .unwrap();
        }
        assert_eq!(store.list(2).await.unwrap().len(), 2);
        assert_eq!(store.list(usize::MAX).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = MemoryStore::new();
        let r = store.create(repo("https://github.com/a/b")).await.unwrap();
        store.set_ai_summary(r.id, "kept").await.unwrap();
        store.save(&path).await.unwrap();

        let loaded = MemoryStore::load(&path).await.unwrap();
        let r = loaded.get(r.id).await.unwrap().unwrap();
        assert_eq!(r.ai_summary.as_deref(), Some("kept"));
    }

    #[tokio::test]
    async fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::load(dir.path().join("absent.json"))
            .await
            .unwrap();
        assert!(store.list(usize::MAX).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();
        let err = MemoryStore::load(&path).await.unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
