//! Optional derived artifacts: a fork of the repository and a social post.
//!
//! Each generator runs at most once per pipeline run and only when the
//! artifact is missing. Failures never fail the job; they are returned as
//! [`PartialFailure`]s for the job result.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use scribe_core::{
    defaults, ArtifactSnapshot, ForkGenerator, RepoRef, Repository, RepositoryStore, SocialPoster,
};

use crate::text::truncate_with_ellipsis;

/// A non-fatal failure recorded in the job result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialFailure {
    pub stage: String,
    pub error: String,
}

impl PartialFailure {
    pub fn new(stage: impl Into<String>, error: impl ToString) -> Self {
        Self {
            stage: stage.into(),
            error: error.to_string(),
        }
    }
}

/// What the derived stage produced in this run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DerivedOutcome {
    pub fork_url: Option<String>,
    pub social_post_url: Option<String>,
    pub partial_failures: Vec<PartialFailure>,
}

/// Compose the text of a social post about a repository.
///
/// The description is cut to 200 chars, then further if the whole post would
/// exceed 280 chars. The result never exceeds 280 chars.
pub fn compose_social_post(name: &str, author: &str, description: Option<&str>, url: &str) -> String {
    let header = if author.is_empty() {
        format!("🚀 {}", name)
    } else {
        format!("🚀 {} by {}", name, author)
    };
    let footer = format!(
        "\n\n{}\n\n{}",
        defaults::SOCIAL_HASHTAGS.join(" "),
        url
    );

    let limit = defaults::SOCIAL_POST_MAX_CHARS;
    let description = description.map(str::trim).filter(|d| !d.is_empty());
    let text = match description {
        Some(desc) => {
            let mut desc = truncate_with_ellipsis(desc, defaults::SOCIAL_DESCRIPTION_MAX_CHARS);
            let fixed = header.chars().count() + footer.chars().count() + 2;
            if fixed + desc.chars().count() > limit {
                let available = limit.saturating_sub(fixed);
                desc = if available >= 4 {
                    truncate_with_ellipsis(&desc, available)
                } else {
                    String::new()
                };
            }
            if desc.is_empty() {
                format!("{}{}", header, footer)
            } else {
                format!("{}\n\n{}{}", header, desc, footer)
            }
        }
        None => format!("{}{}", header, footer),
    };

    if text.chars().count() > limit {
        text.chars().take(limit).collect()
    } else {
        text
    }
}

/// Runs the configured fork and social-post collaborators.
#[derive(Clone, Default)]
pub struct DerivedArtifacts {
    fork: Option<Arc<dyn ForkGenerator>>,
    social: Option<Arc<dyn SocialPoster>>,
}

impl DerivedArtifacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fork(mut self, fork: Arc<dyn ForkGenerator>) -> Self {
        self.fork = Some(fork);
        self
    }

    pub fn with_social(mut self, social: Arc<dyn SocialPoster>) -> Self {
        self.social = Some(social);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fork.is_none() && self.social.is_none()
    }

    /// Produce whichever configured artifacts the snapshot reports missing.
    #[instrument(skip_all, fields(subsystem = "jobs", component = "derived", op = "produce", repository_id = %repository.id))]
    pub async fn produce(
        &self,
        store: &dyn RepositoryStore,
        repository: &Repository,
        repo_ref: &RepoRef,
        snapshot: &ArtifactSnapshot,
    ) -> DerivedOutcome {
        let mut outcome = DerivedOutcome::default();

        if let Some(fork) = self.fork.as_ref().filter(|_| !snapshot.has_fork_url) {
            match fork.fork(repo_ref).await {
                Ok(result) => {
                    match store.set_fork_url(repository.id, &result.fork_url).await {
                        Ok(()) => info!(fork_url = %result.fork_url, "Created fork"),
                        Err(e) => {
                            warn!(error = %e, "Failed to store fork URL");
                            outcome.partial_failures.push(PartialFailure::new("fork", e));
                        }
                    }
                    outcome.fork_url = Some(result.fork_url);
                }
                Err(e) => {
                    warn!(error = %e, "Fork generation failed");
                    outcome.partial_failures.push(PartialFailure::new("fork", e));
                }
            }
        }

        if let Some(social) = self.social.as_ref().filter(|_| !snapshot.has_social_post) {
            let text = compose_social_post(
                &repository.name,
                &repository.author,
                repository.short_description.as_deref(),
                &repository.repo_url,
            );
            match social.post(&text).await {
                Ok(result) => {
                    match store
                        .set_social_post_url(repository.id, &result.post_url)
                        .await
                    {
                        Ok(()) => info!(post_url = %result.post_url, "Published social post"),
                        Err(e) => {
                            warn!(error = %e, "Failed to store social post URL");
                            outcome
                                .partial_failures
                                .push(PartialFailure::new("social_post", e));
                        }
                    }
                    outcome.social_post_url = Some(result.post_url);
                }
                Err(e) => {
                    warn!(error = %e, "Social post failed");
                    outcome
                        .partial_failures
                        .push(PartialFailure::new("social_post", e));
                }
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use scribe_core::{Error, ForkOutcome, Result, SocialPostOutcome};
    use scribe_db::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingFork {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl ForkGenerator for CountingFork {
        async fn fork(&self, repo: &RepoRef) -> Result<ForkOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::Request("fork refused".to_string()));
            }
            Ok(ForkOutcome {
                fork_url: format!("https://github.com/bot/{}", repo.repo_name),
            })
        }
    }

    #[derive(Default)]
    struct RecordingPoster {
        posts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SocialPoster for RecordingPoster {
        async fn post(&self, text: &str) -> Result<SocialPostOutcome> {
            self.posts.lock().unwrap().push(text.to_string());
            Ok(SocialPostOutcome {
                post_url: "https://x.com/bot/status/1".to_string(),
            })
        }
    }

    async fn stored_repo(store: &MemoryStore) -> (Repository, RepoRef) {
        let repo_ref = RepoRef::parse("https://github.com/tokio-rs/tokio").unwrap();
        let mut repo = Repository::from_ref(&repo_ref);
        repo.short_description = Some("An async runtime".to_string());
        let repo = store.create(repo).await.unwrap();
        (repo, repo_ref)
    }

    #[test]
    fn test_compose_basic_post() {
        let post = compose_social_post("tokio", "tokio-rs", Some("An async runtime"), "https://github.com/tokio-rs/tokio");
        assert!(post.starts_with("🚀 tokio by tokio-rs\n\nAn async runtime\n\n#OpenSource"));
        assert!(post.ends_with("\n\nhttps://github.com/tokio-rs/tokio"));
    }

    #[test]
    fn test_compose_without_description_or_author() {
        let post = compose_social_post("tokio", "", None, "https://github.com/tokio-rs/tokio");
        assert!(post.starts_with("🚀 tokio\n\n#OpenSource #GitHub #Developer #Code"));
    }

    #[test]
    fn test_compose_trims_long_description() {
        let desc = "x".repeat(500);
        let post = compose_social_post("name", "author", Some(&desc), "https://github.com/author/name");
        assert!(post.chars().count() <= 280);
        assert!(post.contains("..."));
        assert!(post.ends_with("https://github.com/author/name"));
    }

    #[test]
    fn test_compose_never_exceeds_limit() {
        let name = "n".repeat(300);
        let post = compose_social_post(&name, "a", Some("desc"), "https://github.com/a/b");
        assert_eq!(post.chars().count(), 280);
    }

    #[tokio::test]
    async fn test_produce_runs_configured_generators() {
        let store = MemoryStore::new();
        let (repo, repo_ref) = stored_repo(&store).await;
        let fork = Arc::new(CountingFork::default());
        let poster = Arc::new(RecordingPoster::default());
        let derived = DerivedArtifacts::new()
            .with_fork(fork.clone())
            .with_social(poster.clone());

        let outcome = derived
            .produce(&store, &repo, &repo_ref, &ArtifactSnapshot::default())
            .await;

        assert_eq!(outcome.fork_url.as_deref(), Some("https://github.com/bot/tokio"));
        assert!(outcome.partial_failures.is_empty());
        assert!(poster.posts.lock().unwrap()[0].contains("An async runtime"));
        let stored = store.get(repo.id).await.unwrap().unwrap();
        assert_eq!(stored.social_post_url.as_deref(), Some("https://x.com/bot/status/1"));
    }

    #[tokio::test]
    async fn test_produce_skips_existing_artifacts() {
        let store = MemoryStore::new();
        let (repo, repo_ref) = stored_repo(&store).await;
        let fork = Arc::new(CountingFork::default());
        let derived = DerivedArtifacts::new().with_fork(fork.clone());
        let snapshot = ArtifactSnapshot {
            has_fork_url: true,
            ..ArtifactSnapshot::default()
        };

        let outcome = derived.produce(&store, &repo, &repo_ref, &snapshot).await;

        assert_eq!(fork.calls.load(Ordering::SeqCst), 0);
        assert!(outcome.fork_url.is_none());
    }

    #[tokio::test]
    async fn test_fork_failure_is_partial() {
        let store = MemoryStore::new();
        let (repo, repo_ref) = stored_repo(&store).await;
        let fork = Arc::new(CountingFork {
            fail: true,
            ..CountingFork::default()
        });
        let poster = Arc::new(RecordingPoster::default());
        let derived = DerivedArtifacts::new().with_fork(fork).with_social(poster);

        let outcome = derived
            .produce(&store, &repo, &repo_ref, &ArtifactSnapshot::default())
            .await;

        assert_eq!(outcome.partial_failures.len(), 1);
        assert_eq!(outcome.partial_failures[0].stage, "fork");
        assert!(outcome.social_post_url.is_some());
    }
}
