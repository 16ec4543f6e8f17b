//! Validated repository references.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const DEFAULT_HOST: &str = "github.com";

/// A parsed, canonical reference to a hosted source repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    pub host: String,
    pub owner: String,
    pub repo_name: String,
    /// `owner/repo_name`
    pub full_name: String,
    /// Canonical `https://host/owner/repo_name` URL, used as the lookup key.
    pub url: String,
    pub clone_url: String,
}

impl RepoRef {
    /// Parse a repository URL.
    ///
    /// Accepts `https://github.com/owner/repo`, a trailing `.git` or `/`,
    /// extra path segments (`/tree/main/...`), a missing scheme, a `www.`
    /// host prefix, and bare `owner/repo` (assumed to live on GitHub).
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("empty repository URL".to_string()));
        }

        let without_fragment = trimmed
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .trim_end_matches('/');

        let (has_scheme, rest) = match without_fragment.split_once("://") {
            Some((scheme, rest)) => {
                if scheme != "https" && scheme != "http" {
                    return Err(Error::InvalidInput(format!(
                        "unsupported URL scheme '{}' in {}",
                        scheme, input
                    )));
                }
                (true, rest)
            }
            None => (false, without_fragment),
        };

        let mut segments = rest.split('/').filter(|s| !s.is_empty());
        let host = if has_scheme {
            segments.next().map(str::to_string)
        } else {
            // Without a scheme, the first segment is a host only if it looks like one.
            let first = rest.split('/').find(|s| !s.is_empty()).unwrap_or_default();
            if first.contains('.') {
                segments.next().map(str::to_string)
            } else {
                Some(DEFAULT_HOST.to_string())
            }
        };
        let host = host
            .map(|h| h.trim_start_matches("www.").to_ascii_lowercase())
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::InvalidInput(format!("missing host in {}", input)))?;

        let owner = segments.next();
        let repo = segments.next();
        let (owner, repo) = match (owner, repo) {
            (Some(owner), Some(repo)) => (owner, repo.trim_end_matches(".git")),
            _ => {
                return Err(Error::InvalidInput(format!(
                    "Invalid repository URL format: {}",
                    input
                )))
            }
        };

        if !is_valid_segment(owner) || !is_valid_segment(repo) {
            return Err(Error::InvalidInput(format!(
                "Invalid owner or repository name in {}",
                input
            )));
        }

        let full_name = format!("{}/{}", owner, repo);
        Ok(Self {
            url: format!("https://{}/{}", host, full_name),
            clone_url: format!("https://{}/{}.git", host, full_name),
            host,
            owner: owner.to_string(),
            repo_name: repo.to_string(),
            full_name,
        })
    }
}

impl std::str::FromStr for RepoRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl std::fmt::Display for RepoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.url)
    }
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_https_url() {
        let r = RepoRef::parse("https://github.com/rust-lang/cargo").unwrap();
        assert_eq!(r.owner, "rust-lang");
        assert_eq!(r.repo_name, "cargo");
        assert_eq!(r.full_name, "rust-lang/cargo");
        assert_eq!(r.url, "https://github.com/rust-lang/cargo");
        assert_eq!(r.clone_url, "https://github.com/rust-lang/cargo.git");
    }

    #[test]
    fn test_parse_strips_git_suffix_and_slash() {
        let a = RepoRef::parse("https://github.com/rust-lang/cargo.git").unwrap();
        let b = RepoRef::parse("https://github.com/rust-lang/cargo/").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_parse_without_scheme() {
        let r = RepoRef::parse("www.github.com/serde-rs/serde").unwrap();
        assert_eq!(r.host, "github.com");
        assert_eq!(r.url, "https://github.com/serde-rs/serde");
    }

    #[test]
    fn test_parse_bare_owner_repo() {
        let r = RepoRef::parse("tokio-rs/axum").unwrap();
        assert_eq!(r.host, "github.com");
        assert_eq!(r.full_name, "tokio-rs/axum");
    }

    #[test]
    fn test_parse_ignores_extra_segments_and_query() {
        let r = RepoRef::parse("https://github.com/a/b/tree/main/src?tab=readme#top").unwrap();
        assert_eq!(r.full_name, "a/b");
    }

    #[test]
    fn test_parse_other_host() {
        let r = RepoRef::parse("https://gitlab.com/group/project").unwrap();
        assert_eq!(r.host, "gitlab.com");
        assert_eq!(r.url, "https://gitlab.com/group/project");
    }

    #[test]
    fn test_parse_rejects_single_segment() {
        let err = RepoRef::parse("https://github.com/only-owner").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_parse_rejects_empty_and_bad_scheme() {
        assert!(RepoRef::parse("   ").is_err());
        assert!(RepoRef::parse("ftp://github.com/a/b").is_err());
    }

    #[test]
    fn test_parse_rejects_invalid_characters() {
        assert!(RepoRef::parse("https://github.com/a b/c").is_err());
        assert!(RepoRef::parse("https://github.com/owner/..").is_err());
    }

    #[test]
    fn test_from_str_and_display() {
        let r: RepoRef = "github.com/a/b".parse().unwrap();
        assert_eq!(r.to_string(), "https://github.com/a/b");
    }
}
