//! Release resolution & caching (spec §4.5).

mod cache;
mod client;
mod resolver;

pub use cache::{CacheLookup, CachedRelease, ReleaseCache, ReleaseData};
pub use client::{FetchOptions, ReleaseClient};
pub use resolver::resolve;

use miette::Diagnostic;
use thiserror::Error;

use crate::schema::SchemaError;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct ReleaseAsset {
    pub name: String,
    #[serde(default)]
    pub digest: Option<String>,
    pub size: u64,
    pub browser_download_url: String,
    #[serde(default)]
    pub content_type: Option<String>,
}

#[derive(Debug, Error, Diagnostic)]
pub enum ReleaseError {
    #[error("request to GitHub failed")]
    #[diagnostic(code(my_unicorn::release::network))]
    Network(#[from] reqwest::Error),

    #[error("the GitHub API rate limit was exhausted")]
    #[diagnostic(
        code(my_unicorn::release::rate_limited),
        help("wait until the rate limit resets, or authenticate with `my-unicorn token --save`")
    )]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("GitHub API call failed")]
    #[diagnostic(code(my_unicorn::release::github_api))]
    GitHubApi(#[from] octocrab::Error),

    #[error("no release found for {owner}/{repo}")]
    #[diagnostic(code(my_unicorn::release::not_found))]
    NotFound { owner: String, repo: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Schema(#[from] SchemaError),

    #[error("failed to access release cache at {path}")]
    #[diagnostic(code(my_unicorn::release::cache_io))]
    CacheIo {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse cached release at {path}")]
    #[diagnostic(code(my_unicorn::release::cache_json))]
    CacheJson {
        path: std::path::PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl crate::retry::Retryable for ReleaseError {
    fn should_retry(&self) -> bool {
        match self {
            ReleaseError::Network(err) => !err.is_status() || err.status().is_some_and(|s| s.is_server_error()),
            ReleaseError::RateLimited { .. } => true,
            ReleaseError::GitHubApi(octocrab::Error::GitHub { source, .. }) => {
                source.status_code.is_server_error() || source.status_code.as_u16() == 429
            }
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<std::time::Duration> {
        match self {
            ReleaseError::RateLimited { retry_after_secs: Some(secs) } => Some(std::time::Duration::from_secs(*secs)),
            _ => None,
        }
    }
}
