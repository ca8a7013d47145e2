//! GitHub release fetch strategy (spec §4.5).

use std::sync::Arc;

use octocrab::models::repos::Release;
use octocrab::Octocrab;
use tracing::{debug, instrument};

use super::{ReleaseAsset, ReleaseData, ReleaseError};
use crate::auth::AuthManager;
use crate::retry;

/// Per-call overrides to the default fetch strategy.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Bypass the release cache and hit the API regardless of freshness.
    pub refresh_cache: bool,
}

/// Resolves the release GitHub considers current for `(owner, repo)` (spec
/// §4.5): catalog entries with `prerelease = true` list every release and
/// take the newest by `published_at`; `prerelease = false` asks for
/// `/releases/latest` and falls back to the same list-and-pick-first path on
/// 404 (repos that only ever publish prereleases have no "latest").
pub struct ReleaseClient {
    octocrab: Octocrab,
    auth: Arc<AuthManager>,
}

impl ReleaseClient {
    pub fn new(auth: Arc<AuthManager>) -> Result<Self, ReleaseError> {
        let mut builder = Octocrab::builder().add_header(reqwest::header::USER_AGENT, crate::auth::user_agent());
        if let Some(token) = auth.token_for_octocrab() {
            builder = builder.personal_token(token);
        }

        Ok(Self { octocrab: builder.build()?, auth })
    }

    #[instrument(skip(self))]
    pub async fn fetch(&self, owner: &str, repo: &str, prerelease: bool) -> Result<ReleaseData, ReleaseError> {
        let release = if prerelease {
            self.newest_including_prerelease(owner, repo).await?
        } else {
            let result = retry::with_retry("releases/latest", || async {
                self.octocrab.repos(owner, repo).releases().get_latest().await.map_err(ReleaseError::from)
            })
            .await;

            match result {
                Ok(release) => release,
                Err(ReleaseError::GitHubApi(octocrab::Error::GitHub { source, .. }))
                    if source.status_code == reqwest::StatusCode::NOT_FOUND =>
                {
                    self.newest_including_prerelease(owner, repo).await?
                }
                Err(err) => return Err(err),
            }
        };

        self.record_rate_limit().await;
        Ok(release_to_data(owner, repo, prerelease, release))
    }

    /// Always used for URL-sourced apps and for catalog entries marked
    /// `prerelease: true` — lists every release and keeps the one with the
    /// latest `published_at`.
    async fn newest_including_prerelease(&self, owner: &str, repo: &str) -> Result<Release, ReleaseError> {
        let page = retry::with_retry("releases/list", || async {
            self.octocrab.repos(owner, repo).releases().list().per_page(30).send().await.map_err(ReleaseError::from)
        })
        .await?;

        page.items
            .into_iter()
            .max_by_key(|r| r.published_at)
            .ok_or_else(|| ReleaseError::NotFound { owner: owner.to_string(), repo: repo.to_string() })
    }

    /// GitHub's typed release endpoints don't expose per-response headers,
    /// so rate-limit bookkeeping goes through the dedicated endpoint instead
    /// of interception of every call's headers.
    async fn record_rate_limit(&self) {
        if let Ok(rate) = self.octocrab.ratelimit().get().await {
            debug!(remaining = rate.resources.core.remaining, limit = rate.resources.core.limit, "rate limit refreshed");
            self.auth.record_core_rate_limit(rate.resources.core.remaining as u32, rate.resources.core.limit as u32, rate.resources.core.reset as i64);
        }
    }
}

impl From<octocrab::Error> for ReleaseError {
    fn from(err: octocrab::Error) -> Self {
        ReleaseError::GitHubApi(err)
    }
}

fn release_to_data(owner: &str, repo: &str, prerelease: bool, release: Release) -> ReleaseData {
    ReleaseData {
        owner: owner.to_string(),
        repo: repo.to_string(),
        version: release.tag_name.trim_start_matches('v').to_string(),
        prerelease,
        assets: release
            .assets
            .into_iter()
            .map(|asset| ReleaseAsset {
                name: asset.name,
                digest: asset.digest,
                size: asset.size as u64,
                browser_download_url: asset.browser_download_url.to_string(),
                content_type: Some(asset.content_type),
            })
            .collect(),
        original_tag_name: release.tag_name,
    }
}
