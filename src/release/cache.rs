use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{ReleaseAsset, ReleaseError};
use crate::config::atomic_write_json;
use crate::paths::PathResolver;
use crate::schema;
use crate::selector;

/// Persisted cache entry (spec §3 `CachedRelease`), one JSON file per
/// `(owner, repo)` under `${cache_dir}/releases/`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CachedRelease {
    pub cached_at: DateTime<Utc>,
    pub ttl_hours: i64,
    pub release_data: ReleaseData,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReleaseData {
    pub owner: String,
    pub repo: String,
    pub version: String,
    pub prerelease: bool,
    pub assets: Vec<ReleaseAsset>,
    pub original_tag_name: String,
}

impl CachedRelease {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now - self.cached_at < ChronoDuration::hours(self.ttl_hours)
    }
}

pub enum CacheLookup {
    Fresh(CachedRelease),
    Stale(CachedRelease),
    Missing,
}

pub struct ReleaseCache<'a> {
    paths: &'a PathResolver,
}

impl<'a> ReleaseCache<'a> {
    pub fn new(paths: &'a PathResolver) -> Self {
        Self { paths }
    }

    pub fn load(&self, owner: &str, repo: &str) -> Result<CacheLookup, ReleaseError> {
        let path = self.paths.release_cache_path(owner, repo);
        if !path.exists() {
            return Ok(CacheLookup::Missing);
        }

        let text = std::fs::read_to_string(&path).map_err(|source| ReleaseError::CacheIo { path: path.clone(), source })?;
        let value: serde_json::Value =
            serde_json::from_str(&text).map_err(|source| ReleaseError::CacheJson { path: path.clone(), source })?;
        schema::validate_cached_release(&value)?;

        let cached: CachedRelease =
            serde_json::from_value(value).map_err(|source| ReleaseError::CacheJson { path: path.clone(), source })?;

        if cached.is_fresh(Utc::now()) {
            debug!(owner, repo, "release cache hit (fresh)");
            Ok(CacheLookup::Fresh(cached))
        } else {
            debug!(owner, repo, "release cache hit (stale)");
            Ok(CacheLookup::Stale(cached))
        }
    }

    /// Filters `assets` (spec §4.6) and persists the result, atomically.
    pub fn save(
        &self,
        owner: &str,
        repo: &str,
        mut data: ReleaseData,
        ttl_hours: i64,
    ) -> Result<CachedRelease, ReleaseError> {
        let before = data.assets.len();
        data.assets = selector::filter_assets(data.assets, selector::HostArch::current());
        if data.assets.len() < before {
            warn!(dropped = before - data.assets.len(), "filtered non-Linux/irrelevant assets before caching");
        }

        let cached = CachedRelease { cached_at: Utc::now(), ttl_hours, release_data: data };
        let value = serde_json::to_value(&cached).expect("CachedRelease always serializes");
        schema::validate_cached_release(&value)?;

        let path = self.paths.release_cache_path(owner, repo);
        atomic_write_json(&path, &value).map_err(|e| ReleaseError::CacheIo {
            path,
            source: std::io::Error::other(e.to_string()),
        })?;

        Ok(cached)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(owner: &str, repo: &str) -> ReleaseData {
        ReleaseData {
            owner: owner.to_string(),
            repo: repo.to_string(),
            version: "24.1.1".to_string(),
            prerelease: false,
            assets: vec![ReleaseAsset {
                name: format!("{repo}-x86_64.AppImage"),
                digest: Some("sha256:abc".to_string()),
                size: 1024,
                browser_download_url: "https://example.com/asset".to_string(),
                content_type: None,
            }],
            original_tag_name: "v24.1.1".to_string(),
        }
    }

    #[test]
    fn missing_cache_reports_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = PathResolver::rooted_at(tmp.path());
        paths.ensure_all().unwrap();
        let cache = ReleaseCache::new(&paths);

        assert!(matches!(cache.load("pbek", "QOwnNotes").unwrap(), CacheLookup::Missing));
    }

    #[test]
    fn freshly_saved_cache_is_fresh() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = PathResolver::rooted_at(tmp.path());
        paths.ensure_all().unwrap();
        let cache = ReleaseCache::new(&paths);

        cache.save("pbek", "QOwnNotes", sample("pbek", "QOwnNotes"), 24).unwrap();
        assert!(matches!(cache.load("pbek", "QOwnNotes").unwrap(), CacheLookup::Fresh(_)));
    }

    #[test]
    fn zero_ttl_cache_is_immediately_stale() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = PathResolver::rooted_at(tmp.path());
        paths.ensure_all().unwrap();
        let cache = ReleaseCache::new(&paths);

        cache.save("pbek", "QOwnNotes", sample("pbek", "QOwnNotes"), 0).unwrap();
        assert!(matches!(cache.load("pbek", "QOwnNotes").unwrap(), CacheLookup::Stale(_)));
    }
}
