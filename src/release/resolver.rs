//! Cache-first fetch strategy (spec §4.5): combines [`ReleaseCache`] and
//! [`ReleaseClient`] the way the orchestrator needs them — never called
//! independently by a CLI command.

use tracing::{debug, warn};

use super::{CacheLookup, FetchOptions, ReleaseCache, ReleaseClient, ReleaseData, ReleaseError};

/// Resolves the release for `(owner, repo)`, consulting the cache before the
/// network unless `options.refresh_cache` is set (spec §4.5): a fresh cache
/// entry is returned without any API call; a stale one is refreshed, falling
/// back to the stale data (with a warning) if the refresh itself fails; a
/// miss always calls the API and only then fails.
pub async fn resolve(
    cache: &ReleaseCache<'_>,
    client: &ReleaseClient,
    owner: &str,
    repo: &str,
    prerelease: bool,
    ttl_hours: i64,
    options: &FetchOptions,
) -> Result<ReleaseData, ReleaseError> {
    if options.refresh_cache {
        let data = client.fetch(owner, repo, prerelease).await?;
        return Ok(cache.save(owner, repo, data, ttl_hours)?.release_data);
    }

    match cache.load(owner, repo)? {
        CacheLookup::Fresh(cached) => {
            debug!(owner, repo, "serving release from fresh cache, no API call");
            Ok(cached.release_data)
        }
        CacheLookup::Stale(cached) => match client.fetch(owner, repo, prerelease).await {
            Ok(data) => Ok(cache.save(owner, repo, data, ttl_hours)?.release_data),
            Err(err) => {
                warn!(owner, repo, error = %err, "refresh failed, serving stale release cache");
                Ok(cached.release_data)
            }
        },
        CacheLookup::Missing => {
            let data = client.fetch(owner, repo, prerelease).await?;
            Ok(cache.save(owner, repo, data, ttl_hours)?.release_data)
        }
    }
}
