//! Backup service (spec §4.11): versioned, metadata-tracked backups made
//! before an update overwrites an installed AppImage.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::paths::PathResolver;
use crate::verify;

#[derive(Debug, Error, Diagnostic)]
pub enum BackupError {
    #[error("failed to access backup storage at {path}")]
    #[diagnostic(code(my_unicorn::backup::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse backup metadata at {path}")]
    #[diagnostic(code(my_unicorn::backup::json))]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Hash(#[from] verify::VerifyError),

    #[error("no backup found for {app} (version {version:?})")]
    #[diagnostic(code(my_unicorn::backup::not_found))]
    NotFound { app: String, version: Option<String> },
}

/// Persisted per app at `${backup_dir}/{app}/metadata.json` (spec §3
/// `BackupMetadata`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BackupMetadata {
    pub versions: HashMap<String, BackupEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackupEntry {
    pub created: DateTime<Utc>,
    pub filename: String,
    pub sha256: String,
    pub size: u64,
}

pub struct BackupService<'a> {
    paths: &'a PathResolver,
}

impl<'a> BackupService<'a> {
    pub fn new(paths: &'a PathResolver) -> Self {
        Self { paths }
    }

    fn app_dir(&self, app: &str) -> PathBuf {
        self.paths.backup_dir().join(app)
    }

    fn metadata_path(&self, app: &str) -> PathBuf {
        self.app_dir(app).join("metadata.json")
    }

    fn load_metadata(&self, app: &str) -> Result<BackupMetadata, BackupError> {
        let path = self.metadata_path(app);
        if !path.exists() {
            return Ok(BackupMetadata::default());
        }

        let text = std::fs::read_to_string(&path).map_err(|source| BackupError::Io { path: path.clone(), source })?;
        serde_json::from_str(&text).map_err(|source| BackupError::Json { path, source })
    }

    fn save_metadata(&self, app: &str, metadata: &BackupMetadata) -> Result<(), BackupError> {
        let path = self.metadata_path(app);
        let dir = self.app_dir(app);
        std::fs::create_dir_all(&dir).map_err(|source| BackupError::Io { path: path.clone(), source })?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|source| BackupError::Io { path: path.clone(), source })?;
        serde_json::to_writer_pretty(&mut tmp, metadata).map_err(|source| BackupError::Json { path: path.clone(), source })?;
        tmp.persist(&path).map_err(|e| BackupError::Io { path, source: e.error })?;
        Ok(())
    }

    /// Copies `installed_path` to `${backup_dir}/{app}/{app}-{version}.AppImage`
    /// and appends a metadata entry. Does not prune — call [`Self::prune`]
    /// after the update that triggered this backup succeeds.
    #[tracing::instrument(skip(self))]
    pub async fn create_backup(&self, app: &str, version: &str, installed_path: &Path) -> Result<PathBuf, BackupError> {
        let dir = self.app_dir(app);
        std::fs::create_dir_all(&dir).map_err(|source| BackupError::Io { path: dir.clone(), source })?;

        let filename = format!("{app}-{version}.AppImage");
        let dest = dir.join(&filename);

        fs_err::tokio::copy(installed_path, &dest)
            .await
            .map_err(|source| BackupError::Io { path: dest.clone(), source })?;

        let sha256 = verify::compute_hash(&dest, "sha256", None).await?;
        let size = fs_err::tokio::metadata(&dest).await.map_err(|source| BackupError::Io { path: dest.clone(), source })?.len();

        let mut metadata = self.load_metadata(app)?;
        metadata.versions.insert(
            version.to_string(),
            BackupEntry { created: Utc::now(), filename, sha256, size },
        );
        self.save_metadata(app, &metadata)?;

        info!(app, version, ?dest, "backup created");
        Ok(dest)
    }

    /// Prunes metadata + backup files so at most `max_backup` entries
    /// remain, keeping the most recent by version-sort (spec §4.11).
    ///
    /// Version ordering: parsed as semver when possible; versions that
    /// don't parse fall back to lexicographic comparison, per spec §9's
    /// open question — this may discard a newer-by-date backup whose
    /// version string sorts lower lexicographically. That tradeoff is
    /// accepted rather than guessed around.
    pub fn prune(&self, app: &str, max_backup: usize) -> Result<(), BackupError> {
        let mut metadata = self.load_metadata(app)?;

        let mut versions: Vec<String> = metadata.versions.keys().cloned().collect();
        versions.sort_by(|a, b| compare_versions(a, b));

        let to_remove: Vec<String> = if versions.len() > max_backup {
            versions[..versions.len() - max_backup].to_vec()
        } else {
            Vec::new()
        };

        for version in &to_remove {
            if let Some(entry) = metadata.versions.remove(version) {
                let path = self.app_dir(app).join(&entry.filename);
                match std::fs::remove_file(&path) {
                    Ok(()) => debug!(app, version, ?path, "pruned backup"),
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                    Err(source) => return Err(BackupError::Io { path, source }),
                }
            }
        }

        self.save_metadata(app, &metadata)
    }

    /// Restores the named backup (or the most recent one, if `version` is
    /// `None`) over `installed_path`, atomically.
    pub async fn restore(&self, app: &str, version: Option<&str>, installed_path: &Path) -> Result<(), BackupError> {
        let metadata = self.load_metadata(app)?;

        let (version, entry) = match version {
            Some(v) => {
                let entry = metadata.versions.get(v).cloned().ok_or_else(|| BackupError::NotFound {
                    app: app.to_string(),
                    version: Some(v.to_string()),
                })?;
                (v.to_string(), entry)
            }
            None => {
                let mut versions: Vec<&String> = metadata.versions.keys().collect();
                versions.sort_by(|a, b| compare_versions(a, b));
                let latest = versions.last().ok_or_else(|| BackupError::NotFound { app: app.to_string(), version: None })?;
                ((*latest).clone(), metadata.versions[*latest].clone())
            }
        };

        let backup_path = self.app_dir(app).join(&entry.filename);
        let tmp_path = installed_path.with_extension("AppImage.restoring");

        fs_err::tokio::copy(&backup_path, &tmp_path)
            .await
            .map_err(|source| BackupError::Io { path: tmp_path.clone(), source })?;
        fs_err::tokio::rename(&tmp_path, installed_path)
            .await
            .map_err(|source| BackupError::Io { path: installed_path.to_path_buf(), source })?;

        info!(app, version, "backup restored");
        Ok(())
    }

    pub fn list(&self, app: &str) -> Result<BackupMetadata, BackupError> {
        self.load_metadata(app)
    }
}

pub(crate) fn compare_versions(a: &str, b: &str) -> std::cmp::Ordering {
    match (semver::Version::parse(a.trim_start_matches('v')), semver::Version::parse(b.trim_start_matches('v'))) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_backup_then_restore_round_trips_content() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = PathResolver::rooted_at(tmp.path());
        paths.ensure_all().unwrap();
        let service = BackupService::new(&paths);

        let installed = tmp.path().join("app.AppImage");
        std::fs::write(&installed, b"version one payload").unwrap();

        service.create_backup("testapp", "1.0.0", &installed).await.unwrap();

        std::fs::write(&installed, b"version two payload, corrupted").unwrap();
        service.restore("testapp", Some("1.0.0"), &installed).await.unwrap();

        assert_eq!(std::fs::read(&installed).unwrap(), b"version one payload");
    }

    #[tokio::test]
    async fn prune_keeps_only_max_backup_most_recent_by_semver() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = PathResolver::rooted_at(tmp.path());
        paths.ensure_all().unwrap();
        let service = BackupService::new(&paths);

        let installed = tmp.path().join("app.AppImage");
        for version in ["1.0.0", "1.1.0", "1.2.0"] {
            std::fs::write(&installed, format!("payload {version}")).unwrap();
            service.create_backup("testapp", version, &installed).await.unwrap();
        }

        service.prune("testapp", 1).unwrap();

        let metadata = service.list("testapp").unwrap();
        assert_eq!(metadata.versions.len(), 1);
        assert!(metadata.versions.contains_key("1.2.0"));
    }

    #[tokio::test]
    async fn max_backup_zero_prunes_everything() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = PathResolver::rooted_at(tmp.path());
        paths.ensure_all().unwrap();
        let service = BackupService::new(&paths);

        let installed = tmp.path().join("app.AppImage");
        std::fs::write(&installed, b"payload").unwrap();
        service.create_backup("testapp", "1.0.0", &installed).await.unwrap();
        service.prune("testapp", 0).unwrap();

        assert!(service.list("testapp").unwrap().versions.is_empty());
    }

    #[tokio::test]
    async fn restore_without_version_picks_latest() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = PathResolver::rooted_at(tmp.path());
        paths.ensure_all().unwrap();
        let service = BackupService::new(&paths);

        let installed = tmp.path().join("app.AppImage");
        for version in ["1.0.0", "2.0.0"] {
            std::fs::write(&installed, format!("payload {version}")).unwrap();
            service.create_backup("testapp", version, &installed).await.unwrap();
        }

        std::fs::write(&installed, b"corrupted").unwrap();
        service.restore("testapp", None, &installed).await.unwrap();
        assert_eq!(std::fs::read(&installed).unwrap(), b"payload 2.0.0");
    }

    #[test]
    fn compare_versions_falls_back_to_lexicographic_on_non_semver() {
        assert_eq!(compare_versions("nightly-2024", "nightly-2025"), std::cmp::Ordering::Less);
    }
}
