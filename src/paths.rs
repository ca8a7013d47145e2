//! Centralized resolution of XDG-style paths (spec §4.1).
//!
//! Mirrors the teacher's `DIRS: LazyLock<ProjectDirs>` static, but widened to
//! expose every directory the File Layout table in spec §6 names, and to
//! create them idempotently on first use.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum PathError {
    #[error("could not determine the user's home directory")]
    #[diagnostic(code(my_unicorn::paths::no_home))]
    NoHome,

    #[error("failed to create directory {path}")]
    #[diagnostic(code(my_unicorn::paths::create_dir_failed))]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Resolves and owns every directory `my-unicorn` reads from or writes to.
#[derive(Debug, Clone)]
pub struct PathResolver {
    config_dir: PathBuf,
    cache_dir: PathBuf,
    data_dir: PathBuf,
}

impl PathResolver {
    /// Resolves paths from the environment (`XDG_CONFIG_HOME`, `XDG_DATA_HOME`,
    /// `XDG_CACHE_HOME`), falling back to the platform defaults `directories`
    /// would otherwise pick.
    pub fn discover() -> Result<Self, PathError> {
        let project = ProjectDirs::from("", "", "my-unicorn").ok_or(PathError::NoHome)?;

        Ok(Self {
            config_dir: project.config_dir().to_path_buf(),
            cache_dir: project.cache_dir().to_path_buf(),
            data_dir: project.data_dir().to_path_buf(),
        })
    }

    /// Builds a resolver rooted at an explicit directory, for tests.
    #[cfg(test)]
    pub fn rooted_at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            config_dir: root.join("config"),
            cache_dir: root.join("cache"),
            data_dir: root.join("data"),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn apps_dir(&self) -> PathBuf {
        self.config_dir.join("apps")
    }

    pub fn app_state_path(&self, name: &str) -> PathBuf {
        self.apps_dir().join(format!("{name}.json"))
    }

    pub fn app_backup_path(&self, name: &str) -> PathBuf {
        self.apps_dir().join("backups").join(format!("{name}.json.backup"))
    }

    pub fn global_config_path(&self) -> PathBuf {
        self.config_dir.join("settings.conf")
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn release_cache_dir(&self) -> PathBuf {
        self.cache_dir.join("releases")
    }

    pub fn release_cache_path(&self, owner: &str, repo: &str) -> PathBuf {
        self.release_cache_dir().join(format!("{owner}_{repo}.json"))
    }

    pub fn lock_path(&self) -> PathBuf {
        self.cache_dir.join(".lock")
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.cache_dir.join("tmp")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.config_dir.join("logs")
    }

    pub fn log_file(&self) -> PathBuf {
        self.log_dir().join("my-unicorn.log")
    }

    pub fn storage_dir(&self) -> PathBuf {
        self.data_dir.join("applications")
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.data_dir.join("backups")
    }

    pub fn icon_dir(&self) -> PathBuf {
        self.data_dir.join("icons")
    }

    pub fn desktop_entry_dir(&self) -> PathBuf {
        self.data_dir.join("applications-menu")
    }

    pub fn desktop_entry_path(&self, app: &str) -> PathBuf {
        self.desktop_entry_dir().join(format!("{app}.desktop"))
    }

    /// Creates every directory this resolver is responsible for. Idempotent.
    pub fn ensure_all(&self) -> Result<(), PathError> {
        for dir in [
            self.config_dir.clone(),
            self.apps_dir(),
            self.apps_dir().join("backups"),
            self.cache_dir.clone(),
            self.release_cache_dir(),
            self.tmp_dir(),
            self.log_dir(),
            self.storage_dir(),
            self.backup_dir(),
            self.icon_dir(),
            self.desktop_entry_dir(),
        ] {
            std::fs::create_dir_all(&dir).map_err(|source| PathError::CreateDir { path: dir, source })?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_all_creates_every_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = PathResolver::rooted_at(tmp.path());
        paths.ensure_all().unwrap();

        assert!(paths.apps_dir().is_dir());
        assert!(paths.release_cache_dir().is_dir());
        assert!(paths.icon_dir().is_dir());
        assert!(paths.desktop_entry_dir().is_dir());
    }

    #[test]
    fn app_state_path_is_namespaced_by_apps_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = PathResolver::rooted_at(tmp.path());
        assert_eq!(paths.app_state_path("qownnotes"), paths.apps_dir().join("qownnotes.json"));
    }
}
