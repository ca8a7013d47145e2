//! Config store (spec §4.4): facade over global, app, and catalog I/O.

mod app_state;
mod catalog;
mod global;
mod ini_adapter;
mod merge;

pub use app_state::{
    AppState, IconMethod, IconState, Source, StateBlock, VerificationMethod, VerificationRecord, VerifiedMethod,
    VerifyStatus,
};
pub use catalog::{CatalogChecksumFile, CatalogEntry, CatalogStore};
pub use global::{DirectoryConfig, GlobalConfig, NetworkConfig};

use std::path::Path;

use miette::Diagnostic;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::paths::PathResolver;
use crate::schema::{self, SchemaError};

pub const CURRENT_CONFIG_VERSION: &str = "2.0.0";

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("configuration at {path} must be migrated from v{from} to v{to}")]
    #[diagnostic(
        code(my_unicorn::config::needs_migration),
        help("run `my-unicorn migrate` to upgrade it")
    )]
    NeedsMigration { path: std::path::PathBuf, from: String, to: String },

    #[error("the bundled application catalog could not be found")]
    #[diagnostic(code(my_unicorn::config::missing_catalog))]
    MissingCatalog,

    #[error("no catalog entry named {name:?}")]
    #[diagnostic(code(my_unicorn::config::catalog_entry_missing))]
    CatalogEntryMissing { name: String },

    #[error("no installed app named {name:?}")]
    #[diagnostic(code(my_unicorn::config::app_not_installed))]
    AppNotInstalled { name: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Schema(#[from] SchemaError),

    #[error("failed to read {path}")]
    #[diagnostic(code(my_unicorn::config::io))]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse JSON at {path}")]
    #[diagnostic(code(my_unicorn::config::json))]
    Json {
        path: std::path::PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to parse INI at {path}")]
    #[diagnostic(code(my_unicorn::config::ini))]
    Ini { path: std::path::PathBuf, message: String },
}

/// The result of merging catalog + state + overrides for one installed app
/// (spec §4.4, GLOSSARY "Effective config").
#[derive(Debug, Clone)]
pub struct EffectiveConfig {
    pub merged: Value,
}

impl EffectiveConfig {
    pub fn owner_repo(&self) -> Option<(String, String)> {
        let source = self.merged.get("source")?;
        Some((
            source.get("owner")?.as_str()?.to_string(),
            source.get("repo")?.as_str()?.to_string(),
        ))
    }

    pub fn prerelease(&self) -> bool {
        self.merged
            .pointer("/source/prerelease")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn verification_method(&self) -> VerificationMethod {
        self.merged
            .pointer("/verification/method")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
            .unwrap_or(VerificationMethod::Skip)
    }

    pub fn icon_method(&self) -> IconMethod {
        self.merged
            .pointer("/icon/method")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
            .unwrap_or(IconMethod::None)
    }

    pub fn target_name(&self) -> Option<String> {
        self.merged
            .pointer("/appimage/naming/target_name")
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    pub fn characteristic_suffixes(&self) -> Vec<String> {
        self.merged
            .pointer("/appimage/naming/characteristic_suffix")
            .and_then(Value::as_array)
            .map(|values| values.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default()
    }

    pub fn checksum_filenames(&self) -> Vec<String> {
        self.merged
            .pointer("/verification/checksum_files")
            .and_then(Value::as_array)
            .map(|values| {
                values.iter().filter_map(|v| v.get("filename")?.as_str().map(str::to_string)).collect()
            })
            .unwrap_or_default()
    }

    pub fn icon_url(&self) -> Option<String> {
        self.merged.pointer("/icon/url").and_then(Value::as_str).map(str::to_string)
    }

    pub fn icon_filename(&self) -> Option<String> {
        self.merged.pointer("/icon/filename").and_then(Value::as_str).map(str::to_string)
    }

    pub fn display_name(&self) -> String {
        self.merged
            .pointer("/metadata/display_name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| "app".to_string())
    }
}

/// Facade over global, app, and catalog I/O (spec §4.4).
pub struct ConfigStore<'a> {
    paths: &'a PathResolver,
    catalog: CatalogStore,
}

impl<'a> ConfigStore<'a> {
    pub fn new(paths: &'a PathResolver) -> Self {
        Self { paths, catalog: CatalogStore::bundled() }
    }

    pub fn catalog(&self) -> &CatalogStore {
        &self.catalog
    }

    pub fn paths(&self) -> &PathResolver {
        self.paths
    }

    #[instrument(skip(self))]
    pub fn load_global(&self) -> Result<GlobalConfig, ConfigError> {
        let path = self.paths.global_config_path();
        if !path.exists() {
            debug!(?path, "no global config yet, using defaults");
            return Ok(GlobalConfig::defaults(self.paths));
        }

        global::load(&path)
    }

    #[instrument(skip(self, cfg))]
    pub fn save_global(&self, cfg: &GlobalConfig) -> Result<(), ConfigError> {
        let path = self.paths.global_config_path();
        global::save(&path, cfg)
    }

    #[instrument(skip(self))]
    pub fn load_app_raw(&self, name: &str) -> Result<AppState, ConfigError> {
        let path = self.paths.app_state_path(name);
        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io { path: path.clone(), source })?;
        let value: Value =
            serde_json::from_str(&text).map_err(|source| ConfigError::Json { path: path.clone(), source })?;

        if schema::looks_like_v1_app_state(&value) {
            return Err(ConfigError::NeedsMigration {
                path: path.clone(),
                from: "1.0.0".to_string(),
                to: CURRENT_CONFIG_VERSION.to_string(),
            });
        }

        schema::validate_app_state(&value)?;
        serde_json::from_value(value).map_err(|source| ConfigError::Json { path, source })
    }

    pub fn load_app_effective(&self, name: &str) -> Result<EffectiveConfig, ConfigError> {
        let state = self.load_app_raw(name)?;
        let state_value = serde_json::to_value(&state).expect("AppState always serializes");

        let merged = match state.source {
            Source::Catalog => {
                let catalog_ref =
                    state.catalog_ref.clone().ok_or_else(|| ConfigError::AppNotInstalled { name: name.to_string() })?;
                let entry = self
                    .catalog
                    .get(&catalog_ref)?
                    .ok_or_else(|| ConfigError::CatalogEntryMissing { name: catalog_ref })?;
                let catalog_value = serde_json::to_value(&entry).expect("CatalogEntry always serializes");
                let overrides = state_value.get("overrides").cloned().unwrap_or_else(|| Value::Object(Default::default()));
                let after_state = merge::deep_merge(catalog_value, state_value.get("state").cloned().unwrap_or(Value::Null));
                merge::deep_merge(after_state, overrides)
            }
            Source::Url => {
                let overrides = state_value.get("overrides").cloned().unwrap_or_else(|| Value::Object(Default::default()));
                merge::deep_merge(state_value.get("state").cloned().unwrap_or(Value::Null), overrides)
            }
        };

        Ok(EffectiveConfig { merged })
    }

    #[instrument(skip(self, state))]
    pub fn save_app(&self, name: &str, state: &AppState) -> Result<(), ConfigError> {
        let value = serde_json::to_value(state).expect("AppState always serializes");
        schema::validate_app_state(&value)?;

        let path = self.paths.app_state_path(name);
        atomic_write_json(&path, &value)
    }

    pub fn delete_app(&self, name: &str) -> Result<(), ConfigError> {
        let path = self.paths.app_state_path(name);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(ConfigError::Io { path, source }),
        }
    }

    pub fn list_installed(&self) -> Result<Vec<String>, ConfigError> {
        let dir = self.paths.apps_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in std::fs::read_dir(&dir).map_err(|source| ConfigError::Io { path: dir.clone(), source })? {
            let entry = entry.map_err(|source| ConfigError::Io { path: dir.clone(), source })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }

    pub fn catalog_exists(&self, name: &str) -> bool {
        self.catalog.contains(name)
    }
}

/// Validates then writes `value` to `path` via temp-file + atomic rename, the
/// pattern spec §5 requires for every config write.
pub(crate) fn atomic_write_json(path: &Path, value: &Value) -> Result<(), ConfigError> {
    let dir = path.parent().expect("state paths always have a parent");
    std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
    serde_json::to_writer_pretty(&mut tmp, value).map_err(|source| ConfigError::Json { path: path.to_path_buf(), source })?;
    tmp.persist(path).map_err(|e| ConfigError::Io { path: path.to_path_buf(), source: e.error })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_state(catalog_ref: &str) -> AppState {
        AppState {
            config_version: CURRENT_CONFIG_VERSION.to_string(),
            source: Source::Catalog,
            catalog_ref: Some(catalog_ref.to_string()),
            state: app_state::StateBlock {
                version: "24.1.1".to_string(),
                installed_date: "2026-01-01T00:00:00Z".to_string(),
                installed_path: "/tmp/qownnotes.AppImage".to_string(),
                verification: VerificationRecord {
                    passed: true,
                    methods: vec![VerifiedMethod {
                        kind: VerificationMethod::Digest,
                        status: app_state::VerifyStatus::Passed,
                        algorithm: Some("sha256".to_string()),
                        expected: Some("abc".to_string()),
                        computed: Some("abc".to_string()),
                        source: None,
                    }],
                },
                icon: IconState { installed: true, method: IconMethod::Extraction, path: Some("/tmp/qownnotes.png".to_string()) },
            },
            overrides: Value::Object(Default::default()),
        }
    }

    #[test]
    fn save_then_load_app_raw_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = PathResolver::rooted_at(tmp.path());
        paths.ensure_all().unwrap();
        let store = ConfigStore::new(&paths);

        let state = sample_state("qownnotes");
        store.save_app("qownnotes", &state).unwrap();

        let loaded = store.load_app_raw("qownnotes").unwrap();
        assert_eq!(loaded.state.version, "24.1.1");
        assert_eq!(loaded.catalog_ref.as_deref(), Some("qownnotes"));
    }

    #[test]
    fn load_app_raw_rejects_v1_flat_state() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = PathResolver::rooted_at(tmp.path());
        paths.ensure_all().unwrap();

        let v1 = serde_json::json!({"owner": "pbek", "repo": "QOwnNotes", "appimage": {"version": "24.1.1"}});
        atomic_write_json(&paths.app_state_path("joplin"), &v1).unwrap();

        let store = ConfigStore::new(&paths);
        let err = store.load_app_raw("joplin").unwrap_err();
        assert!(matches!(err, ConfigError::NeedsMigration { .. }));
    }

    #[test]
    fn delete_app_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = PathResolver::rooted_at(tmp.path());
        paths.ensure_all().unwrap();
        let store = ConfigStore::new(&paths);

        store.delete_app("never-installed").unwrap();
        store.delete_app("never-installed").unwrap();
    }

    #[test]
    fn list_installed_returns_sorted_names() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = PathResolver::rooted_at(tmp.path());
        paths.ensure_all().unwrap();
        let store = ConfigStore::new(&paths);

        store.save_app("standard-notes", &sample_state("standard-notes")).unwrap();
        store.save_app("appflowy", &sample_state("appflowy")).unwrap();

        assert_eq!(store.list_installed().unwrap(), vec!["appflowy", "standard-notes"]);
    }
}
