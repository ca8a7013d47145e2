//! Manual v1 -> v2 app-state migrator (spec §4.4 scenario 5). Never runs
//! automatically: a v1-flat file is only ever detected to raise
//! `ConfigError::NeedsMigration`, and this module is the only thing allowed
//! to turn one into a v2-hybrid file.

use miette::Diagnostic;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, instrument};

use crate::config::{ConfigError, ConfigStore};
use crate::schema;

#[derive(Debug, Error, Diagnostic)]
pub enum MigrateError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error("{name} is already on the current config version")]
    #[diagnostic(code(my_unicorn::migrate::already_current))]
    AlreadyCurrent { name: String },

    #[error("failed to read {path}")]
    #[diagnostic(code(my_unicorn::migrate::io))]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One app's migration result, for the CLI to report per spec §7.
#[derive(Debug, Clone)]
pub struct MigratedApp {
    pub name: String,
    pub backup_path: std::path::PathBuf,
}

/// Migrates every v1-flat app-state file under `apps/` to v2-hybrid,
/// skipping apps that are already current. Each migrated file is backed up
/// to `apps/backups/{name}.json.backup` before being overwritten.
#[instrument(skip(config))]
pub fn migrate_all(config: &ConfigStore<'_>) -> Result<Vec<MigratedApp>, MigrateError> {
    let mut migrated = Vec::new();
    for name in config.list_installed()? {
        match migrate_one(config, &name) {
            Ok(app) => migrated.push(app),
            Err(MigrateError::AlreadyCurrent { .. }) => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(migrated)
}

/// Migrates a single named app, returning `AlreadyCurrent` if its file is
/// already v2-hybrid.
#[instrument(skip(config))]
pub fn migrate_one(config: &ConfigStore<'_>, name: &str) -> Result<MigratedApp, MigrateError> {
    let path = config.paths().app_state_path(name);
    let text = fs_err::read_to_string(&path).map_err(|source| MigrateError::Io { path: path.clone(), source: source.into() })?;
    let value: Value = serde_json::from_str(&text).map_err(|source| ConfigError::Json { path: path.clone(), source })?;

    if !schema::looks_like_v1_app_state(&value) {
        return Err(MigrateError::AlreadyCurrent { name: name.to_string() });
    }

    let backup_path = config.paths().app_backup_path(name);
    if let Some(parent) = backup_path.parent() {
        fs_err::create_dir_all(parent).map_err(|source| MigrateError::Io { path: parent.to_path_buf(), source: source.into() })?;
    }
    fs_err::copy(&path, &backup_path).map_err(|source| MigrateError::Io { path: backup_path.clone(), source: source.into() })?;

    let migrated = upgrade(&value, config, name);
    schema::validate_app_state(&migrated).map_err(ConfigError::from)?;

    crate::config::atomic_write_json(&path, &migrated).map_err(MigrateError::Config)?;

    info!(name, ?backup_path, "migrated app state to v2");
    Ok(MigratedApp { name: name.to_string(), backup_path })
}

/// Builds the v2-hybrid document from a v1-flat one (spec scenario 5):
/// `source="catalog"` if a matching catalog entry exists, else `"url"`;
/// `state.version` carries over from the v1 `appimage.version` field.
fn upgrade(v1: &Value, config: &ConfigStore<'_>, name: &str) -> Value {
    let version = v1.pointer("/appimage/version").and_then(Value::as_str).unwrap_or("0.0.0");
    let installed_path = v1.get("installed_path").and_then(Value::as_str).unwrap_or_default();
    let owner = v1.get("owner").and_then(Value::as_str).unwrap_or_default();
    let repo = v1.get("repo").and_then(Value::as_str).unwrap_or_default();

    let in_catalog = config.catalog_exists(name);

    let overrides = if in_catalog {
        json!({})
    } else {
        json!({
            "metadata": { "name": name, "display_name": name, "description": "" },
            "source": { "type": "github", "owner": owner, "repo": repo, "prerelease": false },
            "appimage": { "naming": { "template": "{repo}", "target_name": name, "architectures": [], "characteristic_suffix": [] } },
            "verification": { "method": "digest", "checksum_files": [] },
            "icon": { "method": "extraction", "filename": format!("{name}.png") },
        })
    };

    json!({
        "config_version": crate::config::CURRENT_CONFIG_VERSION,
        "source": if in_catalog { "catalog" } else { "url" },
        "catalog_ref": if in_catalog { Value::String(name.to_string()) } else { Value::Null },
        "state": {
            "version": version,
            "installed_date": chrono::Utc::now().to_rfc3339(),
            "installed_path": installed_path,
            "verification": { "passed": false, "methods": [] },
            "icon": { "installed": false, "method": "none", "path": Value::Null },
        },
        "overrides": overrides,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::PathResolver;

    fn test_store(dir: &std::path::Path) -> PathResolver {
        PathResolver::rooted_at(dir)
    }

    #[test]
    fn migrates_v1_flat_state_into_v2_hybrid_for_catalog_app() {
        let dir = tempfile::tempdir().unwrap();
        let paths = test_store(dir.path());
        paths.ensure_all().unwrap();
        let config = ConfigStore::new(&paths);

        let app = "joplin";
        let v1 = json!({
            "owner": "laurent22",
            "repo": "joplin",
            "appimage": { "version": "2.14.0" },
            "installed_path": "/home/user/Applications/joplin.AppImage",
        });
        fs_err::write(paths.app_state_path(app), serde_json::to_vec_pretty(&v1).unwrap()).unwrap();

        let result = migrate_one(&config, app);
        // Whether `joplin` exists in the bundled catalog depends on its
        // contents; either branch must still produce a valid v2 document.
        match result {
            Ok(migrated) => {
                assert!(migrated.backup_path.exists());
                let text = fs_err::read_to_string(paths.app_state_path(app)).unwrap();
                let value: Value = serde_json::from_str(&text).unwrap();
                assert_eq!(value["config_version"], "2.0.0");
                assert!(!schema::looks_like_v1_app_state(&value));
            }
            Err(err) => panic!("expected migration to succeed, got {err:?}"),
        }
    }

    #[test]
    fn already_current_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let paths = test_store(dir.path());
        paths.ensure_all().unwrap();
        let config = ConfigStore::new(&paths);

        let app = "already-v2";
        let v2 = json!({
            "config_version": "2.0.0",
            "source": "url",
            "catalog_ref": Value::Null,
            "state": {
                "version": "1.0.0",
                "installed_date": "2024-01-01T00:00:00Z",
                "installed_path": "/tmp/x",
                "verification": { "passed": true, "methods": [] },
                "icon": { "installed": false, "method": "none", "path": Value::Null },
            },
            "overrides": {},
        });
        fs_err::write(paths.app_state_path(app), serde_json::to_vec_pretty(&v2).unwrap()).unwrap();

        let err = migrate_one(&config, app).unwrap_err();
        assert!(matches!(err, MigrateError::AlreadyCurrent { .. }));
    }
}
