//! Schema validator (spec §4.3).
//!
//! Validates the on-disk JSON representations of [`AppState`](crate::config::AppState),
//! [`CatalogEntry`](crate::config::CatalogEntry), and
//! [`CachedRelease`](crate::release::CachedRelease) against JSON-Schema
//! draft-07 documents embedded in the binary. Also carries the dedicated
//! v1-detection rule used only to raise a migration-required error.

use std::sync::LazyLock;

use jsonschema::Validator;
use miette::Diagnostic;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
#[diagnostic(code(my_unicorn::schema::validation_failed))]
pub struct SchemaError {
    /// JSON pointer to the offending value, e.g. `/state/verification/passed`.
    pub pointer: String,
    pub message: String,
}

const APP_STATE_SCHEMA: &str = include_str!("schema/app_state.schema.json");
const CATALOG_ENTRY_SCHEMA: &str = include_str!("schema/catalog_entry.schema.json");
const CACHED_RELEASE_SCHEMA: &str = include_str!("schema/cached_release.schema.json");

static APP_STATE_VALIDATOR: LazyLock<Validator> = LazyLock::new(|| compile(APP_STATE_SCHEMA));
static CATALOG_ENTRY_VALIDATOR: LazyLock<Validator> = LazyLock::new(|| compile(CATALOG_ENTRY_SCHEMA));
static CACHED_RELEASE_VALIDATOR: LazyLock<Validator> = LazyLock::new(|| compile(CACHED_RELEASE_SCHEMA));

fn compile(schema: &str) -> Validator {
    let document: Value = serde_json::from_str(schema).expect("embedded schema is valid JSON");
    jsonschema::validator_for(&document).expect("embedded schema is valid draft-07")
}

fn validate_with(validator: &Validator, value: &Value) -> Result<(), SchemaError> {
    if let Some(error) = validator.iter_errors(value).next() {
        return Err(SchemaError {
            pointer: error.instance_path.to_string(),
            message: error.to_string(),
        });
    }

    Ok(())
}

pub fn validate_app_state(value: &Value) -> Result<(), SchemaError> {
    validate_with(&APP_STATE_VALIDATOR, value)
}

pub fn validate_catalog_entry(value: &Value) -> Result<(), SchemaError> {
    validate_with(&CATALOG_ENTRY_VALIDATOR, value)
}

pub fn validate_cached_release(value: &Value) -> Result<(), SchemaError> {
    validate_with(&CACHED_RELEASE_VALIDATOR, value)
}

/// True if `value` looks like a v1-flat app-state file: `owner`/`repo` at the
/// top level, and no `config_version == "2.0.0"`. Used only to raise
/// `ConfigError::NeedsMigration` — v1 is never loaded as live state.
pub fn looks_like_v1_app_state(value: &Value) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };

    let has_legacy_fields = obj.contains_key("owner") && obj.contains_key("repo");
    let is_v2 = obj.get("config_version").and_then(Value::as_str) == Some("2.0.0");

    has_legacy_fields && !is_v2
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn detects_v1_flat_state() {
        let v1 = json!({"owner": "pbek", "repo": "QOwnNotes", "appimage": {"version": "24.1.1"}});
        assert!(looks_like_v1_app_state(&v1));
    }

    #[test]
    fn does_not_flag_v2_state_even_with_legacy_looking_fields() {
        let v2 = json!({"config_version": "2.0.0", "owner": "irrelevant", "repo": "irrelevant"});
        assert!(!looks_like_v1_app_state(&v2));
    }

    #[test]
    fn valid_catalog_entry_passes_validation() {
        let entry = json!({
            "metadata": {"name": "qownnotes", "display_name": "QOwnNotes", "description": "Notes app"},
            "source": {"type": "github", "owner": "pbek", "repo": "QOwnNotes", "prerelease": false},
            "appimage": {"naming": {"template": "QOwnNotes-x86_64.AppImage", "target_name": "qownnotes", "architectures": ["x86_64"]}},
            "verification": {"method": "digest"},
            "icon": {"method": "extraction", "filename": "qownnotes.png"}
        });

        assert!(validate_catalog_entry(&entry).is_ok());
    }

    #[test]
    fn catalog_entry_missing_source_fails_validation() {
        let entry = json!({
            "metadata": {"name": "qownnotes", "display_name": "QOwnNotes", "description": "Notes app"},
            "appimage": {"naming": {"template": "x", "target_name": "qownnotes", "architectures": ["x86_64"]}},
            "verification": {"method": "digest"},
            "icon": {"method": "extraction", "filename": "qownnotes.png"}
        });

        assert!(validate_catalog_entry(&entry).is_err());
    }
}
