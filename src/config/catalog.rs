use rust_embed::RustEmbed;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::{self, SchemaError};

/// The bundled, read-only application catalog (spec §3 `CatalogEntry`).
///
/// Embedded into the binary at compile time with `rust-embed`, the same way
/// the retrieval pack's desktop-updater examples bundle static assets —
/// there is no "install prefix" to scan for a single static binary.
#[derive(RustEmbed)]
#[folder = "catalog/"]
struct CatalogAssets;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogEntry {
    pub metadata: CatalogMetadata,
    pub source: CatalogSource,
    pub appimage: CatalogAppImage,
    pub verification: CatalogVerification,
    pub icon: CatalogIcon,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogMetadata {
    pub name: String,
    pub display_name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogSource {
    #[serde(rename = "type")]
    pub kind: String,
    pub owner: String,
    pub repo: String,
    pub prerelease: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogAppImage {
    pub naming: CatalogNaming,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogNaming {
    pub template: String,
    pub target_name: String,
    pub architectures: Vec<String>,
    #[serde(default)]
    pub characteristic_suffix: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogVerification {
    pub method: String,
    #[serde(default)]
    pub checksum_files: Vec<CatalogChecksumFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogChecksumFile {
    pub filename: String,
    pub hash_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogIcon {
    pub method: String,
    pub filename: String,
    #[serde(default)]
    pub url: Option<String>,
}

pub struct CatalogStore;

impl CatalogStore {
    pub fn bundled() -> Self {
        Self
    }

    /// Loads the catalog entry named `name`, if it exists. Rejects (rather
    /// than silently skipping) an entry that fails the catalog v2 schema
    /// (spec §4.3, §8 invariant: every catalog entry validates on load).
    pub fn get(&self, name: &str) -> Result<Option<CatalogEntry>, SchemaError> {
        let Some(file) = CatalogAssets::get(&format!("{name}.json")) else {
            return Ok(None);
        };

        Ok(Some(decode_validated(&file.data)?))
    }

    pub fn contains(&self, name: &str) -> bool {
        CatalogAssets::get(&format!("{name}.json")).is_some()
    }

    /// Lists every bundled catalog entry, sorted by name. Fails on the first
    /// entry that doesn't validate rather than dropping it from the list.
    pub fn list(&self) -> Result<Vec<CatalogEntry>, SchemaError> {
        let mut entries = Vec::new();
        for path in CatalogAssets::iter() {
            let file = CatalogAssets::get(&path).expect("path came from this store's own iter()");
            entries.push(decode_validated(&file.data)?);
        }

        entries.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
        Ok(entries)
    }
}

fn decode_validated(data: &[u8]) -> Result<CatalogEntry, SchemaError> {
    let value: Value = serde_json::from_slice(data).map_err(|source| SchemaError {
        pointer: String::new(),
        message: format!("catalog entry is not valid JSON: {source}"),
    })?;

    schema::validate_catalog_entry(&value)?;

    serde_json::from_value(value).map_err(|source| SchemaError {
        pointer: String::new(),
        message: format!("catalog entry passed schema validation but failed to decode: {source}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_catalog_contains_qownnotes() {
        let catalog = CatalogStore::bundled();
        assert!(catalog.contains("qownnotes"));
        let entry = catalog.get("qownnotes").unwrap().unwrap();
        assert_eq!(entry.source.owner, "pbek");
    }

    #[test]
    fn missing_entry_returns_none() {
        let catalog = CatalogStore::bundled();
        assert!(catalog.get("does-not-exist").unwrap().is_none());
    }

    #[test]
    fn list_is_sorted_and_nonempty() {
        let catalog = CatalogStore::bundled();
        let names: Vec<_> = catalog.list().unwrap().into_iter().map(|e| e.metadata.name).collect();
        assert!(!names.is_empty());
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn invalid_entry_is_rejected_rather_than_skipped() {
        let bad = serde_json::json!({"metadata": {"name": "x"}});
        assert!(decode_validated(bad.to_string().as_bytes()).is_err());
    }
}
