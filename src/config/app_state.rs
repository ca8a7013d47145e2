use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One per installed app (spec §3 `AppState`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppState {
    pub config_version: String,
    pub source: Source,
    pub catalog_ref: Option<String>,
    pub state: StateBlock,
    #[serde(default)]
    pub overrides: Value,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Catalog,
    Url,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StateBlock {
    pub version: String,
    pub installed_date: String,
    pub installed_path: String,
    pub verification: VerificationRecord,
    pub icon: IconState,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VerificationRecord {
    pub passed: bool,
    pub methods: Vec<VerifiedMethod>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VerifiedMethod {
    #[serde(rename = "type")]
    pub kind: VerificationMethod,
    pub status: VerifyStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub computed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VerifyStatus {
    Passed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VerificationMethod {
    Digest,
    ChecksumFile,
    Skip,
}

impl FromStr for VerificationMethod {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "digest" => Ok(Self::Digest),
            "checksum_file" => Ok(Self::ChecksumFile),
            "skip" => Ok(Self::Skip),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IconState {
    pub installed: bool,
    pub method: IconMethod,
    pub path: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IconMethod {
    Extraction,
    Download,
    None,
}

impl FromStr for IconMethod {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "extraction" => Ok(Self::Extraction),
            "download" => Ok(Self::Download),
            "none" => Ok(Self::None),
            _ => Err(()),
        }
    }
}
