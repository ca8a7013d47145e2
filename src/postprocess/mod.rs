//! Post-download processor (spec §4.10): permissions, icon, desktop entry,
//! atomic install. Steps 1–3 record warnings on failure rather than
//! failing the install (partial-success policy); step 4 is fatal.

mod desktop;
mod icon;

pub use desktop::DesktopEntryError;
pub use icon::IconError;

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use thiserror::Error;
use tracing::warn;

use crate::config::IconMethod;
use crate::download;

#[derive(Debug, Error, Diagnostic)]
pub enum PostProcessError {
    #[error("failed to install the AppImage to {path}")]
    #[diagnostic(code(my_unicorn::postprocess::install_failed))]
    Install {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to set the executable bit on {path}")]
    #[diagnostic(code(my_unicorn::postprocess::permissions))]
    Permissions {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IconOutcome {
    Installed { path: PathBuf, method: IconMethod },
    None,
}

#[derive(Debug)]
pub struct PostProcessOutcome {
    pub installed_path: PathBuf,
    pub icon: IconOutcome,
    pub desktop_entry_written: bool,
    pub warnings: Vec<String>,
}

pub struct PostProcessRequest<'a> {
    pub downloaded_path: &'a Path,
    pub target_name: &'a str,
    pub storage_dir: &'a Path,
    pub app: &'a str,
    pub display_name: &'a str,
    pub icon_method: IconMethod,
    pub icon_url: Option<&'a str>,
    pub icon_dir: &'a Path,
    pub desktop_entry_path: Option<&'a Path>,
}

pub struct PostProcessor {
    http: reqwest::Client,
}

impl PostProcessor {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    #[tracing::instrument(skip(self, request))]
    pub async fn process(&self, request: PostProcessRequest<'_>) -> Result<PostProcessOutcome, PostProcessError> {
        let installed_path = request.storage_dir.join(format!("{}.AppImage", request.target_name));

        download::atomic_move(request.downloaded_path, &installed_path)
            .await
            .map_err(|source| PostProcessError::Install { path: installed_path.clone(), source: io_error(source) })?;

        set_executable(&installed_path).map_err(|source| PostProcessError::Permissions { path: installed_path.clone(), source })?;

        let mut warnings = Vec::new();

        let icon_outcome = match request.icon_method {
            IconMethod::Extraction => match icon::extract(&installed_path, request.icon_dir, request.app) {
                Ok(path) => IconOutcome::Installed { path, method: IconMethod::Extraction },
                Err(err) => {
                    warn!(error = %err, "icon extraction failed, continuing without an icon");
                    warnings.push(format!("icon extraction failed: {err}"));
                    IconOutcome::None
                }
            },
            IconMethod::Download => match request.icon_url {
                Some(url) => match self.download_icon(url, request.icon_dir, request.app).await {
                    Ok(path) => IconOutcome::Installed { path, method: IconMethod::Download },
                    Err(err) => {
                        warn!(error = %err, "icon download failed, continuing without an icon");
                        warnings.push(format!("icon download failed: {err}"));
                        IconOutcome::None
                    }
                },
                None => {
                    warnings.push("icon method is `download` but the catalog entry has no icon url".to_string());
                    IconOutcome::None
                }
            },
            IconMethod::None => IconOutcome::None,
        };

        let desktop_entry_written = match request.desktop_entry_path {
            Some(dest) => {
                let icon_path = match &icon_outcome {
                    IconOutcome::Installed { path, .. } => Some(path.as_path()),
                    IconOutcome::None => None,
                };
                match desktop::write_entry(request.app, request.display_name, &installed_path, icon_path, dest) {
                    Ok(()) => true,
                    Err(err) => {
                        warn!(error = %err, "desktop entry write failed");
                        warnings.push(format!("desktop entry write failed: {err}"));
                        false
                    }
                }
            }
            None => false,
        };

        Ok(PostProcessOutcome { installed_path, icon: icon_outcome, desktop_entry_written, warnings })
    }

    async fn download_icon(&self, url: &str, icon_dir: &Path, app: &str) -> Result<PathBuf, IconDownloadError> {
        let response = self.http.get(url).send().await?.error_for_status()?;
        let ext = guess_extension(url, response.headers());
        let bytes = response.bytes().await?;

        std::fs::create_dir_all(icon_dir).map_err(|source| IconDownloadError::Io { path: icon_dir.to_path_buf(), source })?;
        let dest = icon_dir.join(format!("{app}.{ext}"));
        std::fs::write(&dest, &bytes).map_err(|source| IconDownloadError::Io { path: dest.clone(), source })?;
        Ok(dest)
    }
}

#[derive(Debug, Error)]
enum IconDownloadError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("failed to write {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
}

fn guess_extension(url: &str, headers: &reqwest::header::HeaderMap) -> &'static str {
    if url.ends_with(".svg") {
        return "svg";
    }
    if url.ends_with(".png") {
        return "png";
    }
    match headers.get(reqwest::header::CONTENT_TYPE).and_then(|v| v.to_str().ok()) {
        Some(ct) if ct.contains("svg") => "svg",
        _ => "png",
    }
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<(), std::io::Error> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms)
}

fn io_error(err: download::DownloadError) -> std::io::Error {
    match err {
        download::DownloadError::Io { source, .. } => source,
        other => std::io::Error::other(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_executable_sets_owner_group_other_exec_bits() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), b"#!/bin/sh\n").unwrap();
        set_executable(tmp.path()).unwrap();

        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(tmp.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn guess_extension_prefers_url_suffix() {
        let headers = reqwest::header::HeaderMap::new();
        assert_eq!(guess_extension("https://example.com/icon.svg", &headers), "svg");
        assert_eq!(guess_extension("https://example.com/icon.png", &headers), "png");
    }
}
