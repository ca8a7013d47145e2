//! Shared download + verify steps (spec §4.9 states `Downloading` and
//! `Verifying`), factored out because install and update run them
//! identically once a [`Selection`] has been made.

use std::path::{Path, PathBuf};

use crate::config::{VerificationMethod, VerifiedMethod, VerifyStatus};
use crate::download::DownloadError;
use crate::selector::Selection;
use crate::verify::{self, VerifyError};

use super::Services;

/// Downloads the selected AppImage and, when present, its paired checksum
/// file concurrently (spec §4.7: "within a single install... fetched in
/// parallel").
pub(super) async fn download_selected(
    services: &Services<'_>,
    app: &str,
    selection: &Selection,
    tmp_dir: &Path,
) -> Result<(PathBuf, Option<PathBuf>), DownloadError> {
    let appimage_dest = tmp_dir.join(format!("{app}.AppImage"));
    let appimage_fut = services.downloader.download(
        &selection.appimage.browser_download_url,
        &appimage_dest,
        tmp_dir,
        Some(selection.appimage.size),
        services.reporter.clone(),
        services.cancel.clone(),
    );

    let checksum_fut = async {
        match &selection.checksum_file {
            Some(asset) => {
                let dest = tmp_dir.join(format!("{app}-{}", asset.name));
                let path = services
                    .downloader
                    .download(&asset.browser_download_url, &dest, tmp_dir, Some(asset.size), services.reporter.clone(), services.cancel.clone())
                    .await?;
                Ok(Some(path))
            }
            None => Ok(None),
        }
    };

    tokio::try_join!(appimage_fut, checksum_fut)
}

/// Runs the verification strategy selected by `method` (spec §4.8),
/// falling back to [`verify::skip`] when `no_verify` is set or the chosen
/// strategy has nothing to check against (no digest, no paired checksum
/// file) — treated as "no expected hash available" rather than a failure.
pub(super) async fn verify_asset(
    services: &Services<'_>,
    appimage_path: &Path,
    appimage_name: &str,
    digest: Option<&str>,
    checksum_path: Option<&Path>,
    checksum_file_name: Option<&str>,
    method: VerificationMethod,
    no_verify: bool,
) -> Result<VerifiedMethod, VerifyError> {
    if no_verify {
        return Ok(verify::skip());
    }

    let reporter = services.reporter.as_ref();

    match method {
        VerificationMethod::Digest => match digest {
            Some(digest) => verify::verify_digest(appimage_path, digest, Some(reporter)).await,
            None => Ok(verify::skip()),
        },
        VerificationMethod::ChecksumFile => match (checksum_path, checksum_file_name) {
            (Some(path), Some(name)) => {
                let text = fs_err::tokio::read_to_string(path).await.map_err(|source| VerifyError::Io { path: path.to_path_buf(), source })?;
                verify::verify_checksum_file(appimage_path, appimage_name, &text, name, Some(reporter)).await
            }
            _ => Ok(verify::skip()),
        },
        VerificationMethod::Skip => Ok(verify::skip()),
    }
}

pub(super) fn verification_failed(method: &VerifiedMethod) -> bool {
    method.status == VerifyStatus::Failed
}
