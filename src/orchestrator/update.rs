//! Update operation (spec §4.9): re-resolve an installed app's release,
//! skip if not newer, otherwise back up, replace, and re-verify.

use chrono::Utc;
use tracing::instrument;

use crate::backup::{self, BackupService};
use crate::config::{VerificationRecord, VerifyStatus};
use crate::release::{self, FetchOptions};
use crate::selector::{self, HostArch};
use crate::Error;

use super::flow::{download_selected, verification_failed, verify_asset};
use super::report::{Outcome, Stage};
use super::Services;

#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    /// Report whether a newer release exists without downloading it.
    pub check_only: bool,
    /// Bypass the release cache regardless of freshness.
    pub refresh_cache: bool,
}

/// Updates one installed app, folding any failure into an [`Outcome`]
/// rather than propagating it (spec §4.9).
#[instrument(skip(services, options))]
pub async fn update(services: &Services<'_>, app: &str, options: &UpdateOptions) -> Outcome {
    match update_inner(services, app, options).await {
        Ok(outcome) => outcome,
        Err((stage, error)) => Outcome::Failed { target: app.to_string(), stage, error },
    }
}

async fn update_inner(services: &Services<'_>, app: &str, options: &UpdateOptions) -> Result<Outcome, (Stage, Error)> {
    let raw_state = services.config.load_app_raw(app).map_err(|e| (Stage::Resolving, Error::from(e)))?;
    let effective = services.config.load_app_effective(app).map_err(|e| (Stage::Resolving, Error::from(e)))?;

    let (owner, repo) = effective
        .owner_repo()
        .ok_or_else(|| (Stage::Resolving, Error::BadTarget { target: app.to_string() }))?;

    let cache = release::ReleaseCache::new(services.paths);
    let fetch_options = FetchOptions { refresh_cache: options.refresh_cache };
    let release_data = release::resolve(&cache, &services.release_client, &owner, &repo, effective.prerelease(), 24, &fetch_options)
        .await
        .map_err(|e| (Stage::FetchingMetadata, Error::from(e)))?;

    let current_version = raw_state.state.version.clone();
    if backup::compare_versions(&release_data.version, &current_version) != std::cmp::Ordering::Greater {
        return Ok(Outcome::UpToDate { app: app.to_string(), version: current_version });
    }

    if options.check_only {
        return Ok(Outcome::UpdateAvailable { app: app.to_string(), current: current_version, latest: release_data.version });
    }

    let characteristic_suffix = effective.characteristic_suffixes();
    let checksum_filenames = effective.checksum_filenames();
    let verification_method = effective.verification_method();
    let icon_method = effective.icon_method();
    let icon_url = effective.icon_url();
    let display_name = effective.display_name();
    let target_name = effective.target_name().unwrap_or_else(|| app.to_string());

    let selection = selector::select(&release_data.assets, HostArch::current(), &characteristic_suffix, &checksum_filenames)
        .map_err(|e| (Stage::SelectingAsset, Error::from(e)))?;

    let backups = BackupService::new(services.paths);
    let installed_path = std::path::PathBuf::from(&raw_state.state.installed_path);
    backups
        .create_backup(app, &current_version, &installed_path)
        .await
        .map_err(|e| (Stage::Downloading, Error::from(e)))?;

    let tmp_dir = services.paths.tmp_dir();
    let download_result = download_selected(services, app, &selection, &tmp_dir).await;

    let (appimage_path, checksum_path) = match download_result {
        Ok(paths) => paths,
        Err(err) => return Err((Stage::Downloading, Error::from(err))),
    };

    let verified = verify_asset(
        services,
        &appimage_path,
        &selection.appimage.name,
        selection.appimage.digest.as_deref(),
        checksum_path.as_deref(),
        selection.checksum_file.as_ref().map(|a| a.name.as_str()),
        verification_method,
        false,
    )
    .await
    .map_err(|e| (Stage::Verifying, Error::from(e)))?;

    if verification_failed(&verified) {
        backups
            .restore(app, Some(&current_version), &installed_path)
            .await
            .map_err(|e| (Stage::Verifying, Error::from(e)))?;

        return Err((
            Stage::Verifying,
            Error::Verify(crate::verify::VerifyError::Mismatch {
                expected: verified.expected.unwrap_or_default(),
                computed: verified.computed.unwrap_or_default(),
            }),
        ));
    }

    let storage_dir = services.global.directory.storage.clone();
    let icon_dir = services.global.directory.icon.clone();
    let desktop_path = services.paths.desktop_entry_path(app);

    let request = crate::postprocess::PostProcessRequest {
        downloaded_path: &appimage_path,
        target_name: &target_name,
        storage_dir: &storage_dir,
        app,
        display_name: &display_name,
        icon_method,
        icon_url: icon_url.as_deref(),
        icon_dir: &icon_dir,
        desktop_entry_path: Some(&desktop_path),
    };

    let processed = match services.postprocessor.process(request).await {
        Ok(processed) => processed,
        Err(err) => {
            backups
                .restore(app, Some(&current_version), &installed_path)
                .await
                .map_err(|e| (Stage::PostProcessing, Error::from(e)))?;
            return Err((Stage::PostProcessing, Error::from(err)));
        }
    };

    let icon_installed = matches!(processed.icon, crate::postprocess::IconOutcome::Installed { .. });
    let (icon_path, icon_record_method) = match &processed.icon {
        crate::postprocess::IconOutcome::Installed { path, method } => (Some(path.display().to_string()), *method),
        crate::postprocess::IconOutcome::None => (None, raw_state.state.icon.method),
    };

    let mut new_state = raw_state;
    new_state.state.version = release_data.version.clone();
    new_state.state.installed_date = Utc::now().to_rfc3339();
    new_state.state.installed_path = processed.installed_path.display().to_string();
    new_state.state.verification = VerificationRecord { passed: verified.status == VerifyStatus::Passed, methods: vec![verified] };
    new_state.state.icon.installed = icon_installed;
    new_state.state.icon.method = icon_record_method;
    if let Some(path) = icon_path {
        new_state.state.icon.path = Some(path);
    }

    services.config.save_app(app, &new_state).map_err(|e| (Stage::Committing, Error::from(e)))?;
    backups.prune(app, services.global.max_backup).map_err(|e| (Stage::Committing, Error::from(e)))?;

    Ok(Outcome::Updated { app: app.to_string(), from: current_version, to: release_data.version })
}
