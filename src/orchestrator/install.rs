//! Install operation (spec §4.9): resolve a target, fetch its release,
//! select/download/verify an asset, post-process, and commit `AppState`.

use chrono::Utc;
use serde_json::Value;
use tracing::instrument;

use crate::config::{
    AppState, ConfigError, IconMethod, IconState, Source, StateBlock, VerificationMethod, VerificationRecord,
};
use crate::release::{self, FetchOptions};
use crate::selector::{self, HostArch};
use crate::Error;

use super::flow::{download_selected, verification_failed, verify_asset};
use super::report::{Outcome, Stage};
use super::target::{self, Target};
use super::Services;

#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    pub no_icon: bool,
    pub no_verify: bool,
    pub no_desktop: bool,
}

/// Installs one target, never propagating its failure to the caller — it is
/// always folded into an [`Outcome`] (spec §4.9: "one target's failure never
/// cancels others").
#[instrument(skip(services, options))]
pub async fn install(services: &Services<'_>, raw_target: &str, options: &InstallOptions) -> Outcome {
    match install_inner(services, raw_target, options).await {
        Ok(outcome) => outcome,
        Err((stage, error)) => Outcome::Failed { target: raw_target.to_string(), stage, error },
    }
}

async fn install_inner(
    services: &Services<'_>,
    raw_target: &str,
    options: &InstallOptions,
) -> Result<Outcome, (Stage, Error)> {
    let catalog = services.config.catalog();
    let target = target::parse(raw_target, catalog).map_err(|e| (Stage::Resolving, e))?;
    let app = target::app_slug(&target);

    if services.config.load_app_raw(&app).is_ok() {
        return Ok(Outcome::AlreadyInstalled { app });
    }

    let descriptor = Descriptor::resolve(services, &target).map_err(|e| (Stage::Resolving, e))?;

    let options_for_fetch = FetchOptions::default();
    let cache = release::ReleaseCache::new(services.paths);
    let release_data = release::resolve(
        &cache,
        &services.release_client,
        &descriptor.owner,
        &descriptor.repo,
        descriptor.prerelease,
        24,
        &options_for_fetch,
    )
    .await
    .map_err(|e| (Stage::FetchingMetadata, Error::from(e)))?;

    let host_arch = HostArch::current();
    let selection = selector::select(&release_data.assets, host_arch, &descriptor.characteristic_suffix, &descriptor.checksum_filenames)
        .map_err(|e| (Stage::SelectingAsset, Error::from(e)))?;

    let tmp_dir = services.paths.tmp_dir();
    let (appimage_path, checksum_path) = download_selected(services, &app, &selection, &tmp_dir)
        .await
        .map_err(|e| (Stage::Downloading, Error::from(e)))?;

    let verified = verify_asset(
        services,
        &appimage_path,
        &selection.appimage.name,
        selection.appimage.digest.as_deref(),
        checksum_path.as_deref(),
        selection.checksum_file.as_ref().map(|a| a.name.as_str()),
        descriptor.verification_method,
        options.no_verify,
    )
    .await
    .map_err(|e| (Stage::Verifying, Error::from(e)))?;

    if verification_failed(&verified) && !options.no_verify {
        return Err((
            Stage::Verifying,
            Error::Verify(crate::verify::VerifyError::Mismatch {
                expected: verified.expected.clone().unwrap_or_default(),
                computed: verified.computed.clone().unwrap_or_default(),
            }),
        ));
    }

    let storage_dir = services.global.directory.storage.clone();
    let icon_dir = services.global.directory.icon.clone();
    let desktop_path = if options.no_desktop { None } else { Some(services.paths.desktop_entry_path(&app)) };
    let icon_method = if options.no_icon { IconMethod::None } else { descriptor.icon_method };

    let request = crate::postprocess::PostProcessRequest {
        downloaded_path: &appimage_path,
        target_name: &descriptor.target_name,
        storage_dir: &storage_dir,
        app: &app,
        display_name: &descriptor.display_name,
        icon_method,
        icon_url: descriptor.icon_url.as_deref(),
        icon_dir: &icon_dir,
        desktop_entry_path: desktop_path.as_deref(),
    };

    let processed = services.postprocessor.process(request).await.map_err(|e| (Stage::PostProcessing, Error::from(e)))?;

    let icon_installed = matches!(processed.icon, crate::postprocess::IconOutcome::Installed { .. });
    let (icon_path, icon_record_method) = match &processed.icon {
        crate::postprocess::IconOutcome::Installed { path, method } => (Some(path.display().to_string()), *method),
        crate::postprocess::IconOutcome::None => (None, IconMethod::None),
    };

    let state = AppState {
        config_version: crate::config::CURRENT_CONFIG_VERSION.to_string(),
        source: if descriptor.catalog_ref.is_some() { Source::Catalog } else { Source::Url },
        catalog_ref: descriptor.catalog_ref.clone(),
        state: StateBlock {
            version: release_data.version.clone(),
            installed_date: Utc::now().to_rfc3339(),
            installed_path: processed.installed_path.display().to_string(),
            verification: VerificationRecord { passed: verified.status == crate::config::VerifyStatus::Passed, methods: vec![verified] },
            icon: IconState { installed: icon_installed, method: icon_record_method, path: icon_path },
        },
        overrides: if descriptor.catalog_ref.is_some() { Value::Object(Default::default()) } else { descriptor.url_overrides() },
    };

    services.config.save_app(&app, &state).map_err(|e| (Stage::Committing, Error::from(e)))?;

    Ok(Outcome::Installed { app, version: release_data.version })
}

/// Everything a `Target` resolves to before a release has been fetched —
/// pulled from the catalog entry for catalog targets, or synthesized with
/// sane defaults for URL targets (spec §4.9 step 1, scenario 2).
struct Descriptor {
    owner: String,
    repo: String,
    prerelease: bool,
    catalog_ref: Option<String>,
    target_name: String,
    display_name: String,
    characteristic_suffix: Vec<String>,
    checksum_filenames: Vec<String>,
    verification_method: VerificationMethod,
    icon_method: IconMethod,
    icon_url: Option<String>,
}

impl Descriptor {
    fn resolve(services: &Services<'_>, target: &Target) -> Result<Self, Error> {
        match target {
            Target::Catalog(name) => {
                let entry = services
                    .config
                    .catalog()
                    .get(name)
                    .ok_or_else(|| Error::Config(ConfigError::CatalogEntryMissing { name: name.clone() }))?;

                Ok(Self {
                    owner: entry.source.owner,
                    repo: entry.source.repo,
                    prerelease: entry.source.prerelease,
                    catalog_ref: Some(name.clone()),
                    target_name: entry.appimage.naming.target_name,
                    display_name: entry.metadata.display_name,
                    characteristic_suffix: entry.appimage.naming.characteristic_suffix,
                    checksum_filenames: entry.verification.checksum_files.into_iter().map(|c| c.filename).collect(),
                    verification_method: entry.verification.method.parse().unwrap_or(VerificationMethod::Skip),
                    icon_method: entry.icon.method.parse().unwrap_or(IconMethod::None),
                    icon_url: entry.icon.url,
                })
            }
            Target::Repo { owner, repo } => Ok(Self {
                owner: owner.clone(),
                repo: repo.clone(),
                prerelease: false,
                catalog_ref: None,
                target_name: repo.clone(),
                display_name: repo.clone(),
                characteristic_suffix: Vec::new(),
                checksum_filenames: Vec::new(),
                verification_method: VerificationMethod::Digest,
                icon_method: IconMethod::Extraction,
                icon_url: None,
            }),
        }
    }

    /// The `overrides` block persisted for a `source=url` app: it must carry
    /// every field an effective-config merge would otherwise get from a
    /// catalog entry (spec §3 invariant on `AppState`).
    fn url_overrides(&self) -> Value {
        serde_json::json!({
            "metadata": {
                "name": self.target_name,
                "display_name": self.display_name,
                "description": "",
            },
            "source": {
                "type": "github",
                "owner": self.owner,
                "repo": self.repo,
                "prerelease": self.prerelease,
            },
            "appimage": {
                "naming": {
                    "template": "{repo}",
                    "target_name": self.target_name,
                    "architectures": [],
                    "characteristic_suffix": Vec::<String>::new(),
                },
            },
            "verification": {
                "method": "digest",
                "checksum_files": Vec::<Value>::new(),
            },
            "icon": {
                "method": "extraction",
                "filename": format!("{}.png", self.target_name),
            },
        })
    }
}
