//! Asset filter & selector (spec §4.6).
//!
//! Pure and fast — spec §5 explicitly excludes this from the suspension
//! points list, so everything here is synchronous, plain data in, plain
//! data out.

use miette::Diagnostic;
use thiserror::Error;

use crate::release::ReleaseAsset;

#[derive(Debug, Error, Diagnostic)]
pub enum SelectionError {
    #[error("no AppImage asset matches the host architecture {arch}")]
    #[diagnostic(code(my_unicorn::selector::no_asset_for_architecture))]
    NoAssetForArchitecture { arch: String },
}

/// The host CPU architecture, normalized the way the filter and selector
/// compare filenames against it (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostArch {
    X86_64,
    Aarch64,
}

impl HostArch {
    pub const fn current() -> Self {
        if cfg!(target_arch = "x86_64") {
            Self::X86_64
        } else if cfg!(target_arch = "aarch64") {
            Self::Aarch64
        } else {
            panic!("my-unicorn only supports x86_64 and aarch64 Linux hosts")
        }
    }

    /// Filename tokens that count as "this architecture" (spec §4.6: e.g.
    /// `x86_64`/`amd64` on x86_64; `aarch64`/`arm64` on aarch64).
    fn tokens(self) -> &'static [&'static str] {
        match self {
            Self::X86_64 => &["x86_64", "amd64", "x64"],
            Self::Aarch64 => &["aarch64", "arm64"],
        }
    }

    fn matches(self, name_lower: &str) -> bool {
        self.tokens().iter().any(|token| name_lower.contains(token))
    }

    fn is_arm(self) -> bool {
        matches!(self, Self::Aarch64)
    }
}

const SPECIAL_TOKENS: &[&str] = &["experimental", "beta", "legacy"];

fn is_appimage(name_lower: &str) -> bool {
    name_lower.ends_with(".appimage")
}

fn is_checksum_file(name_lower: &str) -> bool {
    name_lower.ends_with(".sha256")
        || name_lower.ends_with(".sha512")
        || name_lower.ends_with(".sha256sum")
        || name_lower.ends_with(".sha512sum")
        || name_lower.ends_with(".digest")
        || name_lower.starts_with("sha256sums")
        || name_lower.starts_with("sha512sums")
        || name_lower == "checksums.txt"
        || name_lower == "latest-linux.yml"
}

fn is_macos(name_lower: &str) -> bool {
    name_lower.ends_with(".dmg") || name_lower.contains("-mac-") || name_lower.starts_with("latest-mac")
}

fn is_windows(name_lower: &str) -> bool {
    name_lower.ends_with(".exe")
        || name_lower.ends_with(".msi")
        || (name_lower.ends_with(".zip") && name_lower.contains("win"))
}

fn is_arm_variant(name_lower: &str) -> bool {
    HostArch::Aarch64.matches(name_lower)
}

fn is_experimental_or_beta(name_lower: &str) -> bool {
    name_lower.contains("experimental") || name_lower.contains("beta")
}

/// Filters `assets` down to Linux AppImages and checksum files worth
/// caching (spec §4.6), applied once before a release is persisted.
///
/// `allow_prerelease_tokens` mirrors the catalog's `prerelease` flag: when
/// true, `experimental`/`beta` filenames are not excluded for lack of an
/// alternative (the catalog expects them).
pub fn filter_assets(assets: Vec<ReleaseAsset>, host_arch: HostArch) -> Vec<ReleaseAsset> {
    filter_assets_with(assets, host_arch, false)
}

pub fn filter_assets_with(assets: Vec<ReleaseAsset>, host_arch: HostArch, allow_prerelease_tokens: bool) -> Vec<ReleaseAsset> {
    assets
        .into_iter()
        .filter(|asset| {
            let name_lower = asset.name.to_ascii_lowercase();

            if is_macos(&name_lower) || is_windows(&name_lower) {
                return false;
            }

            if is_arm_variant(&name_lower) && !host_arch.is_arm() {
                return false;
            }

            if is_experimental_or_beta(&name_lower) && !allow_prerelease_tokens {
                return false;
            }

            is_appimage(&name_lower) || is_checksum_file(&name_lower)
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct Selection {
    pub appimage: ReleaseAsset,
    pub checksum_file: Option<ReleaseAsset>,
}

/// Picks the single best AppImage (and, when verification needs one, a
/// paired checksum file) from a filtered asset list (spec §4.6).
pub fn select(
    assets: &[ReleaseAsset],
    host_arch: HostArch,
    characteristic_suffix: &[String],
    expected_checksum_filenames: &[String],
) -> Result<Selection, SelectionError> {
    let candidates: Vec<&ReleaseAsset> = assets
        .iter()
        .filter(|asset| is_appimage(&asset.name.to_ascii_lowercase()))
        .filter(|asset| host_arch.matches(&asset.name.to_ascii_lowercase()))
        .collect();

    let best = rank(&candidates, host_arch, characteristic_suffix)
        .ok_or_else(|| SelectionError::NoAssetForArchitecture { arch: format!("{host_arch:?}") })?;

    let checksum_file = pair_checksum_file(assets, best, expected_checksum_filenames);

    Ok(Selection { appimage: best.clone(), checksum_file })
}

/// Ranks candidates by (1) characteristic-suffix match, (2) fewer special
/// tokens, (3) lexicographic name — and returns rank 1. Architecture
/// filtering has already happened by the time this is called.
fn rank<'a>(candidates: &[&'a ReleaseAsset], _host_arch: HostArch, characteristic_suffix: &[String]) -> Option<&'a ReleaseAsset> {
    let preferred_suffix = characteristic_suffix.iter().find(|s| !s.is_empty());

    candidates
        .iter()
        .copied()
        .min_by_key(|asset| {
            let name_lower = asset.name.to_ascii_lowercase();
            let suffix_rank = match preferred_suffix {
                Some(suffix) if asset.name.contains(suffix.as_str()) => 0,
                Some(_) => 1,
                None => 0,
            };
            let special_token_count = SPECIAL_TOKENS.iter().filter(|t| name_lower.contains(*t)).count();
            (suffix_rank, special_token_count, asset.name.clone())
        })
}

/// Matches a checksum-file asset to the selected AppImage: first by the
/// catalog's declared filenames, then by name-similarity (AppImage name's
/// prefix plus a known checksum extension).
fn pair_checksum_file(assets: &[ReleaseAsset], appimage: &ReleaseAsset, expected_filenames: &[String]) -> Option<ReleaseAsset> {
    if !expected_filenames.is_empty() {
        for expected in expected_filenames {
            if let Some(found) = assets.iter().find(|a| a.name == *expected) {
                return Some(found.clone());
            }
        }
    }

    let stem = appimage.name.strip_suffix(".AppImage").or_else(|| appimage.name.strip_suffix(".appimage"))?;

    assets
        .iter()
        .filter(|a| is_checksum_file(&a.name.to_ascii_lowercase()))
        .find(|a| a.name.starts_with(stem) || a.name == "latest-linux.yml" || a.name.to_ascii_lowercase().starts_with("sha256sums") || a.name.to_ascii_lowercase().starts_with("sha512sums"))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(name: &str) -> ReleaseAsset {
        ReleaseAsset {
            name: name.to_string(),
            digest: Some("sha256:abc".to_string()),
            size: 1024,
            browser_download_url: format!("https://example.com/{name}"),
            content_type: None,
        }
    }

    #[test]
    fn filter_drops_macos_and_windows_assets() {
        let assets = vec![asset("App-x86_64.AppImage"), asset("App.dmg"), asset("App-Setup.exe")];
        let filtered = filter_assets(assets, HostArch::X86_64);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].name, "App-x86_64.AppImage");
    }

    #[test]
    fn filter_drops_arm_appimage_on_x86_64_host() {
        let assets = vec![asset("App-x86_64.AppImage"), asset("App-aarch64.AppImage")];
        let filtered = filter_assets(assets, HostArch::X86_64);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].name, "App-x86_64.AppImage");
    }

    #[test]
    fn filter_keeps_checksum_files() {
        let assets = vec![asset("App-x86_64.AppImage"), asset("App-x86_64.AppImage.sha256"), asset("latest-linux.yml")];
        assert_eq!(filter_assets(assets, HostArch::X86_64).len(), 3);
    }

    #[test]
    fn select_picks_only_matching_architecture() {
        let assets = vec![asset("App-x86_64.AppImage"), asset("App-aarch64.AppImage")];
        let selected = select(&assets, HostArch::X86_64, &[], &[]).unwrap();
        assert_eq!(selected.appimage.name, "App-x86_64.AppImage");
    }

    #[test]
    fn select_prefers_characteristic_suffix() {
        let assets = vec![asset("App-Qt5-x86_64.AppImage"), asset("App-Qt6-x86_64.AppImage")];
        let selected = select(&assets, HostArch::X86_64, &["Qt6".to_string()], &[]).unwrap();
        assert_eq!(selected.appimage.name, "App-Qt6-x86_64.AppImage");
    }

    #[test]
    fn select_prefers_fewer_special_tokens() {
        let assets = vec![asset("App-beta-x86_64.AppImage"), asset("App-x86_64.AppImage")];
        let selected = select(&assets, HostArch::X86_64, &[], &[]).unwrap();
        assert_eq!(selected.appimage.name, "App-x86_64.AppImage");
    }

    #[test]
    fn select_fails_when_no_asset_matches_architecture() {
        let assets = vec![asset("App-aarch64.AppImage")];
        assert!(matches!(select(&assets, HostArch::X86_64, &[], &[]), Err(SelectionError::NoAssetForArchitecture { .. })));
    }

    #[test]
    fn select_pairs_checksum_file_by_catalog_filename() {
        let assets = vec![asset("App-x86_64.AppImage"), asset("SHA256SUMS")];
        let selected = select(&assets, HostArch::X86_64, &[], &["SHA256SUMS".to_string()]).unwrap();
        assert_eq!(selected.checksum_file.unwrap().name, "SHA256SUMS");
    }

    #[test]
    fn select_pairs_checksum_file_by_name_similarity() {
        let assets = vec![asset("App-x86_64.AppImage"), asset("App-x86_64.AppImage.sha256")];
        let selected = select(&assets, HostArch::X86_64, &[], &[]).unwrap();
        assert_eq!(selected.checksum_file.unwrap().name, "App-x86_64.AppImage.sha256");
    }

    #[test]
    fn empty_characteristic_suffix_falls_through_to_arch_and_token_rank() {
        let assets = vec![asset("App-legacy-x86_64.AppImage"), asset("App-x86_64.AppImage")];
        let selected = select(&assets, HostArch::X86_64, &[], &[]).unwrap();
        assert_eq!(selected.appimage.name, "App-x86_64.AppImage");
    }
}
