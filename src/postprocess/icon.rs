//! Icon extraction (spec §4.10, SPEC_FULL.md §E): mount-less extraction of
//! an AppImage's embedded icon via `squishy`'s `appimage` feature, which
//! reads the squashfs payload directly without a `squashfuse`/FUSE mount.

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use squishy::appimage::AppImage;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, Diagnostic)]
pub enum IconError {
    #[error("failed to open {path} as an AppImage payload")]
    #[diagnostic(code(my_unicorn::postprocess::icon::open_failed))]
    Open {
        path: PathBuf,
        #[source]
        source: squishy::error::SquishyError,
    },

    #[error("no icon could be located inside the AppImage")]
    #[diagnostic(code(my_unicorn::postprocess::icon::not_found))]
    NotFound,

    #[error("failed to write extracted icon to {path}")]
    #[diagnostic(code(my_unicorn::postprocess::icon::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Extracts the best available icon from `appimage_path` into
/// `${icon_dir}/{app}.{ext}`, preferring `.DirIcon` (almost always PNG) over
/// the desktop entry's `Icon=` reference (which may point at an SVG) — the
/// KDE taskbar rendering constraint spec §4.10 calls out.
pub fn extract(appimage_path: &Path, icon_dir: &Path, app: &str) -> Result<PathBuf, IconError> {
    let image = AppImage::new(appimage_path.to_path_buf(), None)
        .map_err(|source| IconError::Open { path: appimage_path.to_path_buf(), source })?;

    let entries = image.list_files().map_err(|source| IconError::Open { path: appimage_path.to_path_buf(), source })?;

    let dir_icon = entries.iter().find(|name| *name == ".DirIcon" || name.ends_with("/.DirIcon"));
    let desktop_icon_name = entries
        .iter()
        .find(|name| name.ends_with(".desktop"))
        .and_then(|desktop_path| image.read_file(desktop_path).ok())
        .and_then(|bytes| parse_desktop_icon_key(&String::from_utf8_lossy(&bytes)));

    let (source_name, prefer_png) = match (dir_icon, &desktop_icon_name) {
        (Some(dir_icon), _) => (dir_icon.clone(), true),
        (None, Some(icon_name)) => {
            let candidate = entries
                .iter()
                .find(|name| name.ends_with(&format!("{icon_name}.png")))
                .or_else(|| entries.iter().find(|name| name.ends_with(&format!("{icon_name}.svg"))))
                .cloned()
                .ok_or(IconError::NotFound)?;
            (candidate, false)
        }
        (None, None) => return Err(IconError::NotFound),
    };

    let _ = prefer_png;
    let data = image.read_file(&source_name).map_err(|source| IconError::Open { path: appimage_path.to_path_buf(), source })?;

    let ext = if source_name.ends_with(".svg") { "svg" } else { "png" };
    let dest = icon_dir.join(format!("{app}.{ext}"));
    std::fs::create_dir_all(icon_dir).map_err(|source| IconError::Io { path: dest.clone(), source })?;
    std::fs::write(&dest, &data).map_err(|source| IconError::Io { path: dest.clone(), source })?;

    debug!(app, ?dest, "icon extracted");
    Ok(dest)
}

/// Pulls the value of `Icon=` out of a `.desktop` file's `[Desktop Entry]`
/// section.
fn parse_desktop_icon_key(text: &str) -> Option<String> {
    let mut in_desktop_entry = false;
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.eq_ignore_ascii_case("[desktop entry]") {
            in_desktop_entry = true;
            continue;
        }
        if trimmed.starts_with('[') {
            in_desktop_entry = false;
            continue;
        }
        if in_desktop_entry && let Some(value) = trimmed.strip_prefix("Icon=") {
            return Some(value.trim().to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_icon_key_from_desktop_entry_section() {
        let text = "[Desktop Entry]\nName=App\nIcon=app-icon\nExec=app\n";
        assert_eq!(parse_desktop_icon_key(text), Some("app-icon".to_string()));
    }

    #[test]
    fn ignores_icon_key_outside_desktop_entry_section() {
        let text = "[Some Other Section]\nIcon=wrong\n[Desktop Entry]\nIcon=right\n";
        assert_eq!(parse_desktop_icon_key(text), Some("right".to_string()));
    }

    #[test]
    fn returns_none_when_no_icon_key_present() {
        let text = "[Desktop Entry]\nName=App\n";
        assert_eq!(parse_desktop_icon_key(text), None);
    }
}
