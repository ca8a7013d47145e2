//! Desktop-entry generation (spec §4.10 step 3).

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum DesktopEntryError {
    #[error("failed to write desktop entry at {path}")]
    #[diagnostic(code(my_unicorn::postprocess::desktop::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Writes `${XDG_DATA_HOME}/applications/{app}.desktop` (spec §6 file
/// layout), atomically via temp-file + rename.
pub fn write_entry(
    app: &str,
    display_name: &str,
    exec_path: &Path,
    icon_path: Option<&Path>,
    dest: &Path,
) -> Result<(), DesktopEntryError> {
    let icon_line = icon_path.map(|p| format!("Icon={}\n", p.display())).unwrap_or_default();

    let contents = format!(
        "[Desktop Entry]\n\
         Name={display_name}\n\
         Exec={exec_path}\n\
         {icon_line}\
         Type=Application\n\
         Categories=Utility;\n",
        exec_path = exec_path.display(),
    );

    let dir = dest.parent().expect("desktop entry path always has a parent");
    std::fs::create_dir_all(dir).map_err(|source| DesktopEntryError::Io { path: dest.to_path_buf(), source })?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|source| DesktopEntryError::Io { path: dest.to_path_buf(), source })?;
    std::io::Write::write_all(&mut tmp, contents.as_bytes())
        .map_err(|source| DesktopEntryError::Io { path: dest.to_path_buf(), source })?;
    tmp.persist(dest).map_err(|e| DesktopEntryError::Io { path: dest.to_path_buf(), source: e.error })?;

    let _ = app;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_required_desktop_entry_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("qownnotes.desktop");

        write_entry(
            "qownnotes",
            "QOwnNotes",
            Path::new("/opt/apps/qownnotes.AppImage"),
            Some(Path::new("/opt/icons/qownnotes.png")),
            &dest,
        )
        .unwrap();

        let contents = std::fs::read_to_string(&dest).unwrap();
        assert!(contents.starts_with("[Desktop Entry]\n"));
        assert!(contents.contains("Name=QOwnNotes\n"));
        assert!(contents.contains("Exec=/opt/apps/qownnotes.AppImage\n"));
        assert!(contents.contains("Icon=/opt/icons/qownnotes.png\n"));
        assert!(contents.contains("Type=Application\n"));
        assert!(contents.contains("Categories=Utility;\n"));
    }

    #[test]
    fn omits_icon_line_when_no_icon_installed() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("app.desktop");

        write_entry("app", "App", Path::new("/opt/apps/app.AppImage"), None, &dest).unwrap();

        let contents = std::fs::read_to_string(&dest).unwrap();
        assert!(!contents.contains("Icon="));
    }
}
