use tracing::info;

use super::msg;
use crate::errors::ExitCode;
use crate::orchestrator::Services;
use crate::Error;

#[derive(Debug, clap::Parser)]
pub struct RemoveArgs {
    #[arg(required = true)]
    pub apps: Vec<String>,
    /// Keep the per-app state file instead of deleting it.
    #[arg(long)]
    pub keep_config: bool,
}

pub async fn run(services: &Services<'_>, args: RemoveArgs) -> Result<ExitCode, Error> {
    let mut any_failed = false;

    for app in &args.apps {
        if let Err(err) = remove_one(services, app, args.keep_config) {
            eprintln!("{app} failed to remove: {err}");
            any_failed = true;
            continue;
        }
        msg!("Removed", "{app}");
    }

    Ok(if any_failed { ExitCode::GenericFailure } else { ExitCode::Success })
}

fn remove_one(services: &Services<'_>, app: &str, keep_config: bool) -> Result<(), Error> {
    let state = services.config.load_app_raw(app)?;

    let installed_path = std::path::PathBuf::from(&state.state.installed_path);
    if installed_path.exists() {
        std::fs::remove_file(&installed_path)?;
    }

    if let Some(icon_path) = &state.state.icon.path {
        let path = std::path::PathBuf::from(icon_path);
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
    }

    let desktop_path = services.paths.desktop_entry_path(app);
    if desktop_path.exists() {
        std::fs::remove_file(&desktop_path)?;
    }

    if !keep_config {
        services.config.delete_app(app)?;
        let backup_dir = services.global.directory.backup.join(app);
        if backup_dir.exists() {
            std::fs::remove_dir_all(&backup_dir)?;
        }
    }

    info!(app, keep_config, "app removed");
    Ok(())
}
