use humansize::{format_size, DECIMAL};

use crate::backup::BackupService;
use crate::errors::ExitCode;
use crate::orchestrator::Services;
use crate::Error;

#[derive(Debug, clap::Parser)]
pub struct BackupArgs {
    pub app: String,
    /// Restore the most recent backup.
    #[arg(long)]
    pub restore_last: bool,
    /// Restore a specific version.
    #[arg(long)]
    pub restore_version: Option<String>,
    /// List every backup kept for this app.
    #[arg(long)]
    pub list_backups: bool,
    /// Print backup metadata without acting.
    #[arg(long)]
    pub info: bool,
    /// Prune down to `max_backup` most recent entries.
    #[arg(long)]
    pub cleanup: bool,
    /// Migrate this app's state to the current format before backing up.
    #[arg(long)]
    pub migrate: bool,
}

pub async fn run(services: &Services<'_>, args: BackupArgs) -> Result<ExitCode, Error> {
    if args.migrate {
        crate::migrate::migrate_one(services.config, &args.app)?;
    }

    let backups = BackupService::new(services.paths);

    if args.restore_last || args.restore_version.is_some() {
        let state = services.config.load_app_raw(&args.app)?;
        let installed_path = std::path::PathBuf::from(&state.state.installed_path);
        backups
            .restore(&args.app, args.restore_version.as_deref(), &installed_path)
            .await
            .map_err(Error::from)?;
        println!("restored {}", args.app);
        return Ok(ExitCode::Success);
    }

    if args.cleanup {
        backups.prune(&args.app, services.global.max_backup).map_err(Error::from)?;
        println!("pruned backups for {}", args.app);
        return Ok(ExitCode::Success);
    }

    if args.list_backups || args.info {
        let metadata = backups.list(&args.app).map_err(Error::from)?;
        let mut versions: Vec<_> = metadata.versions.into_iter().collect();
        versions.sort_by(|a, b| a.0.cmp(&b.0));
        for (version, entry) in versions {
            println!("{version}  {}  {}", entry.created.to_rfc3339(), format_size(entry.size, DECIMAL));
        }
        return Ok(ExitCode::Success);
    }

    println!("nothing to do; pass --list-backups, --info, --restore-last, --restore-version, --cleanup, or --migrate");
    Ok(ExitCode::Success)
}
