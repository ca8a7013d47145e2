use crate::errors::ExitCode;
use crate::migrate;
use crate::orchestrator::Services;
use crate::Error;

#[derive(Debug, clap::Parser)]
pub struct MigrateArgs {}

pub fn run(services: &Services<'_>, _args: MigrateArgs) -> Result<ExitCode, Error> {
    let migrated = migrate::migrate_all(services.config)?;

    if migrated.is_empty() {
        println!("nothing to migrate");
    } else {
        for app in migrated {
            println!("migrated {} (backup: {})", app.name, app.backup_path.display());
        }
    }

    Ok(ExitCode::Success)
}
