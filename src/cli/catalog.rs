use owo_colors::OwoColorize;

use crate::errors::ExitCode;
use crate::orchestrator::Services;
use crate::Error;

#[derive(Debug, clap::Parser)]
pub struct CatalogArgs {
    /// Show full metadata for every entry instead of just names.
    #[arg(long)]
    pub available: bool,
    /// Show full metadata for one entry.
    #[arg(long)]
    pub info: Option<String>,
}

pub fn run(services: &Services<'_>, args: CatalogArgs) -> Result<ExitCode, Error> {
    let catalog = services.config.catalog();

    if let Some(name) = &args.info {
        let entry = catalog
            .get(name)
            .map_err(crate::config::ConfigError::from)?
            .ok_or_else(|| Error::Config(crate::config::ConfigError::CatalogEntryMissing { name: name.clone() }))?;
        println!("{}", entry.metadata.name.bold());
        println!("  display name: {}", entry.metadata.display_name);
        println!("  description:  {}", entry.metadata.description);
        println!("  source:       {}/{}", entry.source.owner, entry.source.repo);
        println!("  verification: {}", entry.verification.method);
        println!("  icon:         {}", entry.icon.method);
        return Ok(ExitCode::Success);
    }

    for entry in catalog.list().map_err(crate::config::ConfigError::from)? {
        if args.available {
            println!("{} - {}", entry.metadata.name.bold(), entry.metadata.description);
        } else {
            println!("{}", entry.metadata.name);
        }
    }

    Ok(ExitCode::Success)
}
