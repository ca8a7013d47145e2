use humansize::{format_size, DECIMAL};

use crate::errors::ExitCode;
use crate::orchestrator::Services;
use crate::Error;

#[derive(Debug, clap::Parser)]
pub struct CacheArgs {
    /// Print cache size and entry count.
    #[arg(long)]
    pub stats: bool,
    /// Clear the cached release for one app, or every entry with `--all`.
    #[arg(long)]
    pub clear: Option<Option<String>>,
    #[arg(long)]
    pub all: bool,
}

pub fn run(services: &Services<'_>, args: CacheArgs) -> Result<ExitCode, Error> {
    let dir = services.paths.release_cache_dir();

    if let Some(app) = &args.clear {
        if args.all || app.is_none() {
            if dir.exists() {
                std::fs::remove_dir_all(&dir)?;
                std::fs::create_dir_all(&dir)?;
            }
            println!("cleared all release cache entries");
            return Ok(ExitCode::Success);
        }

        let app = app.as_deref().expect("checked above");
        let effective = services.config.load_app_effective(app)?;
        if let Some((owner, repo)) = effective.owner_repo() {
            let path = services.paths.release_cache_path(&owner, &repo);
            if path.exists() {
                std::fs::remove_file(&path)?;
            }
            println!("cleared release cache entry for {app}");
        }
        return Ok(ExitCode::Success);
    }

    let (count, total) = scan_dir(&dir);
    println!("{count} cached releases, {}", format_size(total, DECIMAL));

    Ok(ExitCode::Success)
}

fn scan_dir(dir: &std::path::Path) -> (usize, u64) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return (0, 0);
    };

    let mut count = 0;
    let mut total = 0;
    for entry in entries.flatten() {
        if let Ok(metadata) = entry.metadata() {
            count += 1;
            total += metadata.len();
        }
    }
    (count, total)
}
