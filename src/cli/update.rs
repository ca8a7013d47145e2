use futures::stream::{self, StreamExt};

use crate::errors::ExitCode;
use crate::orchestrator::{update, Services, Summary, UpdateOptions};
use crate::Error;

#[derive(Debug, clap::Parser)]
pub struct UpdateArgs {
    /// Apps to update; if empty, every installed app is checked.
    pub targets: Vec<String>,
    /// Report available updates without installing them.
    #[arg(long)]
    pub check_only: bool,
    #[arg(long)]
    pub refresh_cache: bool,
    #[arg(long, default_value_t = 4)]
    pub concurrency: usize,
}

pub async fn run(services: &Services<'_>, args: UpdateArgs) -> Result<ExitCode, Error> {
    let targets = if args.targets.is_empty() { services.config.list_installed()? } else { args.targets };

    if targets.is_empty() {
        return Err(Error::NoTargets);
    }

    let options = UpdateOptions { check_only: args.check_only, refresh_cache: args.refresh_cache };
    let concurrency = args.concurrency.max(1);

    let outcomes: Vec<_> = stream::iter(targets.iter())
        .map(|app| update(services, app, &options))
        .buffer_unordered(concurrency)
        .collect()
        .await;

    let mut summary = Summary::default();
    for outcome in outcomes {
        summary.push(outcome);
    }
    summary.print();

    Ok(summary.exit_code())
}
