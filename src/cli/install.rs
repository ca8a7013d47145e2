use futures::stream::{self, StreamExt};

use crate::errors::ExitCode;
use crate::orchestrator::{install, InstallOptions, Services, Summary};
use crate::Error;

#[derive(Debug, clap::Parser)]
pub struct InstallArgs {
    /// Catalog name, owner/repo, or GitHub URL, one or more.
    #[arg(required = true)]
    pub targets: Vec<String>,
    #[arg(long)]
    pub no_icon: bool,
    #[arg(long)]
    pub no_verify: bool,
    #[arg(long)]
    pub no_desktop: bool,
    #[arg(long, default_value_t = 4)]
    pub concurrency: usize,
}

pub async fn run(services: &Services<'_>, args: InstallArgs) -> Result<ExitCode, Error> {
    if args.targets.is_empty() {
        return Err(Error::NoTargets);
    }

    let options = InstallOptions { no_icon: args.no_icon, no_verify: args.no_verify, no_desktop: args.no_desktop };
    let concurrency = args.concurrency.max(1);

    let outcomes: Vec<_> = stream::iter(args.targets.iter())
        .map(|target| install(services, target, &options))
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
