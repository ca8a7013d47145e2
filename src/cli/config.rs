use crate::errors::ExitCode;
use crate::orchestrator::Services;
use crate::Error;

#[derive(Debug, clap::Parser)]
pub struct ConfigArgs {
    #[arg(long)]
    pub show: bool,
}

pub fn run(services: &Services<'_>, _args: ConfigArgs) -> Result<ExitCode, Error> {
    let global = services.config.load_global()?;
    let text = serde_json::to_string_pretty(&global).expect("GlobalConfig always serializes");
    println!("{text}");
    Ok(ExitCode::Success)
}
