use crate::errors::ExitCode;
use crate::orchestrator::Services;
use crate::Error;

#[derive(Debug, clap::Parser)]
pub struct AuthArgs {
    #[arg(long)]
    pub status: bool,
}

pub fn run(services: &Services<'_>, _args: AuthArgs) -> Result<ExitCode, Error> {
    let authenticated = services.auth.authenticated();
    let rate_limit = services.auth.rate_limit();

    println!("authenticated: {authenticated}");
    if let Some(remaining) = rate_limit.remaining {
        println!("rate limit: {remaining}/{} remaining", rate_limit.limit.unwrap_or_default());
    } else {
        println!("rate limit: unknown (no requests made yet this session)");
    }

    Ok(ExitCode::Success)
}
