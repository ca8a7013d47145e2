use inquire::Password;

use crate::auth::{AuthError, TokenStore};
use crate::errors::ExitCode;
use crate::Error;

#[derive(Debug, clap::Parser)]
pub struct TokenArgs {
    /// Prompt for and store a GitHub personal access token.
    #[arg(long)]
    pub save: bool,
    /// Remove the stored token.
    #[arg(long)]
    pub remove: bool,
    /// Report whether a token is currently stored.
    #[arg(long)]
    pub check: bool,
}

pub fn run(args: TokenArgs) -> Result<ExitCode, Error> {
    if args.save {
        let token = Password::new("GitHub personal access token:")
            .without_confirmation()
            .prompt()
            .map_err(|_| Error::Auth(AuthError::InvalidTokenFormat))?;
        TokenStore::set(&token)?;
        println!("token saved");
        return Ok(ExitCode::Success);
    }

    if args.remove {
        TokenStore::delete()?;
        println!("token removed");
        return Ok(ExitCode::Success);
    }

    match TokenStore::get() {
        Some(_) => println!("a token is stored"),
        None => println!("no token stored"),
    }

    Ok(ExitCode::Success)
}
