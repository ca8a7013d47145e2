//! Token store & auth manager (spec §4.2).

mod manager;
mod token_store;

pub use manager::{AuthManager, RateLimitState};
pub(crate) use manager::user_agent;
pub use token_store::TokenStore;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum AuthError {
    #[error("the OS keyring is unavailable")]
    #[diagnostic(
        code(my_unicorn::auth::keyring_unavailable),
        help("requests will proceed unauthenticated; run `my-unicorn token --save` again once a keyring is available")
    )]
    KeyringUnavailable(#[source] keyring::Error),

    #[error("the provided token does not look like a GitHub personal access token")]
    #[diagnostic(code(my_unicorn::auth::invalid_token_format))]
    InvalidTokenFormat,
}
