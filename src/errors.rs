//! Crate-wide error taxonomy.
//!
//! Every subsystem defines its own leaf error enum (see each module); this
//! type is the sum of all of them and is what the CLI boundary matches on to
//! pick an exit code (spec §6).

use miette::Diagnostic;
use thiserror::Error;

use crate::{
    auth::AuthError, backup::BackupError, config::ConfigError, download::DownloadError,
    lock::LockError, migrate::MigrateError, postprocess::PostProcessError, release::ReleaseError,
    selector::SelectionError, verify::VerifyError,
};

#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Release(#[from] ReleaseError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Verify(#[from] VerifyError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    PostProcess(#[from] PostProcessError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Backup(#[from] BackupError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Migrate(#[from] MigrateError),

    #[error("no targets resolved")]
    #[diagnostic(code(my_unicorn::no_targets))]
    NoTargets,

    #[error("{target} is not a valid target (expected a catalog name, owner/repo, or GitHub URL)")]
    #[diagnostic(code(my_unicorn::bad_target))]
    BadTarget { target: String },

    #[error(transparent)]
    #[diagnostic(code(my_unicorn::io))]
    Io(#[from] std::io::Error),
}

/// Process exit codes, per spec §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    GenericFailure = 1,
    UsageError = 2,
    NoTargets = 3,
    LockContention = 4,
    NetworkError = 5,
    VerificationFailure = 6,
    ConfigRequired = 7,
}

impl Error {
    /// Maps an error to the process exit code the CLI should use.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Error::NoTargets => ExitCode::NoTargets,
            Error::Lock(_) => ExitCode::LockContention,
            Error::Config(ConfigError::NeedsMigration { .. } | ConfigError::MissingCatalog) => {
                ExitCode::ConfigRequired
            }
            Error::Release(ReleaseError::Network(_) | ReleaseError::RateLimited { .. }) => {
                ExitCode::NetworkError
            }
            Error::Download(DownloadError::Network(_)) => ExitCode::NetworkError,
            Error::Verify(VerifyError::Mismatch { .. }) => ExitCode::VerificationFailure,
            Error::BadTarget { .. } => ExitCode::UsageError,
            _ => ExitCode::GenericFailure,
        }
    }
}
