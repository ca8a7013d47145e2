//! Command-line surface (spec §6). One [`Cli`] parsed by `clap`, dispatched
//! to one function per subcommand, each building whatever [`Services`] slice
//! it needs from the composition root in [`run`].

mod auth;
mod backup;
mod cache;
mod catalog;
mod config;
mod install;
mod migrate;
mod remove;
mod token;
mod update;

use std::sync::Arc;

use clap::builder::styling::Style;
use clap::builder::Styles;
use clap::Parser;
use owo_colors::OwoColorize;
use reqwest::Client;
use tokio_util::sync::CancellationToken;

use crate::config::ConfigStore;
use crate::errors::ExitCode;
use crate::lock::{LockMode, ProcessLock};
use crate::orchestrator::Services;
use crate::paths::PathResolver;
use crate::progress::{NullProgress, ProgressReporter, TerminalProgress};
use crate::Error;

/// Matches the teacher's `styles(STYLES)` clap header treatment.
pub static STYLES: Styles = Styles::styled()
    .header(Style::new().bold().underline())
    .usage(Style::new().bold().underline())
    .literal(Style::new().bold());

/// Status-line helper matching the teacher's `{:>12} Label` convention.
macro_rules! msg {
    ($label:expr, $($rest:tt)+) => {
        eprintln!("{:>12} {}", $label.green().bold(), format_args!($($rest)+))
    };
}
pub(crate) use msg;

#[derive(Debug, Parser)]
#[command(name = "my-unicorn", version, author, styles = STYLES)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Install one or more targets (catalog name, owner/repo, or URL).
    Install(install::InstallArgs),
    /// Check for and apply updates to installed apps.
    Update(update::UpdateArgs),
    /// Remove one or more installed apps.
    Remove(remove::RemoveArgs),
    /// Inspect the bundled application catalog.
    Catalog(catalog::CatalogArgs),
    /// Manage backups of an installed app.
    Backup(backup::BackupArgs),
    /// Inspect or clear the release metadata cache.
    Cache(cache::CacheArgs),
    /// Manage the stored GitHub personal access token.
    Token(token::TokenArgs),
    /// Report authentication status.
    Auth(auth::AuthArgs),
    /// Show the effective global configuration.
    Config(config::ConfigArgs),
    /// Migrate v1 app-state files to the current format.
    Migrate(migrate::MigrateArgs),
}

impl Command {
    /// Write commands take the exclusive lock; read commands take a shared
    /// one (spec §5).
    fn lock_mode(&self) -> LockMode {
        match self {
            Command::Install(_) | Command::Update(_) | Command::Remove(_) | Command::Migrate(_) => {
                LockMode::Exclusive
            }
            _ => LockMode::Shared,
        }
    }
}

/// Parses arguments, builds the composition root, and dispatches. Returns
/// the process exit code (spec §6); never panics on user-facing errors.
pub async fn run() -> ExitCode {
    let cli = Cli::parse();

    match run_inner(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {err}", "error:".red().bold());
            err.exit_code()
        }
    }
}

async fn run_inner(cli: Cli) -> Result<ExitCode, Error> {
    let paths = PathResolver::discover().map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;
    paths.ensure_all().map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;

    let _lock = ProcessLock::acquire(&paths.lock_path(), cli.command.lock_mode())?;

    let config = ConfigStore::new(&paths);
    let global = config.load_global()?;

    let auth = Arc::new(crate::auth::AuthManager::from_keyring());
    let http = Client::builder()
        .timeout(std::time::Duration::from_secs(global.network.timeout_seconds))
        .build()
        .expect("reqwest client builds with a fixed timeout");

    let reporter: Arc<dyn ProgressReporter> =
        if std::io::IsTerminal::is_terminal(&std::io::stderr()) { TerminalProgress::new() } else { NullProgress::new() };
    let cancel = CancellationToken::new();
    install_ctrlc_handler(cancel.clone());

    let services = Services::new(&paths, &config, &global, auth, http, reporter, cancel)?;

    match cli.command {
        Command::Install(args) => install::run(&services, args).await,
        Command::Update(args) => update::run(&services, args).await,
        Command::Remove(args) => remove::run(&services, args).await,
        Command::Catalog(args) => catalog::run(&services, args),
        Command::Backup(args) => backup::run(&services, args).await,
        Command::Cache(args) => cache::run(&services, args),
        Command::Token(args) => token::run(args),
        Command::Auth(args) => auth::run(&services, args),
        Command::Config(args) => config::run(&services, args),
        Command::Migrate(args) => migrate::run(&services, args),
    }
}

fn install_ctrlc_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("cancelling...");
            cancel.cancel();
        }
    });
}
