//! Install/update orchestrator (spec §4.9): the central state machine that
//! coordinates every other subsystem for one target at a time, dispatched
//! across targets with bounded concurrency by the CLI layer.

mod flow;
mod install;
mod report;
mod target;
mod update;

pub use install::{install, InstallOptions};
pub use report::{Outcome, Stage, Summary};
pub use target::{app_slug, parse as parse_target, Target};
pub use update::{update, UpdateOptions};

use std::sync::Arc;

use reqwest::Client;
use tokio_util::sync::CancellationToken;

use crate::auth::AuthManager;
use crate::config::{ConfigStore, GlobalConfig};
use crate::download::Downloader;
use crate::paths::PathResolver;
use crate::postprocess::PostProcessor;
use crate::progress::ProgressReporter;
use crate::release::ReleaseClient;

/// The dependency graph one command invocation needs, built once by the
/// composition root (spec §9: explicit constructor injection, no
/// module-level singletons beyond the lock and rate-limit state).
pub struct Services<'a> {
    pub paths: &'a PathResolver,
    pub config: &'a ConfigStore<'a>,
    pub global: &'a GlobalConfig,
    pub auth: Arc<AuthManager>,
    pub release_client: ReleaseClient,
    pub downloader: Downloader,
    pub postprocessor: PostProcessor,
    pub reporter: Arc<dyn ProgressReporter>,
    pub cancel: CancellationToken,
}

impl<'a> Services<'a> {
    pub fn new(
        paths: &'a PathResolver,
        config: &'a ConfigStore<'a>,
        global: &'a GlobalConfig,
        auth: Arc<AuthManager>,
        http: Client,
        reporter: Arc<dyn ProgressReporter>,
        cancel: CancellationToken,
    ) -> Result<Self, crate::Error> {
        let release_client = ReleaseClient::new(auth.clone())?;
        let downloader = Downloader::new(http.clone());
        let postprocessor = PostProcessor::new(http);

        Ok(Self { paths, config, global, auth, release_client, downloader, postprocessor, reporter, cancel })
    }
}
