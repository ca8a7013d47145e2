//! Per-target outcomes and the aggregate summary (spec §4.9, §7): one
//! target's failure never cancels its peers, so the orchestrator always
//! turns a `Result` into an `Outcome` before a target leaves the pool.

use owo_colors::OwoColorize;

use crate::errors::ExitCode;
use crate::Error;

/// Orchestrator state-machine stage (spec §4.9), attached to a failure so
/// the summary line can say where things went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Resolving,
    FetchingMetadata,
    SelectingAsset,
    Downloading,
    Verifying,
    PostProcessing,
    Committing,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Stage::Resolving => "resolving",
            Stage::FetchingMetadata => "fetching metadata",
            Stage::SelectingAsset => "selecting asset",
            Stage::Downloading => "downloading",
            Stage::Verifying => "verifying",
            Stage::PostProcessing => "post-processing",
            Stage::Committing => "committing",
        };
        f.write_str(label)
    }
}

#[derive(Debug)]
pub enum Outcome {
    Installed { app: String, version: String },
    AlreadyInstalled { app: String },
    Updated { app: String, from: String, to: String },
    UpdateAvailable { app: String, current: String, latest: String },
    UpToDate { app: String, version: String },
    Failed { target: String, stage: Stage, error: Error },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, Outcome::Failed { .. })
    }

    /// One summary line with a status icon, per spec §7.
    pub fn summary_line(&self) -> String {
        match self {
            Outcome::Installed { app, version } => format!("{} {app} {version}", "✓".green()),
            Outcome::AlreadyInstalled { app } => format!("{} {app} already installed", "•".blue()),
            Outcome::Updated { app, from, to } => format!("{} {app} {from} -> {to}", "✓".green()),
            Outcome::UpdateAvailable { app, current, latest } => format!("{} {app} {current} -> {latest} available", "•".blue()),
            Outcome::UpToDate { app, version } => format!("{} {app} already at {version}", "•".blue()),
            Outcome::Failed { target, stage, error } => format!("{} {target} failed while {stage}: {error}", "✗".red()),
        }
    }
}

/// Aggregate report across every target in one command invocation.
#[derive(Debug, Default)]
pub struct Summary {
    pub outcomes: Vec<Outcome>,
}

impl Summary {
    pub fn push(&mut self, outcome: Outcome) {
        self.outcomes.push(outcome);
    }

    pub fn successes(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_success()).count()
    }

    pub fn any_failed(&self) -> bool {
        self.failures() > 0
    }

    /// The process exit code for this command (spec §6): generic failure if
    /// any target failed, else success. Individual failures keep their own
    /// exit-code-worthy error for diagnostics, but the process itself
    /// reports a single code.
    pub fn exit_code(&self) -> ExitCode {
        if self.any_failed() {
            self.outcomes
                .iter()
                .find_map(|o| match o { Outcome::Failed { error, .. } => Some(error.exit_code()), _ => None })
                .unwrap_or(ExitCode::GenericFailure)
        } else {
            ExitCode::Success
        }
    }

    pub fn print(&self) {
        for outcome in &self.outcomes {
            eprintln!("{}", outcome.summary_line());
        }
        eprintln!(
            "{} succeeded, {} failed ({} total)",
            self.successes(),
            self.failures(),
            self.outcomes.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_successes_and_failures_separately() {
        let mut summary = Summary::default();
        summary.push(Outcome::Installed { app: "a".to_string(), version: "1.0.0".to_string() });
        summary.push(Outcome::Failed { target: "b".to_string(), stage: Stage::Downloading, error: Error::NoTargets });

        assert_eq!(summary.successes(), 1);
        assert_eq!(summary.failures(), 1);
        assert!(summary.any_failed());
    }

    #[test]
    fn all_successful_summary_exits_zero() {
        let mut summary = Summary::default();
        summary.push(Outcome::AlreadyInstalled { app: "a".to_string() });
        assert_eq!(summary.exit_code(), ExitCode::Success);
    }
}
