//! Progress notification port
//!
//! Defines the interface for reporting progress during collection and pooling.

/// A stage of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// First pass over every under-quota cell
    Collection,
    /// A bounded re-collection pass (1-based)
    Recollection(usize),
    /// Pooled evaluation of one category
    Pooling,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Collection => "collection",
            Phase::Recollection(_) => "re-collection",
            Phase::Pooling => "pooling",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Recollection(pass) => write!(f, "re-collection pass {}", pass),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

/// Callback for progress updates during a run
///
/// Implementations live in the presentation layer and can display
/// progress in various ways (progress bars, plain logs, etc.)
pub trait ProgressNotifier: Send + Sync {
    /// Called when a phase starts with the number of work items
    fn on_phase_start(&self, phase: &Phase, total_tasks: usize);

    /// Called when a work item (cell or pair) completes
    fn on_task_complete(&self, phase: &Phase, task: &str, success: bool);

    /// Called when a phase completes
    fn on_phase_complete(&self, phase: &Phase);
}

/// No-op progress notifier for when progress reporting is not needed
pub struct NoProgress;

impl ProgressNotifier for NoProgress {
    fn on_phase_start(&self, _phase: &Phase, _total_tasks: usize) {}
    fn on_task_complete(&self, _phase: &Phase, _task: &str, _success: bool) {}
    fn on_phase_complete(&self, _phase: &Phase) {}
}
