use serde::{Deserialize, Serialize};

/// Snapshot of a manager's pending set, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingCounts {
    pub pending: usize,
    /// Selectable right now.
    pub eligible: usize,
    /// Waiting on at least one unsatisfied dependency.
    pub blocked: usize,
    pub completed_dependencies: usize,
}
