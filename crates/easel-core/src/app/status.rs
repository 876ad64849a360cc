//! Status - 外から見える状態
//!
//! UI や CLI はここの値だけを見ればよく、エラーを catch する必要はありません。

use serde::{Deserialize, Serialize};

use crate::observability::PendingCounts;

/// Lifecycle of one `Coordinator::start()` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "message")]
pub enum CoordinatorStatus {
    /// `start()` not called yet.
    Idle,
    Restoring,
    Ready,
    /// Restore failed. Terminal until `start()` is called again.
    Error(String),
}

impl CoordinatorStatus {
    pub fn is_error(&self) -> bool {
        matches!(self, CoordinatorStatus::Error(_))
    }
}

/// Point-in-time view of coordinator + manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStatus {
    pub coordinator: CoordinatorStatus,
    pub connected: bool,
    pub processing: bool,
    pub restored_task_count: usize,
    pub counts: PendingCounts,
}
