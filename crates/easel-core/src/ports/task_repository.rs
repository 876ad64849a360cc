//! TaskRepository port - タスクレコードの永続化
//!
//! プロセス再起動後も pending のタスクを復元できるように、
//! 1 タスク 1 レコードで保存します。
//!
//! # 設計原則
//! - Scheduler 自身は履歴を持たない（完了の記録はここの責務）
//! - restore は「全件 fetch → 全件 add」の順で行い、fetch 失敗時は何も add しない
//! - ready になったタスクの id も復元する（依存している pending タスクを解放するため）

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{IllustrationTask, RepositoryError, TaskId, TaskStatus};
use crate::queue::TaskManager;

/// One persisted task plus the page context needed to render it again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTaskRecord {
    #[serde(flatten)]
    pub task: IllustrationTask,
    pub page_number: u32,
    pub total_pages: u32,
    pub description: String,
    pub previous_illustration_path: Option<String>,
}

impl PendingTaskRecord {
    /// Should this record be re-admitted after a restart?
    ///
    /// `generating` counts: the process died mid-render.
    pub fn is_pending(&self) -> bool {
        matches!(
            self.task.status,
            TaskStatus::Pending | TaskStatus::Scheduled | TaskStatus::Generating
        )
    }

    /// Rebuild the task value for a fresh manager.
    pub fn to_task(&self) -> IllustrationTask {
        let mut task = self.task.clone();
        if task.status == TaskStatus::Generating {
            task.status = TaskStatus::Pending;
        }
        task
    }
}

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn save_task(
        &self,
        task: &IllustrationTask,
        page_number: u32,
        total_pages: u32,
        description: &str,
        previous_illustration_path: Option<&str>,
    ) -> Result<PendingTaskRecord, RepositoryError>;

    /// Returns `None` when no record has this id.
    async fn update_task_status(
        &self,
        id: TaskId,
        status: TaskStatus,
    ) -> Result<Option<PendingTaskRecord>, RepositoryError>;

    /// Returns `None` when no record has this id.
    async fn update_attempt_count(
        &self,
        id: TaskId,
        attempt_count: u32,
    ) -> Result<Option<PendingTaskRecord>, RepositoryError>;

    /// All records that should be re-admitted, oldest first.
    async fn fetch_all_pending(&self) -> Result<Vec<PendingTaskRecord>, RepositoryError>;

    /// Ids of tasks whose record is `ready`.
    async fn fetch_completed_ids(&self) -> Result<Vec<TaskId>, RepositoryError>;

    /// Mark every `ready` id as a completed dependency, then add every
    /// pending record to `manager`.
    ///
    /// Both fetches happen before the manager is touched.
    /// Returns the number of tasks restored.
    async fn restore_tasks_to_manager(
        &self,
        manager: &TaskManager,
    ) -> Result<usize, RepositoryError> {
        let completed = self.fetch_completed_ids().await?;
        let records = self.fetch_all_pending().await?;

        for id in &completed {
            manager.add_completed_dependency(*id);
        }
        let count = records.len();
        for record in &records {
            manager.add_task(record.to_task());
        }
        debug!(
            count,
            completed = completed.len(),
            "restored pending tasks into manager"
        );
        Ok(count)
    }
}
