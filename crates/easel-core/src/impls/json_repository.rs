//! JsonFileTaskRepository - 1 ファイルの JSON にタスクレコードを保存
//!
//! # 実装詳細
//! - 最初のアクセス時にファイルを読み込む（無ければ空）
//! - 変更のたびに全件を書き出す（temp ファイル → rename）
//! - 件数は 1 ストーリーあたり数十〜数百なので全件書き出しで十分

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use super::records::RecordTable;
use crate::domain::{IllustrationTask, RepositoryError, TaskId, TaskStatus};
use crate::ports::{PendingTaskRecord, TaskRepository};

const STATE_VERSION: u8 = 1;

/// On-disk layout.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StateFile {
    #[serde(default = "default_state_version")]
    version: u8,
    #[serde(default)]
    tasks: Vec<PendingTaskRecord>,
}

fn default_state_version() -> u8 {
    STATE_VERSION
}

pub struct JsonFileTaskRepository {
    path: PathBuf,
    /// `None` until loaded.
    table: Mutex<Option<RecordTable>>,
}

impl JsonFileTaskRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            table: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> RepositoryError {
        RepositoryError::Io {
            path: self.path.clone(),
            source,
        }
    }

    async fn load(&self) -> Result<RecordTable, RepositoryError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no task state yet");
                return Ok(RecordTable::default());
            }
            Err(e) => return Err(self.io_error(e)),
        };
        let state: StateFile = serde_json::from_slice(&bytes)?;
        debug!(
            path = %self.path.display(),
            version = state.version,
            records = state.tasks.len(),
            "loaded task state"
        );
        Ok(RecordTable::from_records(state.tasks))
    }

    async fn persist(&self, table: &RecordTable) -> Result<(), RepositoryError> {
        let state = StateFile {
            version: STATE_VERSION,
            tasks: table.all(),
        };
        let bytes = serde_json::to_vec_pretty(&state)?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error(e))
    }

    /// Run `f` against a copy of the loaded table. When `dirty` says so the copy is
    /// persisted and only then replaces the table; a failed write leaves it untouched.
    async fn with_table<T>(
        &self,
        f: impl FnOnce(&mut RecordTable) -> T,
        dirty: impl FnOnce(&T) -> bool,
    ) -> Result<T, RepositoryError> {
        let mut guard = self.table.lock().await;
        if guard.is_none() {
            *guard = Some(self.load().await?);
        }
        let Some(table) = guard.as_ref() else {
            return Err(RepositoryError::Unavailable("task state not loaded".into()));
        };
        let mut next = table.clone();
        let out = f(&mut next);
        if dirty(&out) {
            self.persist(&next).await?;
            *guard = Some(next);
        }
        Ok(out)
    }
}

#[async_trait]
impl TaskRepository for JsonFileTaskRepository {
    async fn save_task(
        &self,
        task: &IllustrationTask,
        page_number: u32,
        total_pages: u32,
        description: &str,
        previous_illustration_path: Option<&str>,
    ) -> Result<PendingTaskRecord, RepositoryError> {
        self.with_table(
            |table| {
                table.save(
                    task,
                    page_number,
                    total_pages,
                    description,
                    previous_illustration_path,
                )
            },
            |_| true,
        )
        .await
    }

    async fn update_task_status(
        &self,
        id: TaskId,
        status: TaskStatus,
    ) -> Result<Option<PendingTaskRecord>, RepositoryError> {
        self.with_table(|table| table.update_status(id, status), Option::is_some)
            .await
    }

    async fn update_attempt_count(
        &self,
        id: TaskId,
        attempt_count: u32,
    ) -> Result<Option<PendingTaskRecord>, RepositoryError> {
        self.with_table(
            |table| table.update_attempt_count(id, attempt_count),
            Option::is_some,
        )
        .await
    }

    async fn fetch_all_pending(&self) -> Result<Vec<PendingTaskRecord>, RepositoryError> {
        self.with_table(|table| table.pending(), |_| false).await
    }

    async fn fetch_completed_ids(&self) -> Result<Vec<TaskId>, RepositoryError> {
        self.with_table(|table| table.completed_ids(), |_| false)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PageId, StoryId, TaskPriority, TaskType};
    use crate::queue::TaskManager;
    use chrono::Utc;

    fn task(n: u128) -> IllustrationTask {
        IllustrationTask::new(
            TaskId::from_u128(n),
            StoryId::from_u128(1),
            PageId::from_u128(n),
            TaskPriority::High,
            TaskType::PageIllustration,
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn state_survives_a_new_repository_instance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("tasks.json");

        {
            let repo = JsonFileTaskRepository::new(&path);
            repo.save_task(&task(1), 1, 2, "the lighthouse", None)
                .await
                .unwrap();
            repo.save_task(&task(2), 2, 2, "the storm", Some("page-1.png"))
                .await
                .unwrap();
            repo.update_task_status(TaskId::from_u128(1), TaskStatus::Ready)
                .await
                .unwrap();
        }

        // "process restart"
        let repo = JsonFileTaskRepository::new(&path);
        let manager = TaskManager::new();
        let restored = repo.restore_tasks_to_manager(&manager).await.unwrap();

        assert_eq!(restored, 1);
        let pending = manager.pending_tasks();
        assert_eq!(pending[0].id, TaskId::from_u128(2));
    }

    #[tokio::test]
    async fn missing_file_means_no_pending_tasks() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonFileTaskRepository::new(dir.path().join("tasks.json"));

        assert!(repo.fetch_all_pending().await.unwrap().is_empty());
        assert!(!repo.path().exists());
    }

    #[tokio::test]
    async fn failed_write_leaves_state_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.json");
        let repo = JsonFileTaskRepository::new(&path);
        repo.save_task(&task(1), 1, 2, "the lighthouse", None)
            .await
            .unwrap();

        // the temp file cannot be created where a directory sits
        std::fs::create_dir(path.with_extension("json.tmp")).unwrap();
        let err = repo
            .save_task(&task(2), 2, 2, "the storm", None)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Io { .. }));
        let err = repo
            .update_task_status(TaskId::from_u128(1), TaskStatus::Ready)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Io { .. }));

        let pending = repo.fetch_all_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].task.id, TaskId::from_u128(1));
        assert_eq!(pending[0].task.status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let repo = JsonFileTaskRepository::new(&path);
        let err = repo.fetch_all_pending().await.unwrap_err();
        assert!(matches!(err, RepositoryError::Corrupt(_)));
    }
}
