//! InMemoryTaskRepository - 開発・テスト用のリポジトリ
//!
//! プロセスが終わると消えます。永続化が必要なら JsonFileTaskRepository を使ってください。

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::records::RecordTable;
use crate::domain::{IllustrationTask, RepositoryError, TaskId, TaskStatus};
use crate::ports::{PendingTaskRecord, TaskRepository};

#[derive(Debug, Default)]
pub struct InMemoryTaskRepository {
    table: Mutex<RecordTable>,
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with existing records (e.g. a previous session's state).
    pub fn with_records(records: Vec<PendingTaskRecord>) -> Self {
        Self {
            table: Mutex::new(RecordTable::from_records(records)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RecordTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, id: TaskId) -> Option<PendingTaskRecord> {
        self.lock().get(id).cloned()
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn save_task(
        &self,
        task: &IllustrationTask,
        page_number: u32,
        total_pages: u32,
        description: &str,
        previous_illustration_path: Option<&str>,
    ) -> Result<PendingTaskRecord, RepositoryError> {
        Ok(self.lock().save(
            task,
            page_number,
            total_pages,
            description,
            previous_illustration_path,
        ))
    }

    async fn update_task_status(
        &self,
        id: TaskId,
        status: TaskStatus,
    ) -> Result<Option<PendingTaskRecord>, RepositoryError> {
        Ok(self.lock().update_status(id, status))
    }

    async fn update_attempt_count(
        &self,
        id: TaskId,
        attempt_count: u32,
    ) -> Result<Option<PendingTaskRecord>, RepositoryError> {
        Ok(self.lock().update_attempt_count(id, attempt_count))
    }

    async fn fetch_all_pending(&self) -> Result<Vec<PendingTaskRecord>, RepositoryError> {
        Ok(self.lock().pending())
    }

    async fn fetch_completed_ids(&self) -> Result<Vec<TaskId>, RepositoryError> {
        Ok(self.lock().completed_ids())
    }
}
