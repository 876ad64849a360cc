//! Record table shared by the repository implementations.

use std::collections::HashMap;

use crate::domain::{IllustrationTask, TaskId, TaskStatus};
use crate::ports::PendingTaskRecord;

#[derive(Debug, Clone, Default)]
pub(crate) struct RecordTable {
    records: HashMap<TaskId, PendingTaskRecord>,
}

impl RecordTable {
    pub(crate) fn from_records(records: Vec<PendingTaskRecord>) -> Self {
        Self {
            records: records.into_iter().map(|r| (r.task.id, r)).collect(),
        }
    }

    /// Insert or overwrite the record for `task.id`.
    pub(crate) fn save(
        &mut self,
        task: &IllustrationTask,
        page_number: u32,
        total_pages: u32,
        description: &str,
        previous_illustration_path: Option<&str>,
    ) -> PendingTaskRecord {
        let record = PendingTaskRecord {
            task: task.clone(),
            page_number,
            total_pages,
            description: description.to_string(),
            previous_illustration_path: previous_illustration_path.map(str::to_string),
        };
        self.records.insert(task.id, record.clone());
        record
    }

    pub(crate) fn update_status(
        &mut self,
        id: TaskId,
        status: TaskStatus,
    ) -> Option<PendingTaskRecord> {
        let record = self.records.get_mut(&id)?;
        record.task.status = status;
        Some(record.clone())
    }

    /// Never lowers the stored count.
    pub(crate) fn update_attempt_count(
        &mut self,
        id: TaskId,
        attempt_count: u32,
    ) -> Option<PendingTaskRecord> {
        let record = self.records.get_mut(&id)?;
        record.task.attempt_count = record.task.attempt_count.max(attempt_count);
        Some(record.clone())
    }

    /// Pending records, oldest first (ties broken by id).
    pub(crate) fn pending(&self) -> Vec<PendingTaskRecord> {
        let mut pending: Vec<PendingTaskRecord> = self
            .records
            .values()
            .filter(|r| r.is_pending())
            .cloned()
            .collect();
        pending.sort_by_key(|r| (r.task.created_at, r.task.id));
        pending
    }

    /// Ids whose record is `ready`, sorted.
    pub(crate) fn completed_ids(&self) -> Vec<TaskId> {
        let mut ids: Vec<TaskId> = self
            .records
            .values()
            .filter(|r| r.task.status == TaskStatus::Ready)
            .map(|r| r.task.id)
            .collect();
        ids.sort();
        ids
    }

    pub(crate) fn all(&self) -> Vec<PendingTaskRecord> {
        let mut all: Vec<PendingTaskRecord> = self.records.values().cloned().collect();
        all.sort_by_key(|r| (r.task.created_at, r.task.id));
        all
    }

    pub(crate) fn get(&self, id: TaskId) -> Option<&PendingTaskRecord> {
        self.records.get(&id)
    }
}
