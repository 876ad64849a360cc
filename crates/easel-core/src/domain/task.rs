//! Illustration task: the unit of work handed to the scheduler.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::TransitionError;
use super::ids::{PageId, StoryId, TaskId};

/// Scheduling priority.
///
/// Declaration order defines `Ord`: `Critical` is the greatest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Critical,
}

/// Task status.
///
/// State transitions:
/// - Pending -> Scheduled -> Generating -> Ready
/// - Pending -> Scheduled -> Generating -> Failed
/// - Failed -> Pending (external retry only; the manager never does this)
///
/// Skipping forward (e.g. Pending -> Generating) is allowed, moving backward is not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Scheduled,
    Generating,
    Ready,
    Failed,
}

impl TaskStatus {
    /// Can the manager hand this task out?
    pub fn is_selectable(self) -> bool {
        matches!(self, TaskStatus::Pending | TaskStatus::Scheduled)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Ready | TaskStatus::Failed)
    }

    fn rank(self) -> u8 {
        match self {
            TaskStatus::Pending => 0,
            TaskStatus::Scheduled => 1,
            TaskStatus::Generating => 2,
            TaskStatus::Ready | TaskStatus::Failed => 3,
        }
    }

    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        match (self, next) {
            (TaskStatus::Failed, TaskStatus::Pending) => true,
            _ if self.is_terminal() => false,
            _ => next.rank() > self.rank(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Scheduled => "scheduled",
            TaskStatus::Generating => "generating",
            TaskStatus::Ready => "ready",
            TaskStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of illustration the task produces. Metadata only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    PageIllustration,
    /// Character/style reference image shared by every page of a story.
    GlobalReference,
}

/// One unit of illustration work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IllustrationTask {
    pub id: TaskId,
    pub page_id: PageId,
    pub story_id: StoryId,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub attempt_count: u32,
    pub task_type: TaskType,
    /// Ordinal hint for display. Not used in scheduling.
    pub page_index: Option<u32>,
    /// Tasks that must complete before this one is eligible.
    #[serde(default)]
    pub dependencies: BTreeSet<TaskId>,
}

impl IllustrationTask {
    pub fn new(
        id: TaskId,
        story_id: StoryId,
        page_id: PageId,
        priority: TaskPriority,
        task_type: TaskType,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            page_id,
            story_id,
            priority,
            status: TaskStatus::Pending,
            created_at,
            attempt_count: 0,
            task_type,
            page_index: None,
            dependencies: BTreeSet::new(),
        }
    }

    pub fn with_dependencies(mut self, dependencies: impl IntoIterator<Item = TaskId>) -> Self {
        self.dependencies.extend(dependencies);
        self
    }

    pub fn with_page_index(mut self, page_index: u32) -> Self {
        self.page_index = Some(page_index);
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    /// Move the status forward, rejecting illegal transitions.
    pub fn advance_to(&mut self, next: TaskStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                task_id: self.id,
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Re-enter `Pending` after a failure so the caller can re-submit.
    ///
    /// `attempt_count` is kept as is.
    pub fn prepare_retry(&mut self) -> Result<(), TransitionError> {
        if self.status != TaskStatus::Failed {
            return Err(TransitionError {
                task_id: self.id,
                from: self.status,
                to: TaskStatus::Pending,
            });
        }
        self.status = TaskStatus::Pending;
        Ok(())
    }

    /// Are all dependencies in `satisfied`?
    pub fn dependencies_satisfied(&self, satisfied: &HashSet<TaskId>) -> bool {
        self.dependencies.iter().all(|dep| satisfied.contains(dep))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn task() -> IllustrationTask {
        IllustrationTask::new(
            TaskId::from_u128(1),
            StoryId::from_u128(10),
            PageId::from_u128(100),
            TaskPriority::Medium,
            TaskType::PageIllustration,
            Utc::now(),
        )
    }

    #[test]
    fn priority_order_puts_critical_first() {
        let mut priorities = vec![
            TaskPriority::Medium,
            TaskPriority::Critical,
            TaskPriority::Low,
            TaskPriority::High,
        ];
        priorities.sort_by(|a, b| b.cmp(a));
        assert_eq!(
            priorities,
            vec![
                TaskPriority::Critical,
                TaskPriority::High,
                TaskPriority::Medium,
                TaskPriority::Low,
            ]
        );
    }

    #[rstest]
    #[case::pending_to_scheduled(TaskStatus::Pending, TaskStatus::Scheduled, true)]
    #[case::scheduled_to_generating(TaskStatus::Scheduled, TaskStatus::Generating, true)]
    #[case::generating_to_ready(TaskStatus::Generating, TaskStatus::Ready, true)]
    #[case::generating_to_failed(TaskStatus::Generating, TaskStatus::Failed, true)]
    #[case::failed_to_pending(TaskStatus::Failed, TaskStatus::Pending, true)]
    #[case::ready_to_failed(TaskStatus::Ready, TaskStatus::Failed, false)]
    #[case::ready_to_pending(TaskStatus::Ready, TaskStatus::Pending, false)]
    #[case::generating_to_pending(TaskStatus::Generating, TaskStatus::Pending, false)]
    #[case::same_state(TaskStatus::Scheduled, TaskStatus::Scheduled, false)]
    fn status_transitions(#[case] from: TaskStatus, #[case] to: TaskStatus, #[case] ok: bool) {
        assert_eq!(from.can_transition_to(to), ok);
    }

    #[test]
    fn advance_to_rejects_backward_move() {
        let mut t = task().with_status(TaskStatus::Generating);
        let err = t.advance_to(TaskStatus::Scheduled).unwrap_err();
        assert_eq!(err.from, TaskStatus::Generating);
        assert_eq!(t.status, TaskStatus::Generating);
    }

    #[test]
    fn prepare_retry_only_from_failed() {
        let mut t = task();
        assert!(t.prepare_retry().is_err());

        t.advance_to(TaskStatus::Generating).unwrap();
        t.attempt_count = 1;
        t.advance_to(TaskStatus::Failed).unwrap();
        t.prepare_retry().unwrap();

        assert_eq!(t.status, TaskStatus::Pending);
        assert_eq!(t.attempt_count, 1);
    }

    #[test]
    fn empty_dependencies_are_always_satisfied() {
        let t = task();
        assert!(t.dependencies_satisfied(&Default::default()));
    }
}
