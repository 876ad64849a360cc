//! IllustrationProcessor - RenderBackend と TaskRepository をつなぐ TaskProcessor
//!
//! # フロー
//! 1. status を generating にして attempt_count を +1（repository にも記録）
//! 2. RenderBackend::generate() を呼ぶ
//! 3. 結果に応じて ready / failed を記録して返す
//!
//! Backend の失敗は「想定内の失敗」なので Err ではなく status = failed で返します。
//! Err になるのは repository が壊れているときだけです。

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::domain::{IllustrationTask, ProcessError, TaskStatus};
use crate::ports::{RenderBackend, TaskProcessor, TaskRepository};

pub struct IllustrationProcessor<R, B> {
    repository: Arc<R>,
    backend: Arc<B>,
}

impl<R, B> IllustrationProcessor<R, B>
where
    R: TaskRepository,
    B: RenderBackend,
{
    pub fn new(repository: Arc<R>, backend: Arc<B>) -> Self {
        Self {
            repository,
            backend,
        }
    }

    async fn record_status(&self, task: &IllustrationTask) -> Result<(), ProcessError> {
        if self
            .repository
            .update_task_status(task.id, task.status)
            .await?
            .is_none()
        {
            debug!(task_id = %task.id, status = %task.status, "no persisted record to update");
        }
        Ok(())
    }
}

#[async_trait]
impl<R, B> TaskProcessor for IllustrationProcessor<R, B>
where
    R: TaskRepository,
    B: RenderBackend,
{
    async fn process(&self, mut task: IllustrationTask) -> Result<IllustrationTask, ProcessError> {
        task.advance_to(TaskStatus::Generating)?;
        task.attempt_count += 1;
        self.record_status(&task).await?;
        self.repository
            .update_attempt_count(task.id, task.attempt_count)
            .await?;

        match self.backend.generate(&task).await {
            Ok(rendered) => {
                task.advance_to(TaskStatus::Ready)?;
                info!(task_id = %task.id, path = %rendered.path, "illustration rendered");
            }
            Err(e) => {
                task.advance_to(TaskStatus::Failed)?;
                warn!(task_id = %task.id, attempts = task.attempt_count, error = %e, "illustration failed");
            }
        }

        self.record_status(&task).await?;
        Ok(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PageId, RenderError, StoryId, TaskId, TaskPriority, TaskType};
    use crate::impls::InMemoryTaskRepository;
    use crate::ports::RenderedIllustration;
    use chrono::Utc;

    struct FixedBackend {
        fail: bool,
    }

    #[async_trait]
    impl RenderBackend for FixedBackend {
        async fn generate(
            &self,
            task: &IllustrationTask,
        ) -> Result<RenderedIllustration, RenderError> {
            if self.fail {
                return Err(RenderError::Rejected("content policy".into()));
            }
            Ok(RenderedIllustration {
                path: format!("illustrations/{}.png", task.page_id),
            })
        }
    }

    fn task() -> IllustrationTask {
        IllustrationTask::new(
            TaskId::from_u128(1),
            StoryId::from_u128(1),
            PageId::from_u128(1),
            TaskPriority::High,
            TaskType::PageIllustration,
            Utc::now(),
        )
    }

    async fn run(fail: bool) -> (IllustrationTask, Arc<InMemoryTaskRepository>) {
        let repo = Arc::new(InMemoryTaskRepository::new());
        repo.save_task(&task(), 1, 1, "a quiet harbour", None)
            .await
            .unwrap();
        let processor =
            IllustrationProcessor::new(Arc::clone(&repo), Arc::new(FixedBackend { fail }));
        let out = processor.process(task()).await.unwrap();
        (out, repo)
    }

    #[tokio::test]
    async fn success_is_recorded_as_ready() {
        let (out, repo) = run(false).await;

        assert_eq!(out.status, TaskStatus::Ready);
        assert_eq!(out.attempt_count, 1);
        let record = repo.get(out.id).unwrap();
        assert_eq!(record.task.status, TaskStatus::Ready);
        assert_eq!(record.task.attempt_count, 1);
    }

    #[tokio::test]
    async fn backend_failure_is_an_outcome_not_an_error() {
        let (out, repo) = run(true).await;

        assert_eq!(out.status, TaskStatus::Failed);
        assert_eq!(repo.get(out.id).unwrap().task.status, TaskStatus::Failed);
    }

    #[tokio::test]
    async fn task_already_generating_is_rejected() {
        let repo = Arc::new(InMemoryTaskRepository::new());
        let processor =
            IllustrationProcessor::new(repo, Arc::new(FixedBackend { fail: false }));

        let err = processor
            .process(task().with_status(TaskStatus::Generating))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Transition(_)));
    }
}
