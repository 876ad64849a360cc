//! Processor / RenderBackend port - 実際の生成処理の抽象化
//!
//! Scheduler はどう描くかを知りません。dequeue したタスクを
//! `TaskProcessor` に渡し、結果のタスク（status = ready / failed）を受け取るだけです。

use std::future::Future;

use async_trait::async_trait;

use crate::domain::{IllustrationTask, ProcessError, RenderError};

/// Processes one dequeued task.
///
/// Expected failures come back as `Ok(task)` with status `Failed`.
/// `Err` (or a panic) means something unexpected happened; the scheduler
/// treats both the same way: the task is dropped and its id is not
/// marked as a completed dependency.
#[async_trait]
pub trait TaskProcessor: Send + Sync {
    async fn process(&self, task: IllustrationTask) -> Result<IllustrationTask, ProcessError>;
}

/// Any async closure `Fn(IllustrationTask) -> Future<Output = Result<..>>` is a processor.
///
/// ```ignore
/// manager.start_processing(Arc::new(|mut task: IllustrationTask| async move {
///     task.status = TaskStatus::Ready;
///     Ok(task)
/// }));
/// ```
#[async_trait]
impl<F, Fut> TaskProcessor for F
where
    F: Fn(IllustrationTask) -> Fut + Send + Sync,
    Fut: Future<Output = Result<IllustrationTask, ProcessError>> + Send + 'static,
{
    async fn process(&self, task: IllustrationTask) -> Result<IllustrationTask, ProcessError> {
        (self)(task).await
    }
}

/// Output of a successful render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedIllustration {
    /// Where the backend stored the image.
    pub path: String,
}

/// Image-generation backend (network call).
///
/// Prompt text is already baked into whatever the backend looks up for the task.
#[async_trait]
pub trait RenderBackend: Send + Sync {
    async fn generate(&self, task: &IllustrationTask) -> Result<RenderedIllustration, RenderError>;
}
