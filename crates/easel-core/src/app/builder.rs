//! CoordinatorBuilder - Coordinator の構築とワイヤリング
//!
//! # Fail-fast 設計
//! - 必須のコラボレーター（repository / network monitor / processor）が
//!   揃っていなければ build() が BuildError を返す

use std::sync::Arc;

use super::coordinator::Coordinator;
use crate::config::CoordinatorConfig;
use crate::ports::{NetworkMonitor, TaskProcessor, TaskRepository};
use crate::queue::TaskManager;

/// # 使用例
/// ```ignore
/// let coordinator = CoordinatorBuilder::new(manager)
///     .repository(repo)
///     .network_monitor(monitor)
///     .processor(processor)
///     .build()?;
/// ```
pub struct CoordinatorBuilder {
    manager: TaskManager,
    repository: Option<Arc<dyn TaskRepository>>,
    monitor: Option<Arc<dyn NetworkMonitor>>,
    processor: Option<Arc<dyn TaskProcessor>>,
    config: CoordinatorConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("missing collaborator: {0}")]
    Missing(&'static str),
}

impl CoordinatorBuilder {
    pub fn new(manager: TaskManager) -> Self {
        Self {
            manager,
            repository: None,
            monitor: None,
            processor: None,
            config: CoordinatorConfig::default(),
        }
    }

    pub fn repository(mut self, repository: Arc<dyn TaskRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn network_monitor(mut self, monitor: Arc<dyn NetworkMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn processor(mut self, processor: Arc<dyn TaskProcessor>) -> Self {
        self.processor = Some(processor);
        self
    }

    pub fn config(mut self, config: CoordinatorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<Coordinator, BuildError> {
        let repository = self.repository.ok_or(BuildError::Missing("repository"))?;
        let monitor = self.monitor.ok_or(BuildError::Missing("network monitor"))?;
        let processor = self.processor.ok_or(BuildError::Missing("processor"))?;
        Ok(Coordinator::new(
            self.manager,
            repository,
            monitor,
            processor,
            self.config,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{IllustrationTask, ProcessError};
    use crate::impls::{InMemoryTaskRepository, ManualNetworkMonitor};

    #[test]
    fn build_fails_without_processor() {
        let result = CoordinatorBuilder::new(TaskManager::new())
            .repository(Arc::new(InMemoryTaskRepository::new()))
            .network_monitor(Arc::new(ManualNetworkMonitor::new(true)))
            .build();

        assert!(matches!(result, Err(BuildError::Missing("processor"))));
    }

    #[test]
    fn build_succeeds_with_all_collaborators() {
        let processor: Arc<dyn TaskProcessor> =
            Arc::new(|task: IllustrationTask| async move { Ok::<_, ProcessError>(task) });
        let coordinator = CoordinatorBuilder::new(TaskManager::new())
            .repository(Arc::new(InMemoryTaskRepository::new()))
            .network_monitor(Arc::new(ManualNetworkMonitor::new(true)))
            .processor(processor)
            .build()
            .unwrap();

        assert_eq!(coordinator.restored_task_count(), 0);
    }
}
