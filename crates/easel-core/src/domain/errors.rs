//! Errors - エラー型と分類
//!
//! 関心ごとに thiserror の enum を分けています。
//! - 定常状態（依存待ち・タスクなし）はエラーにしない
//! - 例外的な状況（永続化の失敗など）だけを Result で返す

use std::path::PathBuf;

use super::ids::TaskId;
use super::task::TaskStatus;

/// Illegal status change on a task.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("illegal status transition for {task_id}: {from} -> {to}")]
pub struct TransitionError {
    pub task_id: TaskId,
    pub from: TaskStatus,
    pub to: TaskStatus,
}

/// Persistence boundary errors.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("repository unavailable: {0}")]
    Unavailable(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt task state: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Render backend errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("render request rejected: {0}")]
    Rejected(String),

    #[error("render backend unreachable: {0}")]
    Unreachable(String),
}

/// Unexpected processor failure ("throw").
///
/// Expected failures are reported as a returned task with status `failed`.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("processor panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("restore failed: {0}")]
    Restore(#[source] RepositoryError),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
