//! easel-core
//!
//! Illustration task scheduler: a dependency-respecting, priority-ordered,
//! resumable work queue whose processing loop follows network connectivity.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, task, errors）
//! - **ports**: 外部コラボレーターの trait（TaskRepository, TaskProcessor, NetworkMonitor, ...）
//! - **queue**: TaskManager と依存グラフ
//! - **app**: Coordinator と IllustrationProcessor
//! - **impls**: ports の実装（InMemory / JSON ファイル / 手動 NetworkMonitor）
//! - **config**: TOML 設定
//! - **observability**: 診断用のカウント

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod queue;

pub use app::{Coordinator, CoordinatorBuilder, CoordinatorStatus};
pub use domain::{IllustrationTask, TaskId, TaskPriority, TaskStatus, TaskType};
pub use queue::TaskManager;
