//! App - アプリケーション層
//!
//! ports と queue を組み合わせてアプリケーションロジックを実装します。
//!
//! # 主要コンポーネント
//! - **Coordinator**: 復元と接続状態に応じた処理ループの開始・停止
//! - **CoordinatorBuilder**: Coordinator の構築とワイヤリング
//! - **IllustrationProcessor**: RenderBackend + TaskRepository による TaskProcessor
//! - **Status**: 外から見える状態

pub mod builder;
pub mod coordinator;
pub mod processor;
pub mod status;

pub use self::builder::{BuildError, CoordinatorBuilder};
pub use self::coordinator::Coordinator;
pub use self::processor::IllustrationProcessor;
pub use self::status::{CoordinatorStatus, SchedulerStatus};
