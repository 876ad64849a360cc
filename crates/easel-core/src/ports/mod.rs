//! Ports - 外部コラボレーターの抽象化レイヤー
//!
//! Scheduler が外部に求めるものだけを trait で定義します。
//! - 永続化（TaskRepository）
//! - 生成処理（TaskProcessor, RenderBackend）
//! - 接続状態（NetworkMonitor）
//! - 時刻と ID（Clock, IdGenerator）

pub mod clock;
pub mod id_generator;
pub mod network_monitor;
pub mod processor;
pub mod task_repository;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::network_monitor::{ConnectivityHandler, NetworkMonitor};
pub use self::processor::{RenderBackend, RenderedIllustration, TaskProcessor};
pub use self::task_repository::{PendingTaskRecord, TaskRepository};
