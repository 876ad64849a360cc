//! Impls - ports の実装（開発・テスト・CLI 用）

mod records;

pub mod inmem_repository;
pub mod json_repository;
pub mod manual_network;

pub use self::inmem_repository::InMemoryTaskRepository;
pub use self::json_repository::JsonFileTaskRepository;
pub use self::manual_network::ManualNetworkMonitor;
