//! Queue module: dependency graph and the in-memory task manager.

mod dependency;
mod manager;

pub use dependency::DependencyGraph;
pub use manager::TaskManager;
