//! NetworkMonitor port - 接続状態の通知

use std::sync::Arc;

/// Called with `true` when connected, `false` when offline.
pub type ConnectivityHandler = Arc<dyn Fn(bool) + Send + Sync>;

/// Supplies connectivity-change notifications.
///
/// `start_monitoring` must invoke the handler once with the current state
/// before it returns, then again on every change.
pub trait NetworkMonitor: Send + Sync {
    fn start_monitoring(&self, handler: ConnectivityHandler);

    fn stop_monitoring(&self);
}
