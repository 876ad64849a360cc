//! ManualNetworkMonitor - 接続状態をコードから切り替える NetworkMonitor
//!
//! テストや CLI のシナリオ実行で使います。

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::ports::{ConnectivityHandler, NetworkMonitor};

struct MonitorState {
    connected: bool,
    handler: Option<ConnectivityHandler>,
}

pub struct ManualNetworkMonitor {
    state: Mutex<MonitorState>,
}

impl ManualNetworkMonitor {
    pub fn new(connected: bool) -> Self {
        Self {
            state: Mutex::new(MonitorState {
                connected,
                handler: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    /// Change connectivity; the handler fires only on an actual change.
    pub fn set_connected(&self, connected: bool) {
        let handler = {
            let mut state = self.lock();
            if state.connected == connected {
                return;
            }
            state.connected = connected;
            state.handler.clone()
        };
        // call outside the lock: the handler may query us
        if let Some(handler) = handler {
            handler(connected);
        }
    }
}

impl NetworkMonitor for ManualNetworkMonitor {
    fn start_monitoring(&self, handler: ConnectivityHandler) {
        let connected = {
            let mut state = self.lock();
            state.handler = Some(handler.clone());
            state.connected
        };
        handler(connected);
    }

    fn stop_monitoring(&self) {
        self.lock().handler = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn recording_handler() -> (ConnectivityHandler, Arc<Mutex<Vec<bool>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handler: ConnectivityHandler = Arc::new(move |connected| {
            sink.lock().unwrap().push(connected);
        });
        (handler, seen)
    }

    #[test]
    fn reports_current_state_immediately_then_changes() {
        let monitor = ManualNetworkMonitor::new(true);
        let (handler, seen) = recording_handler();

        monitor.start_monitoring(handler);
        monitor.set_connected(true); // no change
        monitor.set_connected(false);
        monitor.set_connected(true);

        assert_eq!(*seen.lock().unwrap(), vec![true, false, true]);
    }

    #[test]
    fn stop_monitoring_silences_handler() {
        let monitor = ManualNetworkMonitor::new(false);
        let (handler, seen) = recording_handler();

        monitor.start_monitoring(handler);
        monitor.stop_monitoring();
        monitor.set_connected(true);

        assert_eq!(*seen.lock().unwrap(), vec![false]);
        assert!(monitor.is_connected());
    }
}
