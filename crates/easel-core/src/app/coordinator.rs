//! Coordinator - 永続化とネットワーク状態を TaskManager につなぐ
//!
//! # 役割
//! 1. start(): repository から pending タスクを復元し、オンラインなら処理ループを開始
//! 2. 接続状態の変化に応じて処理ループを止める / 再開する（level-triggered）
//! 3. 手動の start / stop（UI の「今すぐ再試行」など）

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::status::{CoordinatorStatus, SchedulerStatus};
use crate::config::CoordinatorConfig;
use crate::domain::CoordinatorError;
use crate::ports::{ConnectivityHandler, NetworkMonitor, TaskProcessor, TaskRepository};
use crate::queue::TaskManager;

struct CoordinatorInner {
    manager: TaskManager,
    repository: Arc<dyn TaskRepository>,
    monitor: Arc<dyn NetworkMonitor>,
    processor: Arc<dyn TaskProcessor>,
    config: CoordinatorConfig,
    status: watch::Sender<CoordinatorStatus>,
    restored_task_count: AtomicUsize,
    /// Written synchronously by the monitor's handler.
    connected: Arc<AtomicBool>,
    /// Set while `start_monitoring` reports the current state.
    initial_report: Arc<AtomicBool>,
    /// Applies connectivity events in arrival order.
    events: Mutex<Option<JoinHandle<()>>>,
}

/// Owns the policy of *when* the processing loop runs.
///
/// Cheap to clone; all clones share one coordinator.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<CoordinatorInner>,
}

impl Coordinator {
    /// Prefer [`super::CoordinatorBuilder`].
    pub fn new(
        manager: TaskManager,
        repository: Arc<dyn TaskRepository>,
        monitor: Arc<dyn NetworkMonitor>,
        processor: Arc<dyn TaskProcessor>,
        config: CoordinatorConfig,
    ) -> Self {
        let (status, _) = watch::channel(CoordinatorStatus::Idle);
        Self {
            inner: Arc::new(CoordinatorInner {
                manager,
                repository,
                monitor,
                processor,
                config,
                status,
                restored_task_count: AtomicUsize::new(0),
                connected: Arc::new(AtomicBool::new(false)),
                initial_report: Arc::new(AtomicBool::new(false)),
                events: Mutex::new(None),
            }),
        }
    }

    fn lock_events(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.inner
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn manager(&self) -> &TaskManager {
        &self.inner.manager
    }

    pub fn status(&self) -> CoordinatorStatus {
        self.inner.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<CoordinatorStatus> {
        self.inner.status.subscribe()
    }

    pub fn restored_task_count(&self) -> usize {
        self.inner.restored_task_count.load(Ordering::SeqCst)
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> SchedulerStatus {
        SchedulerStatus {
            coordinator: self.status(),
            connected: self.is_connected(),
            processing: self.inner.manager.is_processing(),
            restored_task_count: self.restored_task_count(),
            counts: self.inner.manager.pending_counts(),
        }
    }

    /// Restore persisted tasks, then start processing if anything was
    /// restored and the network is up.
    ///
    /// On failure the status becomes `Error`; call `start()` again to retry.
    /// Once restored (or while restoring) further calls return the restored count
    /// without touching the repository.
    pub async fn start(&self) -> Result<usize, CoordinatorError> {
        let entered = self.inner.status.send_if_modified(|status| {
            if matches!(status, CoordinatorStatus::Idle | CoordinatorStatus::Error(_)) {
                *status = CoordinatorStatus::Restoring;
                true
            } else {
                false
            }
        });
        if !entered {
            debug!(status = ?self.status(), "already started, restore skipped");
            return Ok(self.restored_task_count());
        }

        self.ensure_monitoring();
        info!("restoring persisted illustration tasks");

        let count = match self
            .inner
            .repository
            .restore_tasks_to_manager(&self.inner.manager)
            .await
        {
            Ok(count) => count,
            Err(e) => {
                error!(error = %e, "restore failed");
                self.inner
                    .status
                    .send_replace(CoordinatorStatus::Error(e.to_string()));
                return Err(CoordinatorError::Restore(e));
            }
        };

        self.inner.restored_task_count.store(count, Ordering::SeqCst);
        self.inner.status.send_replace(CoordinatorStatus::Ready);
        info!(count, connected = self.is_connected(), "restore complete");

        if count > 0 && self.is_connected() && self.inner.config.auto_start {
            self.start_task_processing();
        }
        Ok(count)
    }

    /// Subscribe to the network monitor once.
    ///
    /// The state reported from inside `start_monitoring` only seeds `connected`;
    /// `start()` decides what to do with it. Later reports go through
    /// [`Self::handle_connectivity_change`].
    fn ensure_monitoring(&self) {
        let handler = {
            let mut events = self.lock_events();
            if events.is_some() {
                return;
            }

            let (tx, mut rx) = mpsc::unbounded_channel::<bool>();
            let weak: Weak<CoordinatorInner> = Arc::downgrade(&self.inner);
            *events = Some(tokio::spawn(async move {
                while let Some(connected) = rx.recv().await {
                    let Some(inner) = weak.upgrade() else {
                        break;
                    };
                    Coordinator { inner }
                        .handle_connectivity_change(connected)
                        .await;
                }
                debug!("connectivity event stream closed");
            }));

            let connected = Arc::clone(&self.inner.connected);
            let initial = Arc::clone(&self.inner.initial_report);
            let handler: ConnectivityHandler = Arc::new(move |is_connected| {
                connected.store(is_connected, Ordering::SeqCst);
                if initial.load(Ordering::SeqCst) {
                    return;
                }
                // ignore send error: coordinator dropped
                let _ = tx.send(is_connected);
            });
            handler
        };
        self.inner.initial_report.store(true, Ordering::SeqCst);
        self.inner.monitor.start_monitoring(handler);
        self.inner.initial_report.store(false, Ordering::SeqCst);
    }

    /// Level-triggered policy:
    /// - offline and running: stop
    /// - online, not running, and tasks pending: start
    /// - otherwise nothing
    pub async fn handle_connectivity_change(&self, connected: bool) {
        let manager = &self.inner.manager;
        if !connected {
            if manager.is_processing() {
                info!("connectivity lost, pausing illustration processing");
                manager.stop_processing().await;
            }
        } else if !manager.is_processing() && manager.has_pending() {
            info!(
                pending = manager.pending_count(),
                "connectivity restored, resuming illustration processing"
            );
            manager.start_processing(Arc::clone(&self.inner.processor));
        } else {
            debug!(connected, "connectivity change needs no action");
        }
    }

    /// Manual override: start regardless of connectivity.
    pub fn start_task_processing(&self) -> bool {
        self.inner
            .manager
            .start_processing(Arc::clone(&self.inner.processor))
    }

    /// Manual override: stop and wait for the loop to exit.
    pub async fn stop_task_processing(&self) {
        self.inner.manager.stop_processing().await;
    }

    /// Stop monitoring, end the event task, stop processing.
    pub async fn shutdown(&self) {
        self.inner.monitor.stop_monitoring();
        let events = self.lock_events().take();
        if let Some(events) = events {
            events.abort();
            // ignore: cancelled is the expected outcome
            let _ = events.await;
        }
        self.inner.manager.stop_processing().await;
        info!("coordinator shut down");
    }
}
