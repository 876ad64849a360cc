//! In-memory task manager: pending set, completed dependencies, processing loop.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{Notify, watch};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};

use super::DependencyGraph;
use crate::config::SchedulerConfig;
use crate::domain::{IllustrationTask, ProcessError, TaskId, TaskStatus};
use crate::observability::PendingCounts;
use crate::ports::TaskProcessor;

/// Pending set + completed-dependency set.
///
/// Design:
/// - `pending` keeps insertion order; selection scans it, so ties on
///   priority go to the earliest-added task.
/// - `graph` mirrors the dependency edges of resident tasks only.
struct ManagerState {
    pending: Vec<IllustrationTask>,
    completed: HashSet<TaskId>,
    graph: DependencyGraph,
}

impl ManagerState {
    fn new() -> Self {
        Self {
            pending: Vec::new(),
            completed: HashSet::new(),
            graph: DependencyGraph::new(),
        }
    }

    fn is_eligible(&self, task: &IllustrationTask) -> bool {
        task.status.is_selectable() && task.dependencies_satisfied(&self.completed)
    }

    /// Highest priority eligible task, earliest-added among equals.
    fn next_eligible_index(&self) -> Option<usize> {
        let mut best: Option<(usize, &IllustrationTask)> = None;
        for (index, task) in self.pending.iter().enumerate() {
            if !self.is_eligible(task) {
                continue;
            }
            // strict `>` keeps the earlier entry on ties
            if best.is_none_or(|(_, current)| task.priority > current.priority) {
                best = Some((index, task));
            }
        }
        best.map(|(index, _)| index)
    }
}

struct Worker {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

struct Inner {
    state: Mutex<ManagerState>,
    /// Wakes an idle loop when something may have become eligible.
    notify: Notify,
    processing: watch::Sender<bool>,
    worker: Mutex<Option<Worker>>,
    idle_backoff: Duration,
}

/// Dependency- and priority-aware task scheduler.
///
/// Cloning yields another handle to the same manager.
/// At most one task is processed at a time.
#[derive(Clone)]
pub struct TaskManager {
    inner: Arc<Inner>,
}

impl TaskManager {
    pub fn new() -> Self {
        Self::with_config(&SchedulerConfig::default())
    }

    pub fn with_config(config: &SchedulerConfig) -> Self {
        let (processing, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(ManagerState::new()),
                notify: Notify::new(),
                processing,
                worker: Mutex::new(None),
                idle_backoff: config.idle_backoff(),
            }),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, ManagerState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_worker(&self) -> MutexGuard<'_, Option<Worker>> {
        self.inner
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a task into the pending set.
    ///
    /// Malformed dependencies are corrected silently:
    /// - a dependency on the task's own id is stripped
    /// - a dependency that would close a cycle through pending tasks is pruned
    ///   from the incoming task (the already-resident side keeps its edge)
    ///
    /// Re-adding an id that is already pending replaces the earlier entry.
    /// The replacement is ordered as newly added and keeps the higher attempt count.
    pub fn add_task(&self, mut task: IllustrationTask) {
        let task_id = task.id;
        {
            let mut state = self.lock_state();

            if let Some(pos) = state.pending.iter().position(|t| t.id == task_id) {
                let previous = state.pending.remove(pos);
                state.graph.remove_task(task_id);
                task.attempt_count = task.attempt_count.max(previous.attempt_count);
                debug!(%task_id, "replacing pending task with the same id");
            }

            if task.dependencies.remove(&task_id) {
                warn!(%task_id, "stripped self-dependency");
            }

            let cyclic: Vec<TaskId> = task
                .dependencies
                .iter()
                .copied()
                .filter(|dep| state.graph.reaches(*dep, task_id))
                .collect();
            for dep in cyclic {
                task.dependencies.remove(&dep);
                warn!(%task_id, dependency = %dep, "pruned dependency that would form a cycle");
            }

            for dep in &task.dependencies {
                state.graph.add_dependency(task_id, *dep);
            }
            debug!(
                %task_id,
                priority = ?task.priority,
                dependencies = task.dependencies.len(),
                "task added"
            );
            state.pending.push(task);
        }
        self.inner.notify.notify_one();
    }

    /// Remove and return the next eligible task, or `None` when nothing is eligible.
    ///
    /// Eligible: status `pending`/`scheduled` and every dependency completed.
    pub fn get_next_task(&self) -> Option<IllustrationTask> {
        let mut state = self.lock_state();
        let index = state.next_eligible_index()?;
        let task = state.pending.remove(index);
        state.graph.remove_task(task.id);
        Some(task)
    }

    /// Mark `id` as satisfied. Eligibility is re-evaluated on the next selection.
    pub fn add_completed_dependency(&self, id: TaskId) {
        let waiting = {
            let mut state = self.lock_state();
            state.completed.insert(id);
            state.graph.get_waiting_tasks(id).len()
        };
        debug!(dependency = %id, waiting, "dependency completed");
        self.inner.notify.notify_one();
    }

    /// Pending tasks that declare a dependency on `id`, sorted.
    pub fn waiting_on(&self, id: TaskId) -> Vec<TaskId> {
        let mut waiting = self.lock_state().graph.get_waiting_tasks(id);
        waiting.sort();
        waiting
    }

    /// Revoke `id`. Tasks already handed out are unaffected.
    pub fn remove_completed_dependency(&self, id: TaskId) {
        self.lock_state().completed.remove(&id);
    }

    pub fn is_completed_dependency(&self, id: TaskId) -> bool {
        self.lock_state().completed.contains(&id)
    }

    /// Snapshot of the pending set in insertion order.
    pub fn pending_tasks(&self) -> Vec<IllustrationTask> {
        self.lock_state().pending.clone()
    }

    pub fn pending_count(&self) -> usize {
        self.lock_state().pending.len()
    }

    pub fn has_pending(&self) -> bool {
        !self.lock_state().pending.is_empty()
    }

    pub fn pending_counts(&self) -> PendingCounts {
        let state = self.lock_state();
        let eligible = state
            .pending
            .iter()
            .filter(|task| state.is_eligible(task))
            .count();
        let blocked = state
            .pending
            .iter()
            .filter(|task| !task.dependencies_satisfied(&state.completed))
            .count();
        PendingCounts {
            pending: state.pending.len(),
            eligible,
            blocked,
            completed_dependencies: state.completed.len(),
        }
    }

    /// A dependency cycle among pending tasks, if one exists.
    pub fn find_cycle(&self) -> Option<Vec<TaskId>> {
        self.lock_state().graph.detect_cycle()
    }

    pub fn is_processing(&self) -> bool {
        *self.inner.processing.borrow()
    }

    pub fn subscribe_processing(&self) -> watch::Receiver<bool> {
        self.inner.processing.subscribe()
    }

    /// Spawn the processing loop.
    ///
    /// Returns `false` if a loop is already running.
    pub fn start_processing(&self, processor: Arc<dyn TaskProcessor>) -> bool {
        let mut worker = self.lock_worker();
        let started = self.inner.processing.send_if_modified(|running| {
            if *running {
                false
            } else {
                *running = true;
                true
            }
        });
        if !started {
            debug!("processing loop already running");
            return false;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let manager = self.clone();
        let join = tokio::spawn(async move {
            manager.run_loop(processor, shutdown_rx).await;
        });
        *worker = Some(Worker { shutdown_tx, join });
        true
    }

    /// Ask the loop to exit after its current task and wait until it has.
    ///
    /// An in-flight processor invocation is not interrupted.
    pub async fn stop_processing(&self) {
        let Some(worker) = self.lock_worker().take() else {
            return;
        };
        // ignore send error: the loop may already be gone
        let _ = worker.shutdown_tx.send(true);
        if let Err(e) = worker.join.await {
            error!(error = %e, "processing loop ended abnormally");
            self.inner.processing.send_replace(false);
        }
    }

    async fn run_loop(
        self,
        processor: Arc<dyn TaskProcessor>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        info!("processing loop started");
        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let Some(task) = self.get_next_task() else {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = self.inner.notify.notified() => {}
                    _ = tokio::time::sleep(self.inner.idle_backoff) => {}
                }
                continue;
            };

            self.process_one(&processor, task).await;
        }
        self.inner.processing.send_replace(false);
        info!("processing loop stopped");
    }

    async fn process_one(&self, processor: &Arc<dyn TaskProcessor>, task: IllustrationTask) {
        let task_id = task.id;
        debug!(%task_id, priority = ?task.priority, attempts = task.attempt_count, "processing task");

        // own tokio task so a panicking processor cannot take the loop down
        let processor = Arc::clone(processor);
        let joined = tokio::spawn(async move { processor.process(task).await }).await;

        match flatten_join(joined) {
            Ok(updated) if updated.status == TaskStatus::Ready => {
                self.add_completed_dependency(task_id);
                info!(%task_id, attempts = updated.attempt_count, "task ready");
            }
            Ok(updated) => {
                warn!(%task_id, status = %updated.status, attempts = updated.attempt_count, "task not completed, dropped");
            }
            Err(e) => {
                error!(%task_id, error = %e, "processor failed, task dropped");
            }
        }
    }
}

/// A processor task that panicked (or was cancelled) becomes `ProcessError::Panicked`.
fn flatten_join(
    joined: Result<Result<IllustrationTask, ProcessError>, JoinError>,
) -> Result<IllustrationTask, ProcessError> {
    match joined {
        Ok(outcome) => outcome,
        Err(e) => Err(ProcessError::Panicked(e.to_string())),
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}
