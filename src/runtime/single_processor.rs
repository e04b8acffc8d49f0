use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use super::sync::lock;

type Task = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct ProcessorState {
    pending: Option<Task>,
    processing: bool,
    worker_alive: bool,
}

struct Shared {
    name: String,
    state: Mutex<ProcessorState>,
    idle: Condvar,
}

/// Runs submitted tasks one at a time on a single background thread.
///
/// The queue holds at most one waiting task: submitting while a task is
/// already waiting replaces it. A running task can poll
/// [`has_waiting_tasks`](Self::has_waiting_tasks) to give up early when it has
/// been superseded.
#[derive(Clone)]
pub struct SingleProcessor {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for SingleProcessor {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SingleProcessor")
            .field("name", &self.shared.name)
            .field("processing", &self.is_processing())
            .finish()
    }
}

impl SingleProcessor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(Shared {
                name: name.into(),
                state: Mutex::new(ProcessorState::default()),
                idle: Condvar::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Queues `task`, dropping any task still waiting. Returns `false` when
    /// the worker thread could not be started.
    pub fn submit(&self, task: impl FnOnce() + Send + 'static) -> bool {
        let mut state = lock(&self.shared.state);
        if state.pending.replace(Box::new(task)).is_some() {
            log::debug!("{}: waiting task superseded", self.shared.name);
        }
        if state.worker_alive {
            return true;
        }
        state.worker_alive = true;
        drop(state);

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(self.shared.name.clone())
            .spawn(move || run_worker(&shared));
        match spawned {
            Ok(_) => true,
            Err(error) => {
                log::error!("{}: cannot start worker: {error}", self.shared.name);
                let mut state = lock(&self.shared.state);
                state.pending = None;
                state.worker_alive = false;
                self.shared.idle.notify_all();
                false
            }
        }
    }

    pub fn has_waiting_tasks(&self) -> bool {
        lock(&self.shared.state).pending.is_some()
    }

    /// True while a task runs or waits to run.
    pub fn is_processing(&self) -> bool {
        let state = lock(&self.shared.state);
        state.processing || state.pending.is_some()
    }

    /// Blocks until the worker has drained the queue.
    pub fn wait_all(&self) {
        let mut state = lock(&self.shared.state);
        while state.worker_alive {
            state = self
                .shared
                .idle
                .wait(state)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }
    }
}

fn run_worker(shared: &Shared) {
    loop {
        let task = {
            let mut state = lock(&shared.state);
            match state.pending.take() {
                Some(task) => {
                    state.processing = true;
                    task
                }
                None => {
                    state.processing = false;
                    state.worker_alive = false;
                    shared.idle.notify_all();
                    return;
                }
            }
        };
        if catch_unwind(AssertUnwindSafe(task)).is_err() {
            log::error!("{}: task panicked", shared.name);
        }
        lock(&shared.state).processing = false;
    }
}
