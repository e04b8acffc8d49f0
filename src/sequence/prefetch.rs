use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::thread;

use crate::runtime::sync::lock;

use super::Sequence;

struct PrefetchRequest {
    sequence_id: u64,
    sequence: Weak<Sequence>,
    t: usize,
    z: usize,
}

#[derive(Default)]
struct PrefetchState {
    requests: VecDeque<PrefetchRequest>,
    worker_alive: bool,
}

#[derive(Default)]
struct Shared {
    state: Mutex<PrefetchState>,
    idle: Condvar,
}

/// Background loader for planes likely to be requested next.
///
/// Requests are served in FIFO order by a single worker thread which exits
/// once the queue is drained. Only weak references to sequences are queued,
/// so prefetching never keeps a sequence alive.
#[derive(Default)]
pub struct Prefetcher {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Prefetcher {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.shared.state);
        formatter
            .debug_struct("Prefetcher")
            .field("queued", &state.requests.len())
            .field("worker_alive", &state.worker_alive)
            .finish()
    }
}

impl Prefetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a load of plane `(t, z)`; duplicate requests are ignored.
    pub fn prefetch(&self, sequence: &Arc<Sequence>, t: usize, z: usize) {
        let sequence_id = sequence.id();
        let mut state = lock(&self.shared.state);
        if state
            .requests
            .iter()
            .any(|request| request.sequence_id == sequence_id && request.t == t && request.z == z)
        {
            return;
        }
        log::debug!("prefetch sequence {sequence_id} plane (t={t}, z={z})");
        state.requests.push_back(PrefetchRequest {
            sequence_id,
            sequence: Arc::downgrade(sequence),
            t,
            z,
        });
        if state.worker_alive {
            return;
        }
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("sequence-prefetch".to_string())
            .spawn(move || run_worker(shared));
        match spawned {
            Ok(_) => state.worker_alive = true,
            Err(error) => {
                log::error!("cannot start prefetch worker: {error}");
                state.requests.clear();
            }
        }
    }

    /// Drops the queued requests of one sequence.
    pub fn cancel(&self, sequence_id: u64) {
        let mut state = lock(&self.shared.state);
        state
            .requests
            .retain(|request| request.sequence_id != sequence_id);
        if state.requests.is_empty() && !state.worker_alive {
            self.shared.idle.notify_all();
        }
    }

    pub fn pending(&self, sequence_id: u64) -> usize {
        lock(&self.shared.state)
            .requests
            .iter()
            .filter(|request| request.sequence_id == sequence_id)
            .count()
    }

    /// Blocks until the queue is empty and the worker has stopped.
    pub fn wait_idle(&self) {
        let mut state = lock(&self.shared.state);
        while state.worker_alive || !state.requests.is_empty() {
            state = self
                .shared
                .idle
                .wait(state)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }
    }
}

fn run_worker(shared: Arc<Shared>) {
    loop {
        let request = {
            let mut state = lock(&shared.state);
            match state.requests.pop_front() {
                Some(request) => request,
                None => {
                    state.worker_alive = false;
                    shared.idle.notify_all();
                    return;
                }
            }
        };
        let Some(sequence) = request.sequence.upgrade() else {
            continue;
        };
        if let Err(error) = sequence.prefetch_load(request.t, request.z) {
            log::debug!(
                "prefetch of sequence {} plane (t={}, z={}) failed: {error}",
                request.sequence_id,
                request.t,
                request.z
            );
        }
    }
}
