use std::sync::Mutex;

use crate::runtime::sync::lock;

/// Event that can absorb a later event of the same nature.
pub(crate) trait Collapsible {
    /// Merges `other` into `self`; false when the two stay distinct.
    fn collapse(&mut self, other: &Self) -> bool;
}

#[derive(Debug)]
struct CoalescerState<E> {
    depth: usize,
    pending: Vec<E>,
}

/// Nested begin/end update bracket that buffers and merges events while
/// open.
#[derive(Debug)]
pub(crate) struct UpdateCoalescer<E> {
    state: Mutex<CoalescerState<E>>,
}

impl<E: Collapsible> UpdateCoalescer<E> {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(CoalescerState {
                depth: 0,
                pending: Vec::new(),
            }),
        }
    }

    pub(crate) fn begin_update(&self) {
        lock(&self.state).depth += 1;
    }

    /// Closes one level. The buffered events are returned, in arrival order,
    /// only when the outermost level closes.
    pub(crate) fn end_update(&self) -> Vec<E> {
        let mut state = lock(&self.state);
        state.depth = state.depth.saturating_sub(1);
        if state.depth == 0 {
            std::mem::take(&mut state.pending)
        } else {
            Vec::new()
        }
    }

    pub(crate) fn is_updating(&self) -> bool {
        lock(&self.state).depth > 0
    }

    /// Buffers `event` while updating and returns it otherwise, so the caller
    /// dispatches it right away.
    pub(crate) fn changed(&self, event: E) -> Option<E> {
        let mut state = lock(&self.state);
        if state.depth == 0 {
            return Some(event);
        }
        if !state.pending.iter_mut().any(|pending| pending.collapse(&event)) {
            state.pending.push(event);
        }
        None
    }
}
