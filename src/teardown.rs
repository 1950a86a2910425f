use std::{
    fmt::Debug,
    sync::{Arc, Mutex},
};

use tracing::debug;

use crate::lock;

type Listener = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct TeardownState {
    fired: bool,
    next_id: u64,
    listeners: Vec<(u64, Listener)>,
}

/// One-shot termination signal shared by reference.
///
/// Every stream derived from a [`Store`](crate::Store) registers a listener here
/// when it is created. Firing runs each listener exactly once; firing again is a no-op
/// and a signal can never be re-armed.
///
/// # Examples
/// ```
/// use rxstore::Teardown;
///
/// let teardown = Teardown::new();
/// let shared = teardown.clone();
///
/// shared.fire();
/// shared.fire();
///
/// assert!(teardown.is_fired());
/// ```
#[derive(Clone, Default)]
pub struct Teardown {
    inner: Arc<Mutex<TeardownState>>,
}

impl Teardown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires the signal, running every registered listener in registration order.
    pub fn fire(&self) {
        let listeners = {
            let mut state = lock(&self.inner);
            if state.fired {
                return;
            }
            state.fired = true;
            std::mem::take(&mut state.listeners)
        };

        debug!(listeners = listeners.len(), "teardown fired");
        for (_, listener) in listeners {
            listener();
        }
    }

    pub fn is_fired(&self) -> bool {
        lock(&self.inner).fired
    }

    /// Registers `f` to run when the signal fires.
    ///
    /// If the signal already fired, `f` runs immediately and `None` is returned.
    pub(crate) fn on_fire(&self, f: impl FnOnce() + Send + 'static) -> Option<u64> {
        let mut state = lock(&self.inner);
        if state.fired {
            drop(state);
            f();
            return None;
        }

        let id = state.next_id;
        state.next_id += 1;
        state.listeners.push((id, Box::new(f)));
        Some(id)
    }

    pub(crate) fn remove_listener(&self, id: u64) {
        lock(&self.inner).listeners.retain(|(other, _)| *other != id);
    }

    #[cfg(test)]
    pub(crate) fn listener_count(&self) -> usize {
        lock(&self.inner).listeners.len()
    }
}

impl Debug for Teardown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Teardown")
            .field("fired", &self.is_fired())
            .finish()
    }
}
