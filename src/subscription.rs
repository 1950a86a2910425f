use std::{
    fmt::Debug,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use crate::lock;

type Unsubscribe = Box<dyn FnOnce() + Send>;

/// Handle returned by every `subscribe` call.
///
/// Dropping the handle does **not** unsubscribe; the observer stays registered
/// until [`Subscription::unsubscribe`] is called or the source terminates.
///
/// # Examples
/// ```
/// use rxstore::Broadcaster;
/// use std::sync::{Arc, Mutex};
///
/// let b = Broadcaster::new(1);
/// let seen: Arc<Mutex<Vec<i32>>> = Default::default();
///
/// let sub = b.subscribe({
///     let seen = seen.clone();
///     move |val| seen.lock().unwrap().push(*val)
/// });
///
/// b.publish(2);
/// sub.unsubscribe();
/// b.publish(3);
///
/// assert!(sub.is_closed());
/// assert_eq!(vec![1, 2], seen.lock().unwrap().clone());
/// ```
pub struct Subscription {
    closed: Arc<AtomicBool>,
    unsubscribe: Mutex<Option<Unsubscribe>>,
}

impl Subscription {
    pub(crate) fn new(closed: Arc<AtomicBool>, unsubscribe: impl FnOnce() + Send + 'static) -> Self {
        Self {
            closed,
            unsubscribe: Mutex::new(Some(Box::new(unsubscribe))),
        }
    }

    /// A subscription that was never attached to anything.
    pub(crate) fn closed() -> Self {
        Self {
            closed: Arc::new(AtomicBool::new(true)),
            unsubscribe: Mutex::new(None),
        }
    }

    /// Removes the observer from its source. Calling it more than once is a no-op.
    pub fn unsubscribe(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let unsubscribe = lock(&self.unsubscribe).take();
        if let Some(unsubscribe) = unsubscribe {
            unsubscribe();
        }
    }

    /// `true` once the observer will receive no further values, either because
    /// it unsubscribed or because the stream it was attached to terminated.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("closed", &self.is_closed())
            .finish()
    }
}
