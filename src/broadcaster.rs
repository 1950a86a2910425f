use std::{
    fmt::Debug,
    ops::Deref,
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Mutex, Weak},
};

use tracing::trace;

use crate::{
    lock,
    observer::{Callback, Observers},
    Stream, Subscription, Teardown,
};

struct BroadcasterInner<T> {
    current: Mutex<T>,
    initial: T,
    observers: Mutex<Observers<T>>,
}

/// Holder of a current value that pushes every published value to its observers.
///
/// New observers are called once with the current value as soon as they subscribe,
/// then with every later [`publish`](Broadcaster::publish). Cloning a `Broadcaster`
/// gives another handle to the same value and observer list.
///
/// # Examples
/// ```
/// use rxstore::Broadcaster;
///
/// let b = Broadcaster::new("🦀");
/// b.publish("🦞");
///
/// assert_eq!("🦞", b.value());
/// assert_eq!("🦀", *b.initial());
/// ```
#[derive(Clone)]
pub struct Broadcaster<T> {
    inner: Arc<BroadcasterInner<T>>,
}

impl<T: Clone> Broadcaster<T> {
    /// Constructs a new Broadcaster<T>. `initial` is kept aside as the target of
    /// [`reset`](Broadcaster::reset) and never changes afterwards.
    pub fn new(initial: T) -> Self {
        Self {
            inner: Arc::new(BroadcasterInner {
                current: Mutex::new(initial.clone()),
                initial,
                observers: Mutex::new(Observers::new()),
            }),
        }
    }

    /// Returns a clone of the current value
    pub fn value(&self) -> T {
        lock(&self.inner.current).clone()
    }
}

impl<T> Broadcaster<T> {
    /// Perform some action with a reference to the current value.
    ///
    /// The value is locked while `f` runs, so `f` must not publish to this broadcaster.
    pub fn with_value<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(lock(&self.inner.current).deref())
    }

    /// The value this broadcaster was constructed with.
    pub fn initial(&self) -> &T {
        &self.inner.initial
    }

    /// Number of observers currently registered, derived streams included.
    pub fn observer_count(&self) -> usize {
        lock(&self.inner.observers).len()
    }
}

impl<T: Clone + Send + Sync + 'static> Broadcaster<T> {
    /// Replaces the current value and notifies every observer, in the order they
    /// subscribed, before returning.
    ///
    /// There is no deduplication here: publishing a value equal to the current one
    /// still notifies. An observer that publishes from inside its callback does so
    /// recursively, so observers later in the list see the nested value before the
    /// outer one.
    ///
    /// # Examples
    /// ```
    /// use rxstore::Broadcaster;
    /// use std::sync::{Arc, Mutex};
    ///
    /// let b = Broadcaster::new(1);
    /// let seen: Arc<Mutex<Vec<i32>>> = Default::default();
    ///
    /// b.subscribe({
    ///     let seen = seen.clone();
    ///     move |val| seen.lock().unwrap().push(*val)
    /// });
    ///
    /// b.publish(1);
    /// b.publish(2);
    ///
    /// assert_eq!(vec![1, 1, 2], seen.lock().unwrap().clone());
    /// ```
    pub fn publish(&self, value: T) {
        *lock(&self.inner.current) = value.clone();
        let observers = lock(&self.inner.observers).snapshot();
        trace!("publish");
        observers.notify(&value);
    }

    /// Publishes the initial value again. Observers are notified even when the
    /// current value already equals it.
    pub fn reset(&self) {
        self.publish(self.inner.initial.clone());
    }

    /// Adds an observer and immediately calls it with the current value.
    ///
    /// If that first call panics the observer is removed again before the panic
    /// continues to the caller.
    ///
    /// # Examples
    /// ```
    /// use rxstore::Broadcaster;
    /// use std::sync::{Arc, Mutex};
    ///
    /// let b = Broadcaster::new(String::from("a"));
    /// b.publish(String::from("b"));
    ///
    /// let change_log: Arc<Mutex<Vec<String>>> = Default::default();
    /// b.subscribe({
    ///     let change_log = change_log.clone();
    ///     move |val| change_log.lock().unwrap().push(val.clone())
    /// });
    ///
    /// // late subscribers start from the current value
    /// assert_eq!(vec![String::from("b")], change_log.lock().unwrap().clone());
    /// ```
    pub fn subscribe(&self, f: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let callback: Callback<T> = Arc::new(f);
        let (id, closed) = lock(&self.inner.observers).add(callback.clone());
        trace!(id, "subscribe");

        let inner = Arc::downgrade(&self.inner);
        let subscription = Subscription::new(closed, move || Self::unsubscribe(&inner, id));

        // an observer whose replay panics is not left registered
        let current = self.value();
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback(&current))) {
            subscription.unsubscribe();
            panic::resume_unwind(payload);
        }

        subscription
    }

    fn unsubscribe(inner: &Weak<BroadcasterInner<T>>, id: u64) {
        if let Some(inner) = inner.upgrade() {
            if lock(&inner.observers).remove(id) {
                trace!(id, "unsubscribe");
            }
        }
    }

    pub(crate) fn stream(&self, teardown: Option<&Teardown>) -> Stream<T>
    where
        T: PartialEq,
    {
        let source = self.clone();
        Stream::new(
            move |sink| source.subscribe(move |value| sink(value)),
            None,
            teardown,
        )
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> Broadcaster<T> {
    /// A stream of the values published here with consecutive equal values collapsed.
    /// The first value a subscriber sees is always the current one.
    ///
    /// # Examples
    /// ```
    /// use rxstore::Broadcaster;
    /// use std::sync::{Arc, Mutex};
    ///
    /// let b = Broadcaster::new(0);
    /// let seen: Arc<Mutex<Vec<i32>>> = Default::default();
    ///
    /// b.changes().subscribe({
    ///     let seen = seen.clone();
    ///     move |val| seen.lock().unwrap().push(*val)
    /// });
    ///
    /// b.publish(0);
    /// b.publish(1);
    /// b.publish(1);
    /// b.reset();
    ///
    /// assert_eq!(vec![0, 1, 0], seen.lock().unwrap().clone());
    /// ```
    pub fn changes(&self) -> Stream<T> {
        self.stream(None)
    }
}

impl<T: Debug> Debug for Broadcaster<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Broadcaster")
            .field(lock(&self.inner.current).deref())
            .finish()
    }
}
