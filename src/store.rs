use std::{fmt::Debug, sync::Arc};

use tracing::{debug, trace};

use crate::{stream::Filter, Broadcaster, Key, Record, Stream, Teardown};

/// Record-shaped state container with keyed selection and a scoped lifetime.
///
/// Every stream handed out by a store ends when the store's [`Teardown`] fires,
/// either through [`destroy`](Store::destroy) or because the signal is shared
/// with something else that fired it.
///
/// # Examples
/// ```
/// use rxstore::{record, Store};
/// use std::sync::{Arc, Mutex};
///
/// record! {
///     #[derive(Clone, Debug, PartialEq)]
///     struct Counter {
///         a: i32,
///         b: i32,
///     }
/// }
///
/// fn main() {
///     let store = Store::new(Counter { a: 1, b: 2 });
///     let seen: Arc<Mutex<Vec<i32>>> = Default::default();
///
///     store.select(counter_keys::B).subscribe({
///         let seen = seen.clone();
///         move |b| seen.lock().unwrap().push(*b)
///     });
///
///     store.set_state(CounterPartial::default().a(5));
///     store.set_state(CounterPartial::default().b(9));
///
///     assert_eq!(Counter { a: 5, b: 9 }, store.state());
///     assert_eq!(vec![2, 9], seen.lock().unwrap().clone());
/// }
/// ```
pub struct Store<T> {
    state: Broadcaster<T>,
    teardown: Teardown,
}

impl<T: Record> Store<T> {
    /// Creates a store owning its own teardown signal.
    pub fn new(initial: T) -> Self {
        Self::with_teardown(initial, Teardown::new())
    }

    /// Creates a store whose streams end when `teardown` fires.
    pub fn with_teardown(initial: T, teardown: Teardown) -> Self {
        Self {
            state: Broadcaster::new(initial),
            teardown,
        }
    }

    /// Shallow-merges `partial` into the current state and publishes the result.
    ///
    /// Fields present in `partial` replace the current ones wholesale, nested values
    /// included. After [`destroy`](Store::destroy) the state still changes but no
    /// stream emits.
    pub fn set_state(&self, partial: T::Partial) {
        let mut merged = self.state.value();
        merged.merge(partial);
        self.state.publish(merged);
    }

    /// [`set_state`](Store::set_state), then `on_applied` once every observer has
    /// been notified.
    pub fn set_state_then(&self, partial: T::Partial, on_applied: impl FnOnce()) {
        self.set_state(partial);
        on_applied();
    }

    /// Returns a clone of the current state
    pub fn state(&self) -> T {
        self.state.value()
    }

    /// Perform some action with a reference to the current state.
    ///
    /// The state is locked while `f` runs, so `f` must not update this store.
    ///
    /// # Examples
    /// ```
    /// use rxstore::{record, Store};
    ///
    /// record! {
    ///     #[derive(Clone, Debug, PartialEq)]
    ///     struct Tags {
    ///         names: Vec<String>,
    ///     }
    /// }
    ///
    /// fn main() {
    ///     let store = Store::new(Tags { names: vec![String::from("🦀")] });
    ///     assert_eq!(1, store.with_state(|state| state.names.len()));
    /// }
    /// ```
    pub fn with_state<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.state.with_value(f)
    }

    /// The state this store was constructed with, and the target of [`reset`](Store::reset).
    pub fn initial(&self) -> &T {
        self.state.initial()
    }

    /// Values of the field `K`, deduplicated.
    pub fn select<K>(&self, _key: K) -> Stream<K::Value>
    where
        K: Key<T> + 'static,
        K::Value: Clone + PartialEq + Send + Sync + 'static,
    {
        trace!(key = K::NAME, "select");
        self.derive(|state| K::get(state).clone(), None)
    }

    /// Like [`select`](Store::select), but values for which `filter` returns `false`
    /// are dropped before deduplication.
    pub fn select_filtered<K>(
        &self,
        _key: K,
        filter: impl Fn(&K::Value) -> bool + Send + Sync + 'static,
    ) -> Stream<K::Value>
    where
        K: Key<T> + 'static,
        K::Value: Clone + PartialEq + Send + Sync + 'static,
    {
        trace!(key = K::NAME, "select filtered");
        let filter: Filter<K::Value> = Arc::new(filter);
        self.derive(|state| K::get(state).clone(), Some(filter))
    }

    /// Values of an arbitrary projection of the state, deduplicated.
    pub fn select_by<U>(&self, projection: impl Fn(&T) -> U + Send + Sync + 'static) -> Stream<U>
    where
        U: Clone + PartialEq + Send + Sync + 'static,
    {
        self.derive(projection, None)
    }

    /// The whole state, deduplicated.
    pub fn select_all(&self) -> Stream<T> {
        self.state.stream(Some(&self.teardown))
    }

    /// Publishes the initial state again.
    pub fn reset(&self) {
        debug!("store reset");
        self.state.reset();
    }

    /// [`reset`](Store::reset), then `on_applied` once every observer has been notified.
    pub fn reset_then(&self, on_applied: impl FnOnce()) {
        self.reset();
        on_applied();
    }

    /// Fires the teardown signal, ending every stream derived from this store.
    /// Calling it again does nothing.
    pub fn destroy(&self) {
        if !self.teardown.is_fired() {
            debug!("store destroyed");
        }
        self.teardown.fire();
    }

    /// `true` once the teardown signal has fired, whether through
    /// [`destroy`](Store::destroy) or through a shared signal fired elsewhere.
    pub fn is_destroyed(&self) -> bool {
        self.teardown.is_fired()
    }

    /// The signal that ends this store's streams. Clone it to tie other stores to
    /// the same lifetime.
    pub fn teardown(&self) -> &Teardown {
        &self.teardown
    }

    fn derive<U>(
        &self,
        projection: impl Fn(&T) -> U + Send + Sync + 'static,
        filter: Option<Filter<U>>,
    ) -> Stream<U>
    where
        U: Clone + PartialEq + Send + Sync + 'static,
    {
        let source = self.state.clone();
        let projection = Arc::new(projection);

        Stream::new(
            move |sink| {
                let projection = projection.clone();
                source.subscribe(move |state| sink(&projection(state)))
            },
            filter,
            Some(&self.teardown),
        )
    }
}

impl<T: Debug> Debug for Store<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("state", &self.state)
            .field("destroyed", &self.teardown.is_fired())
            .finish()
    }
}
