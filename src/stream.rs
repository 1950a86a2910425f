use std::{
    fmt::Debug,
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Mutex, Weak},
};

use tracing::{debug, trace};

use crate::{
    lock,
    observer::{Callback, Observers},
    Subscription, Teardown,
};

type Source<T> = Box<dyn Fn(Callback<T>) -> Subscription + Send + Sync>;
pub(crate) type Filter<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

struct StreamState<T> {
    observers: Observers<T>,
    upstream: Option<Subscription>,
    connecting: bool,
    last: Option<T>,
    /// `last` is still what the source holds, i.e. the latest value passed the filter
    replayable: bool,
    /// subscribers that joined without being handed `last`
    unseen: Vec<u64>,
    terminated: bool,
}

struct StreamInner<T> {
    source: Source<T>,
    filter: Option<Filter<T>>,
    state: Mutex<StreamState<T>>,
    teardown: Option<(Teardown, u64)>,
}

enum OnSubscribe<T> {
    Connect,
    Replay(Option<T>),
}

/// A derived, multicast view over a source of values.
///
/// All subscribers share one upstream subscription: it is opened by the first
/// subscriber and released when the last one leaves. A value equal to the one
/// emitted right before it is dropped, and a subscriber joining while the stream
/// is connected is first handed the last emitted value, unless the filter has
/// rejected the source's value since. Such a subscriber still receives the next
/// value that passes, even if it equals the last one emitted.
///
/// A stream handed out by a [`Store`](crate::Store) also terminates when the
/// store's [`Teardown`] fires. After that it never emits again and subscribing to
/// it returns an already closed [`Subscription`].
///
/// A connected stream is kept alive by its source, so dropping the `Stream`
/// handle does not end existing subscriptions.
pub struct Stream<T> {
    inner: Arc<StreamInner<T>>,
}

impl<T> Clone for Stream<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> Stream<T> {
    pub(crate) fn new(
        source: impl Fn(Callback<T>) -> Subscription + Send + Sync + 'static,
        filter: Option<Filter<T>>,
        teardown: Option<&Teardown>,
    ) -> Self {
        let inner = Arc::new_cyclic(|weak: &Weak<StreamInner<T>>| {
            let mut terminated = false;
            let teardown = teardown.and_then(|teardown| {
                let weak = weak.clone();
                let id = teardown.on_fire(move || {
                    if let Some(inner) = weak.upgrade() {
                        inner.terminate();
                    }
                });
                // already fired
                terminated = id.is_none();
                id.map(|id| (teardown.clone(), id))
            });

            StreamInner {
                source: Box::new(source),
                filter,
                state: Mutex::new(StreamState {
                    observers: Observers::new(),
                    upstream: None,
                    connecting: false,
                    last: None,
                    replayable: false,
                    unseen: vec![],
                    terminated,
                }),
                teardown,
            }
        });

        Self { inner }
    }

    /// Adds a subscriber.
    ///
    /// The first subscriber connects the stream to its source and receives the
    /// source's current value through the pipeline. Later subscribers receive the
    /// last value the stream emitted, if any, and then share the connection.
    pub fn subscribe(&self, f: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let callback: Callback<T> = Arc::new(f);

        let (id, closed, on_subscribe) = {
            let mut state = lock(&self.inner.state);
            if state.terminated {
                return Subscription::closed();
            }

            let (id, closed) = state.observers.add(callback.clone());
            let on_subscribe = if state.upstream.is_some() || state.connecting {
                let last = if state.replayable {
                    state.last.clone()
                } else {
                    None
                };
                if last.is_none() {
                    state.unseen.push(id);
                }
                OnSubscribe::Replay(last)
            } else {
                state.connecting = true;
                OnSubscribe::Connect
            };
            (id, closed, on_subscribe)
        };

        let weak = Arc::downgrade(&self.inner);
        let subscription = Subscription::new(closed, move || {
            if let Some(inner) = weak.upgrade() {
                inner.remove(id);
            }
        });

        let delivered = panic::catch_unwind(AssertUnwindSafe(|| match on_subscribe {
            OnSubscribe::Connect => StreamInner::connect(&self.inner),
            OnSubscribe::Replay(Some(last)) => callback(&last),
            OnSubscribe::Replay(None) => {}
        }));
        if let Err(payload) = delivered {
            subscription.unsubscribe();
            panic::resume_unwind(payload);
        }

        subscription
    }
}

impl<T> Stream<T> {
    /// `true` once the teardown signal this stream is tied to has fired.
    pub fn is_terminated(&self) -> bool {
        lock(&self.inner.state).terminated
    }

    /// Number of subscribers sharing the upstream connection.
    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner.state).observers.len()
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> StreamInner<T> {
    fn connect(this: &Arc<Self>) {
        let sink: Callback<T> = {
            let this = this.clone();
            Arc::new(move |value: &T| this.emit(value))
        };

        trace!("stream connect");
        let upstream = match panic::catch_unwind(AssertUnwindSafe(|| (this.source)(sink))) {
            Ok(upstream) => upstream,
            Err(payload) => {
                lock(&this.state).connecting = false;
                panic::resume_unwind(payload);
            }
        };

        let mut state = lock(&this.state);
        state.connecting = false;
        if state.terminated || state.observers.is_empty() || state.upstream.is_some() {
            drop(state);
            upstream.unsubscribe();
        } else {
            state.upstream = Some(upstream);
        }
    }

    fn emit(&self, value: &T) {
        let passed = self.filter.as_ref().map_or(true, |keep| keep(value));

        let observers = {
            let mut state = lock(&self.state);
            if state.terminated {
                return;
            }
            state.replayable = passed;
            if !passed {
                return;
            }
            if state.last.as_ref() == Some(value) {
                if state.unseen.is_empty() {
                    trace!("duplicate suppressed");
                    return;
                }
                let unseen = std::mem::take(&mut state.unseen);
                state.observers.snapshot_of(&unseen)
            } else {
                state.last = Some(value.clone());
                state.unseen.clear();
                state.observers.snapshot()
            }
        };

        observers.notify(value);
    }
}

impl<T> StreamInner<T> {
    fn remove(&self, id: u64) {
        let upstream = {
            let mut state = lock(&self.state);
            if !state.observers.remove(id) || !state.observers.is_empty() {
                return;
            }
            // dedup and replay start over on the next connection
            state.last = None;
            state.replayable = false;
            state.unseen.clear();
            state.connecting = false;
            state.upstream.take()
        };

        if let Some(upstream) = upstream {
            trace!("stream disconnect");
            upstream.unsubscribe();
        }
    }

    fn terminate(&self) {
        let upstream = {
            let mut state = lock(&self.state);
            if state.terminated {
                return;
            }
            state.terminated = true;
            state.last = None;
            state.replayable = false;
            state.unseen.clear();
            state.observers.close_all();
            state.upstream.take()
        };

        debug!("stream terminated");
        if let Some(upstream) = upstream {
            upstream.unsubscribe();
        }
    }
}

impl<T> Drop for StreamInner<T> {
    fn drop(&mut self) {
        if let Some((teardown, id)) = &self.teardown {
            teardown.remove_listener(*id);
        }
    }
}

impl<T> Debug for Stream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.inner.state);
        f.debug_struct("Stream")
            .field("subscribers", &state.observers.len())
            .field("connected", &state.upstream.is_some())
            .field("terminated", &state.terminated)
            .finish()
    }
}
