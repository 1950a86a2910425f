use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

pub(crate) type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Entry<T> {
    id: u64,
    closed: Arc<AtomicBool>,
    callback: Callback<T>,
}

/// Observers in the order they subscribed.
///
/// The list itself is never iterated while a callback runs. `snapshot` copies
/// the entries out so the owner can release its lock first, which is what lets
/// a callback subscribe, unsubscribe or publish again without deadlocking.
pub(crate) struct Observers<T> {
    next_id: u64,
    entries: Vec<Entry<T>>,
}

impl<T> Observers<T> {
    pub const fn new() -> Self {
        Self {
            next_id: 0,
            entries: vec![],
        }
    }

    pub fn add(&mut self, callback: Callback<T>) -> (u64, Arc<AtomicBool>) {
        let id = self.next_id;
        self.next_id += 1;

        let closed = Arc::new(AtomicBool::new(false));
        self.entries.push(Entry {
            id,
            closed: closed.clone(),
            callback,
        });

        (id, closed)
    }

    pub fn remove(&mut self, id: u64) -> bool {
        match self.entries.iter().position(|entry| entry.id == id) {
            Some(index) => {
                let entry = self.entries.remove(index);
                entry.closed.store(true, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    /// Marks every entry closed and empties the list.
    pub fn close_all(&mut self) {
        for entry in self.entries.drain(..) {
            entry.closed.store(true, Ordering::SeqCst);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn snapshot(&self) -> Snapshot<T> {
        Snapshot(
            self.entries
                .iter()
                .map(|entry| (entry.closed.clone(), entry.callback.clone()))
                .collect(),
        )
    }

    /// Like `snapshot`, restricted to the given ids.
    pub fn snapshot_of(&self, ids: &[u64]) -> Snapshot<T> {
        Snapshot(
            self.entries
                .iter()
                .filter(|entry| ids.contains(&entry.id))
                .map(|entry| (entry.closed.clone(), entry.callback.clone()))
                .collect(),
        )
    }
}

/// Observers captured at the start of a notification.
pub(crate) struct Snapshot<T>(Vec<(Arc<AtomicBool>, Callback<T>)>);

impl<T> Snapshot<T> {
    /// Calls every captured observer in subscription order.
    /// An observer removed before its turn came up is skipped.
    pub fn notify(&self, value: &T) {
        for (closed, callback) in &self.0 {
            if !closed.load(Ordering::SeqCst) {
                callback(value);
            }
        }
    }
}
