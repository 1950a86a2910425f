//! Reactive State Container
//!
//! [`Broadcaster`] holds a single value and pushes every published value to its
//! observers, replaying the current value to anyone who subscribes late.
//!
//! [`Store`] layers a record-shaped state on top of it: shallow partial updates,
//! per-field [`Stream`]s that only emit when the field actually changes, and a
//! [`Teardown`] signal that ends every stream the store handed out.
//!
//! Everything runs synchronously on the caller's thread. No lock is held while
//! user callbacks run, so callbacks may publish, subscribe or unsubscribe.

mod broadcaster;
mod macros;
mod observer;
mod record;
mod store;
mod stream;
mod subscription;
mod teardown;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use broadcaster::Broadcaster;
pub use record::{Key, Record};
pub use store::Store;
pub use stream::Stream;
pub use subscription::Subscription;
pub use teardown::Teardown;

#[doc(hidden)]
pub mod __private {
    pub use paste::paste;
}

/// Locks `mutex`, ignoring poisoning.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
