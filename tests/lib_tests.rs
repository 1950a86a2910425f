use rxstore::{Broadcaster, Subscription};
use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

fn log_values<T: Clone + Send + Sync + 'static>(
    b: &Broadcaster<T>,
) -> (Arc<Mutex<Vec<T>>>, Subscription) {
    let changes: Arc<Mutex<Vec<T>>> = Default::default();
    let sub = b.subscribe({
        let changes = changes.clone();
        move |val| changes.lock().unwrap().push(val.clone())
    });
    (changes, sub)
}

#[test]
fn subscribe_replays_current_value() {
    let b = Broadcaster::new(String::from("a"));
    b.publish(String::from("b"));

    let (changes, _) = log_values(&b);

    assert_eq!(vec![String::from("b")], changes.lock().unwrap().clone());
}

#[test]
fn publish_notifies_in_subscription_order() {
    let b = Broadcaster::new(0);
    let record: Arc<Mutex<Vec<String>>> = Default::default();

    for tag in ["a", "b", "c"] {
        b.subscribe({
            let record = record.clone();
            move |val| record.lock().unwrap().push(format!("{tag}{val}"))
        });
    }

    b.publish(1);

    assert_eq!(
        vec!["a0", "b0", "c0", "a1", "b1", "c1"],
        record.lock().unwrap().clone()
    );
}

#[test]
fn publish_does_not_deduplicate() {
    let b = Broadcaster::new(1);
    let (changes, _) = log_values(&b);

    b.publish(1);
    b.publish(1);

    assert_eq!(vec![1, 1, 1], changes.lock().unwrap().clone());
}

#[test]
fn reset_publishes_initial_value_even_when_unchanged() {
    let b = Broadcaster::new(1);
    let (changes, _) = log_values(&b);

    b.reset();
    b.publish(7);
    b.reset();

    assert_eq!(vec![1, 1, 7, 1], changes.lock().unwrap().clone());
    assert_eq!(1, b.value());
}

#[test]
fn initial_value_is_never_mutated() {
    let b = Broadcaster::new(vec![1, 2]);

    b.publish(vec![3]);

    assert_eq!(vec![3], b.value());
    assert_eq!(&vec![1, 2], b.initial());
    b.with_value(|nums| assert_eq!(1, nums.len()));
}

#[test]
fn unsubscribe_stops_notifications() {
    let b = Broadcaster::new(0);
    let (changes, sub) = log_values(&b);
    assert_eq!(1, b.observer_count());

    b.publish(1);
    sub.unsubscribe();
    sub.unsubscribe();
    b.publish(2);

    assert!(sub.is_closed());
    assert_eq!(0, b.observer_count());
    assert_eq!(vec![0, 1], changes.lock().unwrap().clone());
}

#[test]
fn clones_share_value_and_observers() {
    let b = Broadcaster::new(0);
    let other = b.clone();
    let (changes, _) = log_values(&b);

    other.publish(5);

    assert_eq!(5, b.value());
    assert_eq!(vec![0, 5], changes.lock().unwrap().clone());
}

#[test]
fn publish_from_observer_is_recursive() {
    let b = Broadcaster::new(0);
    let record: Arc<Mutex<Vec<String>>> = Default::default();

    b.subscribe({
        let record = record.clone();
        let b = b.clone();
        move |val| {
            record.lock().unwrap().push(format!("a{val}"));
            if *val == 1 {
                b.publish(2);
            }
        }
    });
    b.subscribe({
        let record = record.clone();
        move |val| record.lock().unwrap().push(format!("b{val}"))
    });

    b.publish(1);

    assert_eq!(
        vec!["a0", "b0", "a1", "a2", "b2", "b1"],
        record.lock().unwrap().clone()
    );
    assert_eq!(2, b.value());
}

#[test]
fn unsubscribing_during_notification_only_affects_that_observer() {
    let b = Broadcaster::new(0);
    let record: Arc<Mutex<Vec<String>>> = Default::default();
    let victim: Arc<Mutex<Option<Subscription>>> = Default::default();

    b.subscribe({
        let record = record.clone();
        let victim = victim.clone();
        move |val| {
            record.lock().unwrap().push(format!("a{val}"));
            if *val == 1 {
                if let Some(sub) = victim.lock().unwrap().as_ref() {
                    sub.unsubscribe();
                }
            }
        }
    });
    let sub = b.subscribe({
        let record = record.clone();
        move |val| record.lock().unwrap().push(format!("b{val}"))
    });
    *victim.lock().unwrap() = Some(sub);
    b.subscribe({
        let record = record.clone();
        move |val| record.lock().unwrap().push(format!("c{val}"))
    });

    b.publish(1);
    b.publish(2);

    assert_eq!(
        vec!["a0", "b0", "c0", "a1", "c1", "a2", "c2"],
        record.lock().unwrap().clone()
    );
    assert_eq!(2, b.observer_count());
}

#[test]
fn subscribing_during_notification_replays_once() {
    let b = Broadcaster::new(0);
    let record: Arc<Mutex<Vec<String>>> = Default::default();

    b.subscribe({
        let record = record.clone();
        let b = b.clone();
        move |val| {
            record.lock().unwrap().push(format!("a{val}"));
            if *val == 1 {
                let record = record.clone();
                b.subscribe(move |val| record.lock().unwrap().push(format!("d{val}")));
            }
        }
    });
    b.subscribe({
        let record = record.clone();
        move |val| record.lock().unwrap().push(format!("c{val}"))
    });

    b.publish(1);

    assert_eq!(
        vec!["a0", "c0", "a1", "d1", "c1"],
        record.lock().unwrap().clone()
    );
    assert_eq!(3, b.observer_count());
}

#[test]
fn changes_collapse_structurally_equal_values() {
    let b = Broadcaster::new(vec![String::from("🦀")]);
    let changes: Arc<Mutex<Vec<Vec<String>>>> = Default::default();

    b.changes().subscribe({
        let changes = changes.clone();
        move |val| changes.lock().unwrap().push(val.clone())
    });

    b.publish(vec![String::from("🦀")]);
    b.publish(vec![String::from("🦞")]);
    b.publish(vec![String::from("🦞")]);
    b.publish(vec![String::from("🦀")]);

    assert_eq!(
        vec![
            vec![String::from("🦀")],
            vec![String::from("🦞")],
            vec![String::from("🦀")]
        ],
        changes.lock().unwrap().clone()
    );
}

#[test]
fn changes_share_one_upstream_subscription() {
    let b = Broadcaster::new(1);
    let changes = b.changes();
    let record: Arc<Mutex<Vec<String>>> = Default::default();

    changes.subscribe({
        let record = record.clone();
        move |val| record.lock().unwrap().push(format!("x{val}"))
    });
    b.publish(2);
    changes.subscribe({
        let record = record.clone();
        move |val| record.lock().unwrap().push(format!("y{val}"))
    });
    b.publish(3);

    assert_eq!(1, b.observer_count());
    assert_eq!(2, changes.subscriber_count());
    assert_eq!(
        vec!["x1", "x2", "y2", "x3", "y3"],
        record.lock().unwrap().clone()
    );
}

#[test]
fn changes_disconnect_when_last_subscriber_leaves() {
    let b = Broadcaster::new(1);
    let changes = b.changes();
    let count = Arc::new(AtomicUsize::new(0));

    let first = changes.subscribe({
        let count = count.clone();
        move |_| {
            count.fetch_add(1, Ordering::SeqCst);
        }
    });
    let second = changes.subscribe(|_| {});
    assert_eq!(1, b.observer_count());

    first.unsubscribe();
    assert_eq!(1, b.observer_count());
    second.unsubscribe();
    assert_eq!(0, b.observer_count());

    b.publish(1);
    assert_eq!(1, count.load(Ordering::SeqCst));

    let seen: Arc<Mutex<Vec<i32>>> = Default::default();
    changes.subscribe({
        let seen = seen.clone();
        move |val| seen.lock().unwrap().push(*val)
    });

    // a fresh connection starts from the current value again
    assert_eq!(vec![1], seen.lock().unwrap().clone());
    assert!(!changes.is_terminated());
}

#[test]
fn dropping_the_stream_handle_keeps_subscriptions_alive() {
    let b = Broadcaster::new(0);
    let seen: Arc<Mutex<Vec<i32>>> = Default::default();

    let sub = b.changes().subscribe({
        let seen = seen.clone();
        move |val| seen.lock().unwrap().push(*val)
    });
    b.publish(4);
    sub.unsubscribe();
    b.publish(5);

    assert_eq!(vec![0, 4], seen.lock().unwrap().clone());
    assert_eq!(0, b.observer_count());
}

#[test]
fn observer_panicking_on_replay_is_removed() {
    let b = Broadcaster::new(1);

    let subscribed = catch_unwind(AssertUnwindSafe(|| b.subscribe(|_| panic!("replay"))));
    assert!(subscribed.is_err());
    assert_eq!(0, b.observer_count());

    let (changes, _) = log_values(&b);
    b.publish(2);

    assert_eq!(vec![1, 2], changes.lock().unwrap().clone());
}

#[test]
fn changes_recover_when_the_first_subscriber_panics() {
    let b = Broadcaster::new(1);
    let changes = b.changes();

    let subscribed = catch_unwind(AssertUnwindSafe(|| changes.subscribe(|_| panic!("replay"))));
    assert!(subscribed.is_err());
    assert_eq!(0, b.observer_count());
    assert_eq!(0, changes.subscriber_count());

    let seen: Arc<Mutex<Vec<i32>>> = Default::default();
    changes.subscribe({
        let seen = seen.clone();
        move |val| seen.lock().unwrap().push(*val)
    });
    b.publish(2);
    b.publish(2);

    assert_eq!(vec![1, 2], seen.lock().unwrap().clone());
    assert_eq!(1, b.observer_count());
}

#[test]
fn panics_in_publish_reach_the_caller() {
    let b = Broadcaster::new(1);
    let (changes, _) = log_values(&b);
    b.subscribe(|val| assert_ne!(3, *val));

    assert!(catch_unwind(AssertUnwindSafe(|| b.publish(3))).is_err());
    b.publish(4);

    assert_eq!(4, b.value());
    assert_eq!(vec![1, 3, 4], changes.lock().unwrap().clone());
}

#[tokio::test(flavor = "multi_thread")]
async fn is_threadsafe() {
    let b = Broadcaster::new(0usize);
    let count = Arc::new(AtomicUsize::new(0));

    b.subscribe({
        let count = count.clone();
        move |_| {
            count.fetch_add(1, Ordering::SeqCst);
        }
    });

    let handles: Vec<_> = (0..4)
        .map(|task| {
            let b = b.clone();
            tokio::spawn(async move {
                for i in 0..25 {
                    b.publish(task * 100 + i);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap();
    }

    // one replay plus every publish
    assert_eq!(101, count.load(Ordering::SeqCst));
    assert_eq!(1, b.observer_count());
}
