use std::sync::{Arc, Mutex};

use event_reactions::{EventSource, EventStream, Listener, Observing};

fn record<T, S>(stream: &S, observing: &Observing) -> Arc<Mutex<Vec<T>>>
where
    T: Clone + Send + Sync + 'static,
    S: EventStream<T>,
{
    let seen = Arc::new(Mutex::new(Vec::new()));
    stream.foreach(observing, {
        let seen = seen.clone();
        move |event: &T| seen.lock().unwrap().push(event.clone())
    });
    seen
}

#[test]
fn test_listeners_fire_in_registration_order() {
    let source = EventSource::new();
    let observing = Observing::new();
    let order = Arc::new(Mutex::new(Vec::new()));
    for tag in ["first", "second", "third"] {
        let order = order.clone();
        source.foreach(&observing, move |n: &i32| {
            order.lock().unwrap().push(format!("{tag}:{n}"))
        });
    }
    source.fire(1);
    assert_eq!(*order.lock().unwrap(), vec!["first:1", "second:1", "third:1"]);
}

#[test]
fn test_dropped_anchor_stops_listener() {
    let source = EventSource::new();
    let observing = Observing::new();
    let seen = record(&source, &observing);
    source.fire(1);
    assert_eq!(source.listener_count(), 1);
    drop(observing);
    source.fire(2);
    assert_eq!(*seen.lock().unwrap(), vec![1]);
    assert_eq!(source.listener_count(), 0);
}

#[test]
fn test_released_anchor_stays_usable() {
    let source = EventSource::new();
    let observing = Observing::new();
    let first = record(&source, &observing);
    observing.release();
    assert!(observing.is_empty());
    let second = record(&source, &observing);
    source.fire(7);
    assert!(first.lock().unwrap().is_empty());
    assert_eq!(*second.lock().unwrap(), vec![7]);
}

#[test]
fn test_unregister_removes_latest_occurrence_only() {
    let source = EventSource::new();
    let count = Arc::new(Mutex::new(0));
    let listener = Listener::new({
        let count = count.clone();
        move |_: &()| *count.lock().unwrap() += 1
    });
    source.register_listener(&listener);
    source.register_listener(&listener);
    source.fire(());
    assert_eq!(*count.lock().unwrap(), 2);

    assert!(source.unregister_listener(&listener));
    source.fire(());
    assert_eq!(*count.lock().unwrap(), 3);

    assert!(source.unregister_listener(&listener));
    assert!(!source.unregister_listener(&listener));
    source.fire(());
    assert_eq!(*count.lock().unwrap(), 3);
}

#[test]
fn test_listener_without_owner_is_skipped() {
    let source = EventSource::new();
    let count = Arc::new(Mutex::new(0));
    {
        let listener = Listener::new({
            let count = count.clone();
            move |_: &u8| *count.lock().unwrap() += 1
        });
        source.register_listener(&listener);
        source.fire(1);
    }
    source.fire(2);
    assert_eq!(*count.lock().unwrap(), 1);
    assert_eq!(source.listener_count(), 0);
}

#[test]
fn test_map() {
    let source = EventSource::new();
    let observing = Observing::new();
    let seen = record(&source.map(|n: &i32| n * 10), &observing);
    source.fire(1);
    source.fire(2);
    source.fire(3);
    assert_eq!(*seen.lock().unwrap(), vec![10, 20, 30]);
}

#[test]
fn test_derived_stream_keeps_chain_alive() {
    let observing = Observing::new();
    let source = EventSource::new();
    let seen = {
        let doubled = source.map(|n: &i32| n * 2);
        let shown = doubled.map(|n: &i32| format!("<{n}>"));
        record(&shown, &observing)
    };
    source.fire(4);
    assert_eq!(*seen.lock().unwrap(), vec!["<8>".to_string()]);
}

#[test]
fn test_dropped_derived_stream_detaches() {
    let source = EventSource::new();
    let mapped = source.map(|n: &i32| n + 1);
    assert_eq!(source.listener_count(), 1);
    drop(mapped);
    assert_eq!(source.listener_count(), 0);
}

#[test]
fn test_filter() {
    let source = EventSource::new();
    let observing = Observing::new();
    let seen = record(&source.filter(|n: &i32| n % 2 == 1), &observing);
    for n in 1..=6 {
        source.fire(n);
    }
    assert_eq!(*seen.lock().unwrap(), vec![1, 3, 5]);
}

#[test]
fn test_filter_map() {
    let source = EventSource::new();
    let observing = Observing::new();
    let parsed = source.filter_map(|s: &&str| s.parse::<i32>().ok());
    let seen = record(&parsed, &observing);
    source.fire("1");
    source.fire("x");
    source.fire("3");
    assert_eq!(*seen.lock().unwrap(), vec![1, 3]);
}

#[test]
fn test_fold_left() {
    let source = EventSource::new();
    let observing = Observing::new();
    let seen = record(&source.fold_left(0, |acc, n: &i32| acc + n), &observing);
    source.fire(1);
    source.fire(2);
    source.fire(3);
    assert_eq!(*seen.lock().unwrap(), vec![1, 3, 6]);
}

#[test]
fn test_take_while_terminates() {
    let source = EventSource::new();
    let observing = Observing::new();
    let seen = record(&source.take_while(|n: &i32| *n < 3), &observing);
    for n in [1, 2, 3, 4, 1, 2] {
        source.fire(n);
    }
    assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    // the take_while listener detached itself from the source
    assert_eq!(source.listener_count(), 0);
}

#[test]
fn test_union() {
    let a = EventSource::new();
    let b = EventSource::new();
    let observing = Observing::new();
    let seen = record(&a.union(&b), &observing);
    a.fire(1);
    b.fire(2);
    a.fire(3);
    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
}

#[test]
fn test_flat_map_switches_inner_stream() {
    let first = EventSource::new();
    let second = EventSource::new();
    let selector = EventSource::new();
    let observing = Observing::new();
    let flattened = selector.flat_map(Some(1), {
        let first = first.clone();
        let second = second.clone();
        move |n: &i32| if *n == 1 { first.clone() } else { second.clone() }
    });
    let seen = record(&flattened, &observing);

    first.fire("a");
    second.fire("ignored");
    selector.fire(2);
    first.fire("stale");
    second.fire("b");
    selector.fire(1);
    first.fire("c");
    assert_eq!(*seen.lock().unwrap(), vec!["a", "b", "c"]);
    assert_eq!(first.listener_count(), 1);
    assert_eq!(second.listener_count(), 0);
}

#[test]
fn test_flat_map_without_initial_waits_for_parent() {
    let inner = EventSource::new();
    let selector = EventSource::new();
    let observing = Observing::new();
    let flattened = selector.flat_map(None, {
        let inner = inner.clone();
        move |_: &()| inner.clone()
    });
    let seen = record(&flattened, &observing);
    inner.fire(1);
    selector.fire(());
    inner.fire(2);
    // switching to the same stream keeps exactly one subscription
    selector.fire(());
    inner.fire(3);
    assert_eq!(*seen.lock().unwrap(), vec![2, 3]);
}

#[test]
fn test_listener_may_fire_reentrantly() {
    let source = EventSource::new();
    let echo = EventSource::new();
    let observing = Observing::new();
    source.foreach(&observing, {
        let echo = echo.clone();
        move |n: &i32| echo.fire(n * 100)
    });
    let seen = record(&echo, &observing);
    // a listener registering another listener while firing
    source.foreach(&observing, {
        let source = source.clone();
        let observing = observing.clone();
        move |_: &i32| {
            source.foreach(&observing, |_| {});
        }
    });
    source.fire(1);
    source.fire(2);
    assert_eq!(*seen.lock().unwrap(), vec![100, 200]);
}
