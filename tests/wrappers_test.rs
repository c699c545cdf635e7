use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{Arc, Mutex},
    thread,
};

use event_reactions::{Batchable, EventStream, Observing, SeqDelta, Suppressable};

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

fn include(index: usize, elem: char) -> SeqDelta<char> {
    SeqDelta::Include { index, elem }
}

#[test]
fn test_suppressing_mutes_fire() {
    let stream = Suppressable::new();
    let observing = Observing::new();
    let seen = record(&stream, &observing);
    stream.fire(1);
    let returned = stream.suppressing(|| {
        assert!(stream.is_suppressing());
        stream.fire(2);
        "done"
    });
    assert_eq!(returned, "done");
    assert!(!stream.is_suppressing());
    stream.fire(3);
    assert_eq!(*seen.lock().unwrap(), vec![1, 3]);
}

#[test]
fn test_suppressing_nested_restores_outer_state() {
    let stream = Suppressable::new();
    let observing = Observing::new();
    let seen = record(&stream, &observing);
    stream.suppressing(|| {
        stream.suppressing(|| stream.fire(1));
        assert!(stream.is_suppressing());
        stream.fire(2);
    });
    stream.fire(3);
    assert_eq!(*seen.lock().unwrap(), vec![3]);
}

#[test]
fn test_suppressing_restored_after_panic() {
    let stream = Suppressable::<i32>::new();
    let result = catch_unwind(AssertUnwindSafe(|| {
        stream.suppressing(|| panic!("boom"));
    }));
    assert!(result.is_err());
    assert!(!stream.is_suppressing());
}

#[test]
fn test_suppressing_is_per_thread() {
    let stream = Suppressable::new();
    let observing = Observing::new();
    let seen = record(&stream, &observing);
    stream.suppressing(|| {
        let other = stream.clone();
        thread::spawn(move || other.fire(1)).join().unwrap();
        stream.fire(2);
    });
    assert_eq!(*seen.lock().unwrap(), vec![1]);
}

#[test]
fn test_suppressable_breaks_feedback_loop() {
    let left = Suppressable::new();
    let right = Suppressable::new();
    let observing = Observing::new();
    left.foreach(&observing, {
        let right = right.clone();
        let left = left.clone();
        move |n: &i32| left.suppressing(|| right.fire(*n))
    });
    right.foreach(&observing, {
        let left = left.clone();
        let right = right.clone();
        move |n: &i32| right.suppressing(|| left.fire(*n))
    });
    let seen = record(&right, &observing);
    left.fire(5);
    assert_eq!(*seen.lock().unwrap(), vec![5]);
}

#[test]
fn test_batching_three_deltas_fires_one_batch() {
    let deltas = Batchable::new();
    let observing = Observing::new();
    let seen = record(&deltas, &observing);
    deltas.batching(|| {
        deltas.fire(include(0, 'a'));
        deltas.fire(include(1, 'b'));
        deltas.fire(SeqDelta::Remove { index: 0, elem: 'a' });
        assert!(seen.lock().unwrap().is_empty());
    });
    assert_eq!(
        *seen.lock().unwrap(),
        vec![SeqDelta::Batch(vec![
            include(0, 'a'),
            include(1, 'b'),
            SeqDelta::Remove { index: 0, elem: 'a' },
        ])]
    );
}

#[test]
fn test_batching_single_delta_is_unwrapped() {
    let deltas = Batchable::new();
    let observing = Observing::new();
    let seen = record(&deltas, &observing);
    deltas.batching(|| deltas.fire(include(0, 'x')));
    assert_eq!(*seen.lock().unwrap(), vec![include(0, 'x')]);
}

#[test]
fn test_batching_nothing_fires_nothing() {
    let deltas = Batchable::<char>::new();
    let observing = Observing::new();
    let seen = record(&deltas, &observing);
    let n = deltas.batching(|| 7);
    assert_eq!(n, 7);
    assert!(seen.lock().unwrap().is_empty());
}

#[test]
fn test_nested_batching_flushes_once() {
    let deltas = Batchable::new();
    let observing = Observing::new();
    let seen = record(&deltas, &observing);
    deltas.batching(|| {
        deltas.fire(include(0, 'a'));
        deltas.batching(|| deltas.fire(include(1, 'b')));
        assert!(seen.lock().unwrap().is_empty());
        deltas.fire(include(2, 'c'));
    });
    assert_eq!(
        *seen.lock().unwrap(),
        vec![SeqDelta::Batch(vec![
            include(0, 'a'),
            include(1, 'b'),
            include(2, 'c')
        ])]
    );
    assert!(!deltas.is_batching());
}

#[test]
fn test_fire_outside_batching_is_immediate() {
    let deltas = Batchable::new();
    let observing = Observing::new();
    let seen = record(&deltas, &observing);
    deltas.fire(include(0, 'a'));
    assert_eq!(*seen.lock().unwrap(), vec![include(0, 'a')]);
}

#[test]
fn test_batching_discarded_after_panic() {
    let deltas = Batchable::new();
    let observing = Observing::new();
    let seen = record(&deltas, &observing);
    let result = catch_unwind(AssertUnwindSafe(|| {
        deltas.batching(|| {
            deltas.fire(include(0, 'a'));
            panic!("boom");
        })
    }));
    assert!(result.is_err());
    assert!(!deltas.is_batching());
    deltas.fire(include(1, 'b'));
    assert_eq!(*seen.lock().unwrap(), vec![include(1, 'b')]);
}

#[test]
fn test_seq_delta_apply_and_flatten() {
    let batch = SeqDelta::Batch(vec![
        include(0, 'a'),
        SeqDelta::Batch(vec![include(1, 'b'), include(2, 'c')]),
        SeqDelta::Update {
            index: 1,
            old: 'b',
            new: 'B',
        },
        SeqDelta::Remove { index: 0, elem: 'a' },
    ]);
    let mut seq = Vec::new();
    batch.apply_to(&mut seq);
    assert_eq!(seq, vec!['B', 'c']);
    assert_eq!(batch.flatten().len(), 5);
}
