use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    thread::{self, ThreadId},
};

use crate::{EventSource, EventStream, SeqDelta};

type Pending<A> = Arc<Mutex<HashMap<ThreadId, Vec<SeqDelta<A>>>>>;

/// Stream of [SeqDelta] changes which can coalesce the changes made during one turn.
///
/// Inside [batching](Batchable::batching) the deltas fired on the calling thread are collected
/// instead of notified. When the outermost ```batching``` call returns, listeners receive
/// nothing if no delta was fired, the delta itself if exactly one was fired, or a single
/// [SeqDelta::Batch] with all of them in firing order otherwise.
///
/// ```
/// # use std::sync::{Arc, Mutex};
/// # use event_reactions::{Batchable, EventStream, Observing, SeqDelta};
/// let changes = Batchable::<char>::new();
/// let observing = Observing::new();
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// changes.foreach(&observing, {
///     let seen = seen.clone();
///     move |d: &SeqDelta<char>| seen.lock().unwrap().push(d.clone())
/// });
///
/// changes.batching(|| {
///     changes.fire(SeqDelta::Include { index: 0, elem: 'a' });
///     changes.fire(SeqDelta::Include { index: 1, elem: 'b' });
/// });
/// assert_eq!(
///     *seen.lock().unwrap(),
///     vec![SeqDelta::Batch(vec![
///         SeqDelta::Include { index: 0, elem: 'a' },
///         SeqDelta::Include { index: 1, elem: 'b' },
///     ])]
/// );
/// ```
pub struct Batchable<A: 'static> {
    source: EventSource<SeqDelta<A>>,
    pending: Pending<A>,
}

impl<A: 'static> Clone for Batchable<A> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            pending: self.pending.clone(),
        }
    }
}

impl<A: Clone + Send + Sync + 'static> Default for Batchable<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Clone + Send + Sync + 'static> Batchable<A> {
    pub fn new() -> Self {
        Self {
            source: EventSource::new(),
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Run `f`, collecting the deltas fired on this thread and emitting them once at the end.
    /// Nested calls just run `f`; the outermost call emits. If `f` panics the collected
    /// deltas are discarded.
    pub fn batching<R>(&self, f: impl FnOnce() -> R) -> R {
        let Some(guard) = BatchGuard::enter(self.pending.clone()) else {
            return f();
        };
        let result = f();
        let deltas = guard.finish();
        tracing::trace!(message = "batchable.flush", deltas = deltas.len());
        match deltas.len() {
            0 => {}
            1 => {
                if let Some(delta) = deltas.into_iter().next() {
                    self.source.notify(&delta)
                }
            }
            _ => self.source.notify(&SeqDelta::Batch(deltas)),
        }
        result
    }

    /// Is a batch being collected on the current thread
    pub fn is_batching(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&thread::current().id())
    }
}

impl<A: Clone + Send + Sync + 'static> EventStream<SeqDelta<A>> for Batchable<A> {
    fn source(&self) -> &EventSource<SeqDelta<A>> {
        &self.source
    }
    fn fire(&self, delta: SeqDelta<A>) {
        let delta = {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            match pending.get_mut(&thread::current().id()) {
                Some(batch) => {
                    batch.push(delta);
                    return;
                }
                None => delta,
            }
        };
        self.source.notify(&delta)
    }
}

struct BatchGuard<A> {
    pending: Pending<A>,
    thread: ThreadId,
}

impl<A> BatchGuard<A> {
    /// Start collecting for the current thread, or ```None``` if already collecting
    fn enter(pending: Pending<A>) -> Option<Self> {
        let thread = thread::current().id();
        {
            let mut map = pending.lock().unwrap_or_else(PoisonError::into_inner);
            if map.contains_key(&thread) {
                return None;
            }
            map.insert(thread, Vec::new());
        }
        Some(Self { pending, thread })
    }
    fn finish(self) -> Vec<SeqDelta<A>> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.thread)
            .unwrap_or_default()
    }
}

impl<A> Drop for BatchGuard<A> {
    fn drop(&mut self) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.thread);
    }
}
