use std::{
    collections::HashSet,
    sync::{Arc, Mutex, PoisonError},
    thread::{self, ThreadId},
};

use crate::{EventSource, EventStream};

/// Event stream that can be muted on the current thread.
///
/// While [suppressing](Suppressable::suppressing) runs, [fire](EventStream::fire) on this stream
/// is a no-op for the calling thread. This breaks feedback loops between two streams that
/// update each other: each side fires the other inside ```suppressing```.
pub struct Suppressable<T: 'static> {
    source: EventSource<T>,
    suppressed: Arc<Mutex<HashSet<ThreadId>>>,
}

impl<T: 'static> Clone for Suppressable<T> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            suppressed: self.suppressed.clone(),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Default for Suppressable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> Suppressable<T> {
    pub fn new() -> Self {
        Self {
            source: EventSource::new(),
            suppressed: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Run `f` with firing muted on this thread. The previous state is restored on return,
    /// including when `f` panics.
    pub fn suppressing<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = SuppressGuard::enter(self.suppressed.clone());
        f()
    }

    /// Is firing muted on the current thread
    pub fn is_suppressing(&self) -> bool {
        self.suppressed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&thread::current().id())
    }
}

impl<T: Clone + Send + Sync + 'static> EventStream<T> for Suppressable<T> {
    fn source(&self) -> &EventSource<T> {
        &self.source
    }
    fn fire(&self, event: T) {
        if !self.is_suppressing() {
            self.source.notify(&event)
        }
    }
}

struct SuppressGuard {
    suppressed: Arc<Mutex<HashSet<ThreadId>>>,
    thread: ThreadId,
    was_suppressed: bool,
}

impl SuppressGuard {
    fn enter(suppressed: Arc<Mutex<HashSet<ThreadId>>>) -> Self {
        let thread = thread::current().id();
        let was_suppressed = !suppressed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(thread);
        Self {
            suppressed,
            thread,
            was_suppressed,
        }
    }
}

impl Drop for SuppressGuard {
    fn drop(&mut self) {
        if !self.was_suppressed {
            self.suppressed
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&self.thread);
        }
    }
}
