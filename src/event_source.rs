use std::{
    any::Any,
    sync::{Arc, Mutex, PoisonError, RwLock, Weak},
};

use crate::EventStream;

type ListenerFn<T> = dyn Fn(&T) + Send + Sync;

/// Reference-counted listener closure. Identity is pointer identity: two clones of the same
/// ```Listener``` are the same listener, two listeners built from equal closures are not.
///
/// Streams only keep a weak reference to a listener. Someone else - an [Observing](crate::Observing)
/// anchor or a derived stream - must hold the ```Listener``` for it to keep firing.
pub struct Listener<T: 'static>(Arc<ListenerFn<T>>);

impl<T: 'static> Listener<T> {
    pub fn new(f: impl Fn(&T) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }
    pub fn call(&self, event: &T) {
        (self.0)(event)
    }
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
    fn downgrade(&self) -> Weak<ListenerFn<T>> {
        Arc::downgrade(&self.0)
    }
    fn is(&self, weak: &Weak<ListenerFn<T>>) -> bool {
        weak.strong_count() > 0
            && Weak::as_ptr(weak) as *const () == Arc::as_ptr(&self.0) as *const ()
    }
}

impl<T: 'static> Clone for Listener<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: 'static> std::fmt::Debug for Listener<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Listener")
            .field(&(Arc::as_ptr(&self.0) as *const ()))
            .finish()
    }
}

struct Listeners<T: 'static>(Vec<Weak<ListenerFn<T>>>);

impl<T: 'static> Listeners<T> {
    fn new() -> Self {
        Self(Vec::new())
    }
    fn count(&self) -> usize {
        self.0.iter().filter(|w| w.strong_count() > 0).count()
    }
    fn prune(&mut self) {
        let before = self.0.len();
        self.0.retain(|w| w.strong_count() > 0);
        let pruned = before - self.0.len();
        if pruned > 0 {
            tracing::trace!(message = "event_source.prune", pruned);
        }
    }
    fn add(&mut self, listener: &Listener<T>) {
        self.prune();
        self.0.push(listener.downgrade());
    }
    fn remove(&mut self, listener: &Listener<T>) -> bool {
        if let Some(pos) = self.0.iter().rposition(|w| listener.is(w)) {
            self.0.remove(pos);
            true
        } else {
            false
        }
    }
    fn snapshot(&mut self) -> Vec<Arc<ListenerFn<T>>> {
        let live: Vec<_> = self.0.iter().filter_map(|w| w.upgrade()).collect();
        if live.len() != self.0.len() {
            self.prune();
        }
        live
    }
}

struct SourceInner<T: 'static> {
    listeners: RwLock<Listeners<T>>,
    retained: Mutex<Vec<Arc<dyn Any + Send + Sync>>>,
}

/// Basic event stream. Listeners are notified synchronously, in registration order,
/// on the thread calling [fire](EventStream::fire).
///
/// Cloning an ```EventSource``` creates another handle to the same stream. A stream
/// derived by [map](EventStream::map), [filter](EventStream::filter) and the other
/// combinators keeps its upstream alive for as long as the derived stream is reachable.
pub struct EventSource<T: 'static> {
    inner: Arc<SourceInner<T>>,
}

impl<T: 'static> Clone for EventSource<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: 'static> Default for EventSource<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> std::fmt::Debug for EventSource<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSource")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl<T: 'static> EventSource<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SourceInner {
                listeners: RwLock::new(Listeners::new()),
                retained: Mutex::new(Vec::new()),
            }),
        }
    }
    /// Return number of live listeners
    pub fn listener_count(&self) -> usize {
        self.inner
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .count()
    }
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
    pub(crate) fn add_listener(&self, listener: &Listener<T>) {
        self.inner
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .add(listener)
    }
    pub(crate) fn remove_listener(&self, listener: &Listener<T>) -> bool {
        self.inner
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(listener)
    }
    /// Call every live listener with `event`. The listener table is not locked while the
    /// listeners run, so they may register, unregister or fire freely.
    pub(crate) fn notify(&self, event: &T) {
        let listeners = self
            .inner
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot();
        for listener in listeners {
            listener(event)
        }
    }
    /// Keep `value` alive for as long as this stream is
    pub(crate) fn retain<V: Any + Send + Sync>(&self, value: V) {
        self.inner
            .retained
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(value));
    }
    pub(crate) fn downgrade(&self) -> WeakSource<T> {
        WeakSource(Arc::downgrade(&self.inner))
    }
}

/// Non-owning handle used by listeners that fire into a derived stream, so that a
/// derived stream is not kept alive by its own upstream registration.
pub(crate) struct WeakSource<T: 'static>(Weak<SourceInner<T>>);

impl<T: 'static> WeakSource<T> {
    pub fn upgrade(&self) -> Option<EventSource<T>> {
        self.0.upgrade().map(|inner| EventSource { inner })
    }
}

impl<T: 'static> Clone for WeakSource<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: Clone + Send + Sync + 'static> EventStream<T> for EventSource<T> {
    fn source(&self) -> &EventSource<T> {
        self
    }
}
