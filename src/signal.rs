use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use crate::{EventSource, EventStream, Listener};

/// Time-varying value: the current value plus the stream of its changes.
/// ```change``` fires after ```now``` already returns the new value.
pub trait Signal<T: Clone + Send + Sync + 'static>: Clone + Send + Sync + 'static {
    fn now(&self) -> T;
    fn change(&self) -> EventSource<T>;

    /// Derived signal whose value is always `f(self.now())`
    fn map<U, F>(&self, f: F) -> Held<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        let parent = self.clone();
        let changes = {
            let f = f.clone();
            self.change().map(move |t| (*f)(t))
        };
        changes.hold(move || (*f)(&parent.now()))
    }
}

type Init<T> = Box<dyn FnOnce() -> T + Send>;

struct HeldInner<T: 'static> {
    latest: Mutex<Option<T>>,
    init: Mutex<Option<Init<T>>>,
    change: EventSource<T>,
    listener: Listener<T>,
}

/// Signal created by [hold](EventStream::hold): the last value fired by its stream,
/// or the lazily computed initial value if the stream has not fired yet.
///
/// The held stream is kept alive by the signal.
pub struct Held<T: 'static> {
    inner: Arc<HeldInner<T>>,
    _upstream: Arc<dyn std::any::Any + Send + Sync>,
}

impl<T: 'static> Clone for Held<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            _upstream: self._upstream.clone(),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Held<T> {
    fn latest(&self) -> Option<T> {
        self.inner
            .latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn new<S: EventStream<T>>(
        upstream: &S,
        init: impl FnOnce() -> T + Send + 'static,
    ) -> Self {
        let inner = Arc::new_cyclic(|weak: &Weak<HeldInner<T>>| {
            let weak = weak.clone();
            HeldInner {
                latest: Mutex::new(None),
                init: Mutex::new(Some(Box::new(init))),
                change: EventSource::new(),
                listener: Listener::new(move |event: &T| {
                    if let Some(inner) = weak.upgrade() {
                        *inner.latest.lock().unwrap_or_else(PoisonError::into_inner) =
                            Some(event.clone());
                        inner.change.fire(event.clone());
                    }
                }),
            }
        });
        upstream.register_listener(&inner.listener);
        Self {
            inner,
            _upstream: Arc::new(upstream.clone()),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Signal<T> for Held<T> {
    /// # Panics
    ///
    /// If the initializer panicked on an earlier call.
    fn now(&self) -> T {
        if let Some(value) = self.latest() {
            return value;
        }
        // only `latest` is locked by the held stream, so the initializer may fire it
        let mut slot = self
            .inner
            .init
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(value) = self.latest() {
            return value;
        }
        let Some(init) = slot.take() else {
            panic!("initial value of held signal is unavailable: its initializer panicked")
        };
        let value = init();
        self.inner
            .latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_or_insert(value)
            .clone()
    }

    /// The returned stream keeps this signal alive
    fn change(&self) -> EventSource<T> {
        let change = self.inner.change.map(T::clone);
        change.retain(self.clone());
        change
    }
}

impl<T: Clone + Send + Sync + std::fmt::Debug + 'static> std::fmt::Debug for Held<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Held").field("now", &self.now()).finish()
    }
}

/// Settable signal
pub struct Var<T: 'static> {
    inner: Arc<VarInner<T>>,
}

struct VarInner<T: 'static> {
    value: RwLock<T>,
    change: EventSource<T>,
}

impl<T: 'static> Clone for Var<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Var<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(VarInner {
                value: RwLock::new(value),
                change: EventSource::new(),
            }),
        }
    }
    /// Store `value` and fire it on [change](Signal::change)
    pub fn set(&self, value: T) {
        *self
            .inner
            .value
            .write()
            .unwrap_or_else(PoisonError::into_inner) = value.clone();
        self.inner.change.fire(value)
    }
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let next = f(&self
            .inner
            .value
            .read()
            .unwrap_or_else(PoisonError::into_inner));
        self.set(next)
    }
}

impl<T: Clone + Send + Sync + 'static> Signal<T> for Var<T> {
    fn now(&self) -> T {
        self.inner
            .value
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
    fn change(&self) -> EventSource<T> {
        self.inner.change.clone()
    }
}

impl<T: Clone + Send + Sync + std::fmt::Debug + 'static> std::fmt::Debug for Var<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Var").field("now", &self.now()).finish()
    }
}
