use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, PoisonError,
};

use crate::{EventSource, Held, Listener, Observing};

///
/// Propagation interface shared by [EventSource] and its decorators ([Suppressable](crate::Suppressable),
/// [Batchable](crate::Batchable), [TracksAlive](crate::TracksAlive)).
///
/// Implementors only provide [source](EventStream::source); decorators additionally
/// override [fire](EventStream::fire) or [register_listener](EventStream::register_listener)
/// to change how events enter the stream.
///
/// Combinators return a new [EventSource] registered as a listener of ```self```. The derived
/// stream holds that listener and ```self``` strongly, so the chain stays alive exactly as long
/// as the derived stream is reachable. No [Observing] anchor is involved until
/// [foreach](EventStream::foreach) attaches a side effect.
///
/// An event always propagates through the whole downstream chain, depth-first, before
/// ```fire``` returns.
pub trait EventStream<T: Clone + Send + Sync + 'static>: Clone + Send + Sync + 'static {
    /// Underlying stream holding the listeners
    fn source(&self) -> &EventSource<T>;

    fn fire(&self, event: T) {
        self.source().notify(&event)
    }

    /// Register listener by reference identity. The stream keeps it weakly only.
    fn register_listener(&self, listener: &Listener<T>) {
        self.source().add_listener(listener)
    }

    /// Remove the most recently registered occurrence of `listener`. Returns false if it was
    /// not registered.
    fn unregister_listener(&self, listener: &Listener<T>) -> bool {
        self.source().remove_listener(listener)
    }

    /// Run `f` for every event for as long as `observing` is alive
    fn foreach(
        &self,
        observing: &Observing,
        f: impl Fn(&T) + Send + Sync + 'static,
    ) -> Listener<T> {
        let listener = Listener::new(f);
        self.register_listener(&listener);
        observing.retain(listener.clone());
        observing.retain(self.clone());
        listener
    }

    fn map<U, F>(&self, f: F) -> EventSource<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        derive(self, move |out, event| out.fire(f(event)))
    }

    fn filter<F>(&self, predicate: F) -> EventSource<T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        derive(self, move |out, event| {
            if predicate(event) {
                out.fire(event.clone())
            }
        })
    }

    /// Fires `f(e)` for the events where it returns ```Some```
    fn filter_map<U, F>(&self, f: F) -> EventSource<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(&T) -> Option<U> + Send + Sync + 'static,
    {
        derive(self, move |out, event| {
            if let Some(mapped) = f(event) {
                out.fire(mapped)
            }
        })
    }

    /// Forwards events while `predicate` holds. The first event failing it detaches the
    /// derived stream from ```self```; nothing is fired after that.
    fn take_while<F>(&self, predicate: F) -> EventSource<T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let out = EventSource::new();
        let slot: Arc<Mutex<Option<Listener<T>>>> = Arc::new(Mutex::new(None));
        let terminated = Arc::new(AtomicBool::new(false));
        let listener = {
            let weak_out = out.downgrade();
            let weak_slot = Arc::downgrade(&slot);
            let upstream = self.source().downgrade();
            Listener::new(move |event: &T| {
                if terminated.load(Ordering::Acquire) {
                    return;
                }
                if predicate(event) {
                    if let Some(out) = weak_out.upgrade() {
                        out.fire(event.clone())
                    }
                    return;
                }
                terminated.store(true, Ordering::Release);
                tracing::trace!(message = "event_stream.take_while.terminated");
                let own = weak_slot
                    .upgrade()
                    .and_then(|slot| slot.lock().unwrap_or_else(PoisonError::into_inner).take());
                if let (Some(own), Some(upstream)) = (own, upstream.upgrade()) {
                    upstream.remove_listener(&own);
                }
            })
        };
        self.register_listener(&listener);
        *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(listener);
        out.retain(slot);
        out.retain(self.clone());
        out
    }

    /// Fires the running accumulation `u := f(u, t)` for every event `t`, starting from `initial`
    fn fold_left<U, F>(&self, initial: U, f: F) -> EventSource<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(&U, &T) -> U + Send + Sync + 'static,
    {
        let acc = Mutex::new(initial);
        derive(self, move |out, event| {
            let next = {
                let mut acc = acc.lock().unwrap_or_else(PoisonError::into_inner);
                *acc = f(&acc, event);
                acc.clone()
            };
            out.fire(next)
        })
    }

    /// Fires whenever either stream fires. Events from the two sides are interleaved in the
    /// order the underlying streams actually fire; no other ordering is defined.
    fn union<S: EventStream<T>>(&self, other: &S) -> EventSource<T> {
        let out = EventSource::new();
        let forward = {
            let weak_out = out.downgrade();
            Listener::new(move |event: &T| {
                if let Some(out) = weak_out.upgrade() {
                    out.fire(event.clone())
                }
            })
        };
        self.register_listener(&forward);
        other.register_listener(&forward);
        out.retain(forward);
        out.retain(self.clone());
        out.retain(other.clone());
        out
    }

    /// Switches to the stream `f(t)` on every event `t` and forwards the events of the current
    /// inner stream only. With `initial`, the first inner stream is `f(initial)`; without it,
    /// nothing is forwarded until ```self``` fires.
    fn flat_map<U, S, F>(&self, initial: Option<T>, f: F) -> EventSource<U>
    where
        U: Clone + Send + Sync + 'static,
        S: EventStream<U>,
        F: Fn(&T) -> S + Send + Sync + 'static,
    {
        let out = EventSource::new();
        let forward = {
            let weak_out = out.downgrade();
            Listener::new(move |event: &U| {
                if let Some(out) = weak_out.upgrade() {
                    out.fire(event.clone())
                }
            })
        };
        let first = initial.as_ref().map(|t| {
            let inner = f(t);
            inner.register_listener(&forward);
            inner
        });
        let current = Arc::new(Mutex::new(first));
        let switch = {
            let current = current.clone();
            let forward = forward.clone();
            Listener::new(move |event: &T| {
                let previous = current
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take();
                if let Some(previous) = previous {
                    previous.unregister_listener(&forward);
                }
                let next = f(event);
                next.register_listener(&forward);
                *current.lock().unwrap_or_else(PoisonError::into_inner) = Some(next);
            })
        };
        self.register_listener(&switch);
        out.retain(forward);
        out.retain(switch);
        out.retain(current);
        out.retain(self.clone());
        out
    }

    /// Signal holding the last fired value. `init` supplies the value until the first event;
    /// it is evaluated at most once, on first access.
    fn hold(&self, init: impl FnOnce() -> T + Send + 'static) -> Held<T> {
        Held::new(self, init)
    }
}

/// New stream fed by a listener on `upstream`. The listener reaches the new stream through a
/// weak handle; the new stream owns the listener and `upstream`.
fn derive<T, U, S>(
    upstream: &S,
    on_event: impl Fn(&EventSource<U>, &T) + Send + Sync + 'static,
) -> EventSource<U>
where
    T: Clone + Send + Sync + 'static,
    U: Clone + Send + Sync + 'static,
    S: EventStream<T>,
{
    let out = EventSource::new();
    let listener = {
        let weak_out = out.downgrade();
        Listener::new(move |event: &T| {
            if let Some(out) = weak_out.upgrade() {
                on_event(&out, event)
            }
        })
    };
    upstream.register_listener(&listener);
    out.retain(listener);
    out.retain(upstream.clone());
    out
}
