use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::{EventSource, EventStream, Held, Listener};

/// Event stream which knows whether anyone ever listened to it.
///
/// [alive](TracksAlive::alive) turns true on the first listener registration and never
/// turns back. Producers can watch it to start expensive work only once there is a consumer:
/// ```
/// # use event_reactions::{EventStream, Observing, Signal, TracksAlive};
/// let ticks = TracksAlive::<u32>::new();
/// assert!(!ticks.alive().now());
///
/// let observing = Observing::new();
/// ticks.foreach(&observing, |_| {});
/// assert!(ticks.alive().now());
/// ```
pub struct TracksAlive<T: 'static> {
    source: EventSource<T>,
    activated: Arc<AtomicBool>,
    trigger: EventSource<bool>,
    alive: Held<bool>,
}

impl<T: 'static> Clone for TracksAlive<T> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            activated: self.activated.clone(),
            trigger: self.trigger.clone(),
            alive: self.alive.clone(),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Default for TracksAlive<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> TracksAlive<T> {
    pub fn new() -> Self {
        let trigger = EventSource::new();
        let alive = trigger.hold(|| false);
        Self {
            source: EventSource::new(),
            activated: Arc::new(AtomicBool::new(false)),
            trigger,
            alive,
        }
    }
    pub fn alive(&self) -> Held<bool> {
        self.alive.clone()
    }
}

impl<T: Clone + Send + Sync + 'static> EventStream<T> for TracksAlive<T> {
    fn source(&self) -> &EventSource<T> {
        &self.source
    }
    fn register_listener(&self, listener: &Listener<T>) {
        self.source.add_listener(listener);
        if !self.activated.swap(true, Ordering::AcqRel) {
            tracing::trace!(message = "tracks_alive.activated");
            self.trigger.fire(true);
        }
    }
}
