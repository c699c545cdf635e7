use std::{
    any::Any,
    sync::{Arc, Mutex, PoisonError},
};

/// Ownership anchor for observers registered with [foreach](crate::EventStream::foreach).
///
/// Event streams hold their listeners weakly. The anchor keeps strong references to
/// the listener closures (and to the streams they observe) so they live exactly as long
/// as the anchor does. When the last clone of ```Observing``` is dropped, the listeners
/// it retained silently stop firing.
#[derive(Clone, Default)]
pub struct Observing {
    retained: Arc<Mutex<Vec<Arc<dyn Any + Send + Sync>>>>,
}

impl Observing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `value` alive for the anchor's lifetime
    pub fn retain<V: Any + Send + Sync>(&self, value: V) {
        self.retain_arc(Arc::new(value))
    }

    pub(crate) fn retain_arc(&self, value: Arc<dyn Any + Send + Sync>) {
        self.retained
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(value);
    }

    /// Number of references held
    pub fn len(&self) -> usize {
        self.retained
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every held reference while keeping the anchor usable. Listeners retained
    /// only by this anchor stop firing.
    pub fn release(&self) {
        let released = std::mem::take(
            &mut *self.retained.lock().unwrap_or_else(PoisonError::into_inner),
        );
        drop(released);
    }
}

impl std::fmt::Debug for Observing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observing").field("retained", &self.len()).finish()
    }
}
