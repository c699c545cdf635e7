/// Outgoing side-effect accumulated by a scope and delivered to a destination.
///
/// `combine` must be associative and [Default] must be its identity ("no effect"):
/// ```a.combine(b)``` performs `a`'s effect, then `b`'s.
pub trait Command: Default + Send + 'static {
    fn combine(self, other: Self) -> Self;

    /// Returns true if delivering this command would have no effect. Used to skip
    /// empty deliveries; returning `false` is always correct.
    fn is_noop(&self) -> bool {
        false
    }
}

impl<T: Send + 'static> Command for Vec<T> {
    fn combine(mut self, mut other: Self) -> Self {
        self.append(&mut other);
        self
    }
    fn is_noop(&self) -> bool {
        self.is_empty()
    }
}

impl Command for String {
    fn combine(mut self, other: Self) -> Self {
        self.push_str(&other);
        self
    }
    fn is_noop(&self) -> bool {
        self.is_empty()
    }
}

impl Command for () {
    fn combine(self, _: Self) -> Self {}
    fn is_noop(&self) -> bool {
        true
    }
}
