use std::time::Duration;

/// Limits of the pending buffer of [Reactions](crate::Reactions): commands queued for
/// sessions which have no live channel.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ReactionsConfig {
    /// Pending commands older than this are dropped. ```None``` keeps them until the session connects.
    pub pending_ttl: Option<Duration>,
    /// Maximum number of sessions with pending commands. The oldest entry is evicted first.
    pub max_pending_sessions: usize,
}

impl ReactionsConfig {
    pub const DEFAULT_PENDING_TTL: Duration = Duration::from_secs(600);
    pub const DEFAULT_MAX_PENDING_SESSIONS: usize = 1024;

    #[must_use]
    pub fn with_pending_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.pending_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_max_pending_sessions(mut self, max: usize) -> Self {
        self.max_pending_sessions = max;
        self
    }
}

impl Default for ReactionsConfig {
    fn default() -> Self {
        Self {
            pending_ttl: Some(Self::DEFAULT_PENDING_TTL),
            max_pending_sessions: Self::DEFAULT_MAX_PENDING_SESSIONS,
        }
    }
}
