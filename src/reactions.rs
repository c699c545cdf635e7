use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
    time::Instant,
};

use crate::{
    scope::{self, Frame, ScopeGuard},
    Channel, Command, Outbound, PushChannel, ReactionsConfig, SessionId,
};

struct PendingEntry<C> {
    command: C,
    since: Instant,
}

struct Sessions<C: Command> {
    channels: HashMap<SessionId, Weak<dyn Channel<C>>>,
    pending: HashMap<SessionId, PendingEntry<C>>,
}

impl<C: Command> Sessions<C> {
    fn new() -> Self {
        Self {
            channels: HashMap::new(),
            pending: HashMap::new(),
        }
    }

    /// Registered channel if it is still reachable. A collected channel is forgotten.
    fn live_channel(&mut self, session: &SessionId) -> Option<Arc<dyn Channel<C>>> {
        let weak = self.channels.get(session)?;
        match weak.upgrade() {
            Some(channel) => Some(channel),
            None => {
                tracing::debug!(message = "reactions.channel_collected", session = %session);
                self.channels.remove(session);
                None
            }
        }
    }

    fn take_pending(&mut self, session: &SessionId) -> Option<C> {
        self.pending.remove(session).map(|entry| entry.command)
    }

    fn buffer(&mut self, session: &SessionId, command: C, config: &ReactionsConfig) {
        tracing::debug!(message = "reactions.buffered", session = %session);
        self.pending.insert(
            session.clone(),
            PendingEntry {
                command,
                since: Instant::now(),
            },
        );
        self.purge_expired(config);
        while self.pending.len() > config.max_pending_sessions {
            let oldest = self
                .pending
                .iter()
                .min_by_key(|(_, entry)| entry.since)
                .map(|(id, _)| id.clone());
            let Some(oldest) = oldest else { break };
            tracing::warn!(message = "reactions.pending_evicted", session = %oldest, reason = "capacity");
            self.pending.remove(&oldest);
        }
    }

    fn purge_expired(&mut self, config: &ReactionsConfig) -> usize {
        let Some(ttl) = config.pending_ttl else {
            return 0;
        };
        let before = self.pending.len();
        self.pending.retain(|session, entry| {
            let keep = entry.since.elapsed() < ttl;
            if !keep {
                tracing::warn!(message = "reactions.pending_evicted", session = %session, reason = "expired");
            }
            keep
        });
        before - self.pending.len()
    }
}

fn combine<C: Command>(older: Option<C>, newer: Option<C>) -> Option<C> {
    match (older, newer) {
        (Some(older), Some(newer)) => Some(older.combine(newer)),
        (older, newer) => older.or(newer),
    }
}

/// Registry of session channels and the entry point of server scopes.
///
/// One instance is created by the application at startup and shared (as ```Arc<Reactions<C>>```)
/// with everything that registers channels or opens server scopes. All registry state is
/// guarded by a single lock, so merges into the pending buffer are atomic.
///
/// ```
/// use std::sync::Arc;
/// use event_reactions::{queue, Reactions, SessionId};
///
/// let reactions: Arc<Reactions<Vec<&str>>> = Reactions::new();
/// let session = SessionId::new("s1");
///
/// // No channel yet: commands wait in the pending buffer
/// reactions.in_server_scope(&session, || queue(vec!["hello"]).unwrap());
/// assert_eq!(reactions.pending_len(), 1);
///
/// // Connecting delivers them
/// let (_channel, _outbound) = reactions.connect(session.clone());
/// assert_eq!(reactions.pending_len(), 0);
/// ```
pub struct Reactions<C: Command> {
    config: ReactionsConfig,
    sessions: Mutex<Sessions<C>>,
}

impl<C: Command> Reactions<C> {
    pub fn new() -> Arc<Self> {
        Self::with_config(ReactionsConfig::default())
    }

    pub fn with_config(config: ReactionsConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            sessions: Mutex::new(Sessions::new()),
        })
    }

    pub fn config(&self) -> &ReactionsConfig {
        &self.config
    }

    fn sessions(&self) -> MutexGuard<'_, Sessions<C>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` in a server scope for `session`: commands queued by `f` go to the session's
    /// channel, or to the pending buffer if it has none. After `f` returns, the previous
    /// scope is restored and the session's channel (if any) is flushed.
    pub fn in_server_scope<R>(self: &Arc<Self>, session: &SessionId, f: impl FnOnce() -> R) -> R {
        let guard = ScopeGuard::enter(Frame::Server {
            session: session.clone(),
            reactions: self.clone(),
        });
        let result = f();
        drop(guard);
        self.flush(session);
        result
    }

    /// Run `f` in the scope already active on this thread if it accumulates commands of type
    /// `C`, otherwise in a server scope for `session`
    pub fn in_any_scope<R>(self: &Arc<Self>, session: &SessionId, f: impl FnOnce() -> R) -> R {
        if scope::in_scope_of::<C>() {
            f()
        } else {
            self.in_server_scope(session, f)
        }
    }

    /// Make `channel` the live destination of `session`.
    ///
    /// Commands still queued in a previously registered channel are drained, followed by the
    /// session's pending commands; the combination is delivered to `channel` right away.
    pub fn register<CH: Channel<C> + 'static>(&self, session: SessionId, channel: &Arc<CH>) {
        let weak: Weak<CH> = Arc::downgrade(channel);
        let weak: Weak<dyn Channel<C>> = weak;
        let delivered = {
            let mut sessions = self.sessions();
            let drained = sessions
                .live_channel(&session)
                .filter(|previous| {
                    Arc::as_ptr(previous) as *const () != Arc::as_ptr(channel) as *const ()
                })
                .map(|previous| previous.drain());
            let pending = sessions.take_pending(&session);
            tracing::debug!(
                message = "reactions.register",
                session = %session,
                replaced = drained.is_some(),
                pending = pending.is_some()
            );
            sessions.channels.insert(session, weak);
            match combine(drained, pending).filter(|command| !command.is_noop()) {
                Some(command) => {
                    channel.enqueue(command);
                    true
                }
                None => false,
            }
        };
        if delivered {
            channel.flush();
        }
    }

    /// Create a [PushChannel] for `session` and register it
    pub fn connect(self: &Arc<Self>, session: SessionId) -> (Arc<PushChannel<C>>, Outbound<C>) {
        let (channel, outbound) = PushChannel::new(session.clone(), self);
        self.register(session, &channel);
        (channel, outbound)
    }

    /// Forget the channel of `session`. Its pending commands are kept.
    pub fn unregister(&self, session: &SessionId) {
        tracing::debug!(message = "reactions.unregister", session = %session);
        self.sessions().channels.remove(session);
    }

    /// Unregister `session` only if `channel` is still the one registered for it
    pub(crate) fn release(&self, session: &SessionId, channel: *const ()) {
        let mut sessions = self.sessions();
        let registered = sessions
            .channels
            .get(session)
            .is_some_and(|weak| weak.as_ptr() as *const () == channel);
        if registered {
            tracing::debug!(message = "reactions.unregister", session = %session, reason = "shutdown");
            sessions.channels.remove(session);
        }
    }

    pub fn is_connected(&self, session: &SessionId) -> bool {
        self.sessions().live_channel(session).is_some()
    }

    /// Number of sessions with buffered commands
    pub fn pending_len(&self) -> usize {
        self.sessions().pending.len()
    }

    /// Drop pending commands older than [ReactionsConfig::pending_ttl]. Returns the number
    /// of entries dropped.
    pub fn purge_expired(&self) -> usize {
        self.sessions().purge_expired(&self.config)
    }

    /// Queue `command` for `session`, merged after its pending commands
    pub(crate) fn deliver(&self, session: &SessionId, command: C) {
        let mut sessions = self.sessions();
        let command = match sessions.take_pending(session) {
            Some(pending) => pending.combine(command),
            None => command,
        };
        match sessions.live_channel(session) {
            Some(channel) => channel.enqueue(command),
            None => sessions.buffer(session, command, &self.config),
        }
    }

    /// Move pending commands of `session` to its channel and flush the channel
    pub(crate) fn flush(&self, session: &SessionId) {
        let channel = {
            let mut sessions = self.sessions();
            let Some(channel) = sessions.live_channel(session) else {
                return;
            };
            if let Some(pending) = sessions.take_pending(session) {
                channel.enqueue(pending);
            }
            channel
        };
        channel.flush();
    }
}

impl<C: Command> std::fmt::Debug for Reactions<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sessions = self.sessions();
        f.debug_struct("Reactions")
            .field("config", &self.config)
            .field("channels", &sessions.channels.len())
            .field("pending", &sessions.pending.len())
            .finish()
    }
}
