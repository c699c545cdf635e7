//!
//! Library of weakly-owned event streams and signals, paired with scoped accumulation of
//! outgoing side-effect commands
//!
//! # Usage sample
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use event_reactions::{in_client_scope, queue, EventSource, EventStream, Observing, Signal};
//!
//! let clicks = EventSource::<u32>::new();
//! let total = clicks.fold_left(0, |sum, n| sum + n).hold(|| 0);
//!
//! // The observer lives as long as `observing`
//! let observing = Observing::new();
//! clicks
//!     .filter(|n| n % 2 == 0)
//!     .foreach(&observing, |n| queue(vec![format!("even {n}")]).unwrap());
//!
//! let commands: Vec<String> = in_client_scope(|| {
//!     clicks.fire(1);
//!     clicks.fire(2);
//!     clicks.fire(4);
//! });
//! assert_eq!(commands, vec!["even 2", "even 4"]);
//! assert_eq!(total.now(), 7);
//!
//! drop(observing);
//! let commands: Vec<String> = in_client_scope(|| clicks.fire(6));
//! assert!(commands.is_empty());
//! ```
//!
//! # Listener lifetime
//!
//! An [EventSource] holds its listeners weakly. A listener keeps firing only while something
//! holds it strongly: an [Observing] anchor for side-effecting observers registered with
//! [foreach](EventStream::foreach), or the derived stream for listeners created by combinators
//! ([map](EventStream::map), [filter](EventStream::filter), ...). A derived stream keeps its
//! upstream alive, so holding the last stream of a chain keeps the whole chain working. Dropping
//! the anchor silently stops its listeners; there is no explicit unsubscribe token.
//!
//! # Scopes
//!
//! Code reacting to events may need to emit commands for a remote consumer without knowing
//! where they end up. It calls [queue]; the command accumulates in the scope active on the
//! current thread:
//!
//! - a client scope ([in_client_scope]) combines commands and returns them to its caller,
//!   e.g. as the response to a synchronous request;
//! - a server scope ([Reactions::in_server_scope]) sends them to the session's [Channel],
//!   buffering them while the session has no live channel.
//!
//! [Reactions::in_any_scope] reuses the scope already active on the thread, so the same code
//! works inside a request handler and in background logic. Calling [queue] outside of any
//! scope fails with [ScopeError::NoScope].
//!
//! Scopes are per thread: unrelated turns running on different threads do not see each
//! other's commands. A single stream instance is not meant to be fired from several threads
//! at once.
//!

mod batchable;
mod channel;
mod command;
mod config;
mod error;
mod event_source;
mod event_stream;
mod observing;
mod pipes;
mod reactions;
mod scope;
mod seq_delta;
mod session;
mod signal;
mod suppressable;
mod tracks_alive;

pub use batchable::Batchable;
pub use channel::{Channel, Outbound, PushChannel};
pub use command::Command;
pub use config::ReactionsConfig;
pub use error::{Result, ScopeError};
pub use event_source::{EventSource, Listener};
pub use event_stream::EventStream;
pub use observing::Observing;
pub use pipes::{spawn_delivery, spawn_delivery_with_handle, CommandSink};
pub use reactions::Reactions;
pub use scope::{in_client_scope, in_client_scope_returning, in_scope, queue};
pub use seq_delta::SeqDelta;
pub use session::SessionId;
pub use signal::{Held, Signal, Var};
pub use suppressable::Suppressable;
pub use tracks_alive::TracksAlive;
