//! Thread-local scope telling [queue] where commands accumulate.
//!
//! Each thread has at most one active scope. Entering a scope remembers the previous one
//! and restores it when the scope exits, normally or by panic.

use std::{
    any::{type_name, Any},
    cell::RefCell,
    sync::Arc,
};

use crate::{error::Result, Command, Reactions, ScopeError, SessionId};

thread_local! {
    static CURRENT: RefCell<Option<Box<dyn Any>>> = const { RefCell::new(None) };
}

pub(crate) enum Frame<C: Command> {
    /// Synchronous turn: commands are combined here and returned to the caller
    Client(C),
    /// Asynchronous turn: commands go to the session's channel or pending buffer
    Server {
        session: SessionId,
        reactions: Arc<Reactions<C>>,
    },
}

pub(crate) struct ScopeGuard {
    previous: Option<Box<dyn Any>>,
    restored: bool,
}

impl ScopeGuard {
    pub(crate) fn enter<C: Command>(frame: Frame<C>) -> Self {
        let previous = CURRENT.with(|current| current.replace(Some(Box::new(frame))));
        Self {
            previous,
            restored: false,
        }
    }

    /// Restore the previous scope and return the frame being left
    fn exit(mut self) -> Option<Box<dyn Any>> {
        self.restored = true;
        let previous = self.previous.take();
        CURRENT.with(|current| current.replace(previous))
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        if !self.restored {
            let previous = self.previous.take();
            CURRENT.with(|current| {
                current.replace(previous);
            });
        }
    }
}

/// Is any scope active on the current thread
pub fn in_scope() -> bool {
    CURRENT.with(|current| current.borrow().is_some())
}

/// Is a scope accumulating commands of type `C` active on the current thread
pub(crate) fn in_scope_of<C: Command>() -> bool {
    CURRENT.with(|current| {
        current
            .borrow()
            .as_ref()
            .is_some_and(|frame| frame.is::<Frame<C>>())
    })
}

/// Queue `command` in the scope active on the current thread.
///
/// In a client scope the command is combined into the scope's accumulator. In a server scope
/// it is combined with the session's pending commands and handed to the session's channel,
/// or buffered if the session has no live channel.
///
/// Fails with [ScopeError::NoScope] outside of any scope.
pub fn queue<C: Command>(command: C) -> Result<()> {
    let server = CURRENT.with(|current| {
        let mut current = current.borrow_mut();
        let frame = current.as_mut().ok_or(ScopeError::NoScope)?;
        let frame = frame
            .downcast_mut::<Frame<C>>()
            .ok_or(ScopeError::CommandTypeMismatch {
                queued: type_name::<C>(),
            })?;
        match frame {
            Frame::Client(accumulated) => {
                let previous = std::mem::take(accumulated);
                *accumulated = previous.combine(command);
                Ok(None)
            }
            Frame::Server { session, reactions } => {
                Ok(Some((session.clone(), reactions.clone(), command)))
            }
        }
    })?;
    if let Some((session, reactions, command)) = server {
        reactions.deliver(&session, command);
    }
    Ok(())
}

/// Run `f` in a new client scope and return the combination of the commands it queued
/// ```
/// use event_reactions::{in_client_scope, queue};
///
/// let commands: Vec<&str> = in_client_scope(|| {
///     queue(vec!["a"]).unwrap();
///     queue(vec!["b"]).unwrap();
/// });
/// assert_eq!(commands, vec!["a", "b"]);
/// ```
pub fn in_client_scope<C: Command>(f: impl FnOnce()) -> C {
    in_client_scope_returning(f).1
}

/// Like [in_client_scope], also returning the result of `f`
pub fn in_client_scope_returning<C: Command, R>(f: impl FnOnce() -> R) -> (R, C) {
    let guard = ScopeGuard::enter(Frame::<C>::Client(C::default()));
    let result = f();
    let accumulated = guard
        .exit()
        .and_then(|frame| frame.downcast::<Frame<C>>().ok())
        .map(|frame| match *frame {
            Frame::Client(accumulated) => accumulated,
            Frame::Server { .. } => C::default(),
        })
        .unwrap_or_default();
    (result, accumulated)
}
