use std::{
    collections::VecDeque,
    pin::Pin,
    sync::{Arc, Mutex, PoisonError, Weak},
    task::{Context, Poll, Waker},
};

use futures::Stream;

use crate::{Command, Reactions, SessionId};

/// Destination of the commands queued for one session. Implemented by the transport; the
/// registry only keeps channels weakly, so the transport owns their lifetime.
///
/// A channel is a single-consumer mailbox: commands given to it are processed one at a
/// time, in the order they arrived.
pub trait Channel<C: Command>: Send + Sync {
    /// Append `command` to the commands waiting for the next [flush](Channel::flush)
    fn enqueue(&self, command: C);
    /// Deliver everything enqueued so far and reset to the identity command
    fn flush(&self);
    /// Remove and return everything enqueued so far without delivering it
    fn drain(&self) -> C;
    /// Stop the channel; its session is unregistered
    fn shutdown(&self);
}

pub(crate) struct CommandQueue<C> {
    detached: bool,
    waker: Option<Waker>,
    commands: VecDeque<C>,
}

impl<C> CommandQueue<C> {
    fn new() -> Self {
        Self {
            detached: false,
            waker: None,
            commands: VecDeque::new(),
        }
    }
    fn is_detached(&self) -> bool {
        self.detached
    }
    fn detach(&mut self) {
        self.detached = true;
        self.wake();
    }
    fn wake(&mut self) {
        if let Some(waker) = self.waker.take() {
            waker.wake()
        }
    }
    fn set_waker(&mut self, waker: Waker) {
        self.waker = Some(waker)
    }
    fn put_command(&mut self, command: C) {
        self.commands.push_back(command);
        self.wake();
    }
    fn get_command(&mut self) -> Option<C> {
        self.commands.pop_front()
    }
}

impl<C> Drop for CommandQueue<C> {
    fn drop(&mut self) {
        self.wake()
    }
}

/// In-process [Channel]: flushed commands go to an [Outbound] stream read by the transport.
///
/// Created by [Reactions::connect] (or [PushChannel::new] followed by [Reactions::register]).
/// Dropping the channel ends the outbound stream once it is drained.
pub struct PushChannel<C: Command> {
    session: SessionId,
    queued: Mutex<C>,
    outbound: Arc<Mutex<CommandQueue<C>>>,
    reactions: Weak<Reactions<C>>,
}

impl<C: Command> PushChannel<C> {
    pub fn new(session: SessionId, reactions: &Arc<Reactions<C>>) -> (Arc<Self>, Outbound<C>) {
        let outbound = Arc::new(Mutex::new(CommandQueue::new()));
        let channel = Arc::new(Self {
            session,
            queued: Mutex::new(C::default()),
            outbound: outbound.clone(),
            reactions: Arc::downgrade(reactions),
        });
        (channel, Outbound { queue: outbound })
    }
    pub fn session(&self) -> &SessionId {
        &self.session
    }
    fn take_queued(&self) -> C {
        std::mem::take(&mut *self.queued.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl<C: Command> Channel<C> for PushChannel<C> {
    fn enqueue(&self, command: C) {
        let mut queued = self.queued.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = std::mem::take(&mut *queued);
        *queued = previous.combine(command);
    }
    fn flush(&self) {
        let mut outbound = self.outbound.lock().unwrap_or_else(PoisonError::into_inner);
        let command = self.take_queued();
        if !command.is_noop() && !outbound.is_detached() {
            outbound.put_command(command);
        }
    }
    fn drain(&self) -> C {
        self.take_queued()
    }
    fn shutdown(&self) {
        self.outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .detach();
        if let Some(reactions) = self.reactions.upgrade() {
            reactions.release(&self.session, self as *const Self as *const ());
        }
    }
}

impl<C: Command> Drop for PushChannel<C> {
    fn drop(&mut self) {
        self.outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .detach();
    }
}

/// Consumer end of a [PushChannel]: a stream of flushed commands. ```next()``` returns
/// ```None``` after the channel is shut down or dropped and every flushed command was read.
pub struct Outbound<C> {
    queue: Arc<Mutex<CommandQueue<C>>>,
}

impl<C> Outbound<C> {
    fn poll_next(&mut self, cx: &mut Context<'_>) -> Poll<Option<C>> {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(command) = queue.get_command() {
            Poll::Ready(Some(command))
        } else if queue.is_detached() {
            Poll::Ready(None)
        } else {
            queue.set_waker(cx.waker().clone());
            Poll::Pending
        }
    }
}

impl<C> Stream for Outbound<C> {
    type Item = C;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().poll_next(cx)
    }
}
