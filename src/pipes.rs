use async_std::stream::StreamExt;
use async_trait::async_trait;
use futures::{
    future::RemoteHandle,
    task::{Spawn, SpawnError, SpawnExt},
};

use crate::{Command, Outbound};

///
/// Transport side of a [PushChannel](crate::PushChannel): moves flushed commands to the remote consumer.
///
/// ```
/// # use async_trait::async_trait;
/// # use event_reactions::CommandSink;
/// struct Printer;
///
/// #[async_trait]
/// impl CommandSink<String> for Printer {
///     type Error = std::io::Error;
///     async fn deliver(&self, command: String) -> Result<(), Self::Error> {
///         println!("{command}");
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait CommandSink<C: Command> {
    type Error;
    async fn deliver(&self, command: C) -> Result<(), Self::Error>;
}

/// Connect [Outbound] to [CommandSink]: run asynchronous task which reads flushed commands and
/// calls [CommandSink::deliver] for each of them, in order. The task ends when the channel is
/// gone or when the sink fails; the failure is passed to `error_handler`.
pub fn spawn_delivery<
    C: Command,
    E: Send + 'static,
    SPAWNER: Spawn,
    SINK: CommandSink<C, Error = E> + Send + Sync + 'static,
>(
    spawner: &SPAWNER,
    outbound: Outbound<C>,
    sink: SINK,
    error_handler: impl FnOnce(E) + Send + 'static,
) -> Result<(), SpawnError> {
    spawner.spawn(deliver_all(outbound, sink, error_handler))
}

/// Same as [spawn_delivery], but also returns handle to task spawned by [futures::task::SpawnExt::spawn_with_handle]
pub fn spawn_delivery_with_handle<
    C: Command,
    E: Send + 'static,
    SPAWNER: Spawn,
    SINK: CommandSink<C, Error = E> + Send + Sync + 'static,
>(
    spawner: &SPAWNER,
    outbound: Outbound<C>,
    sink: SINK,
    error_handler: impl FnOnce(E) + Send + 'static,
) -> Result<RemoteHandle<()>, SpawnError> {
    spawner.spawn_with_handle(deliver_all(outbound, sink, error_handler))
}

async fn deliver_all<C: Command, E, SINK: CommandSink<C, Error = E>>(
    mut outbound: Outbound<C>,
    sink: SINK,
    error_handler: impl FnOnce(E),
) {
    let delivered = async {
        while let Some(command) = outbound.next().await {
            sink.deliver(command).await?;
        }
        Result::<(), E>::Ok(())
    };
    if let Err(e) = delivered.await {
        tracing::debug!(message = "pipes.delivery_failed");
        error_handler(e)
    }
}
