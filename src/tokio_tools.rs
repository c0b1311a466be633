use std::future::Future;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Spawn a Tokio task inside a span carrying its name.
pub fn spawn_named_task<F, S>(name: S, future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
    S: Into<String>,
{
    let name_owned = name.into();
    let span = tracing::info_span!("task", task_name = %name_owned);
    tokio::spawn(future.instrument(span))
}

/// Like [`spawn_named_task`], but the task resolves to `None` as soon as
/// `stop` is cancelled.
pub fn spawn_cancellable<F, S>(
    name: S,
    stop: CancellationToken,
    future: F,
) -> JoinHandle<Option<F::Output>>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
    S: Into<String>,
{
    spawn_named_task(name, async move {
        tokio::select! {
            biased;
            _ = stop.cancelled() => None,
            output = future => Some(output),
        }
    })
}
