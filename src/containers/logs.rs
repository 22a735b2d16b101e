// ABOUTME: Background pump that forwards a container's log stream into an Output.
// ABOUTME: Lifetime is bounded by finish(), which drains briefly and then signals stop.

use crate::output::Output;
use crate::runtime::LogLineStream;
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// How long `finish` lets the stream drain on its own before stopping it.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// A running log forwarder.
///
/// Dropping the pump without calling [`LogPump::finish`] aborts the task.
pub struct LogPump {
    stop: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl LogPump {
    pub fn spawn(mut stream: LogLineStream, out: Output) -> Self {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    next = stream.next() => match next {
                        Some(Ok(line)) => out.raw(line.content.as_bytes()),
                        Some(Err(e)) => {
                            tracing::debug!("log stream ended with error: {e}");
                            break;
                        }
                        None => break,
                    },
                }
            }
        });

        Self {
            stop: Some(stop_tx),
            handle,
        }
    }

    /// Wait for the stream to end, stopping it if it outlives the drain grace.
    pub async fn finish(mut self) {
        if tokio::time::timeout(DRAIN_GRACE, &mut self.handle)
            .await
            .is_ok()
        {
            return;
        }

        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Err(e) = (&mut self.handle).await {
            tracing::debug!("log pump task failed: {e}");
        }
    }
}

impl Drop for LogPump {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::SharedBuffer;
    use crate::runtime::{LogLine, LogStream};

    fn line(content: &str) -> Result<LogLine, crate::runtime::LogError> {
        Ok(LogLine {
            content: content.to_string(),
            stream: LogStream::Stdout,
        })
    }

    #[tokio::test]
    async fn forwards_every_chunk_until_stream_ends() {
        let buffer = SharedBuffer::new();
        let out = Output::new().with_writer(buffer.clone());
        let stream = futures::stream::iter(vec![line("step 1\n"), line("step 2\n")]);

        LogPump::spawn(Box::pin(stream), out).finish().await;

        assert_eq!(buffer.contents(), "step 1\nstep 2\n");
    }

    #[tokio::test]
    async fn finish_stops_a_stream_that_never_ends() {
        let buffer = SharedBuffer::new();
        let out = Output::new().with_writer(buffer.clone());
        let stream = futures::stream::iter(vec![line("hello\n")]).chain(futures::stream::pending());

        let started = std::time::Instant::now();
        LogPump::spawn(Box::pin(stream), out).finish().await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(buffer.contents(), "hello\n");
    }
}
