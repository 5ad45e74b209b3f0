//! The write activity of client-stream and bidi-stream calls.
//!
//! A spawned task drains the caller's producer into a bounded channel that
//! backs the HTTP/2 request body. The channel bound is the send-side
//! backpressure: the task suspends once that many envelopes wait for the
//! transport. After the producer ends the task sends the EndStream envelope;
//! if the producer fails it reports the failure and resets the request body.

use futures::{Stream, StreamExt};
use prost::Message;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::ClientError;
use crate::frame::FrameEncoder;
use crate::state::SharedCallState;
use crate::transport::{Outgoing, TransportBody};

/// Handle on a running write activity.
#[derive(Debug)]
pub(crate) struct WriteHandle {
    task: JoinHandle<()>,
    failed: oneshot::Receiver<ClientError>,
}

impl WriteHandle {
    /// Resolves with the write failure, if there is one. Pends forever once the
    /// activity finished cleanly.
    pub(crate) async fn failure(&mut self) -> ClientError {
        match (&mut self.failed).await {
            Ok(err) => err,
            Err(_) => std::future::pending().await,
        }
    }

    /// The write failure, if it has already happened.
    pub(crate) fn try_failure(&mut self) -> Option<ClientError> {
        self.failed.try_recv().ok()
    }
}

impl Drop for WriteHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub(crate) fn spawn_writer<Req, P, E>(
    producer: P,
    encoder: FrameEncoder,
    state: SharedCallState,
    depth: usize,
) -> (TransportBody, WriteHandle)
where
    Req: Message + Serialize + Send + 'static,
    P: Stream<Item = Result<Req, E>> + Send + 'static,
    E: std::error::Error + Send + 'static,
{
    let (tx, rx) = mpsc::channel(depth.max(1));
    let (failed_tx, failed) = oneshot::channel();

    let task = tokio::spawn(async move {
        if let Err(err) = write_all(producer, encoder, &state, &tx).await {
            state.fail();
            // the reader learns the cause first, then the transport resets
            let _ = failed_tx.send(err.clone());
            let _ = tx.send(Err(err)).await;
        }
    });

    (
        TransportBody::channel(rx),
        WriteHandle { task, failed },
    )
}

async fn write_all<Req, P, E>(
    producer: P,
    encoder: FrameEncoder,
    state: &SharedCallState,
    tx: &mpsc::Sender<Outgoing>,
) -> Result<(), ClientError>
where
    Req: Message + Serialize,
    P: Stream<Item = Result<Req, E>>,
    E: std::error::Error,
{
    let mut producer = std::pin::pin!(producer);

    while let Some(item) = producer.next().await {
        let message = item.map_err(|e| ClientError::Producer(e.to_string()))?;
        let envelope = encoder.message(&message)?;
        state.record_send()?;
        if tx.send(Ok(envelope)).await.is_err() {
            // body dropped: the call already ended
            return Ok(());
        }
    }

    state.finish_send()?;
    let _ = tx.send(Ok(encoder.end_stream())).await;
    Ok(())
}
