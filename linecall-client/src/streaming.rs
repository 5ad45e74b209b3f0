//! Streaming result of server-stream and bidi-stream calls.
//!
//! # Cancellation
//!
//! Dropping a [`Streaming`] abandons the call: the response body is dropped,
//! which resets the HTTP/2 stream so the handler observes closure and stops
//! producing, and a running write activity is aborted. Nothing blocks.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use linecall_core::CallState;
use prost::Message;
use serde::de::DeserializeOwned;

use crate::ClientError;
use crate::frame::FrameDecoder;
use crate::state::SharedCallState;
use crate::writer::WriteHandle;

/// Lazy, finite, non-restartable sequence of replies.
///
/// Yields `Some(Ok(_))` per reply in send order, `None` at the normal end, and
/// at most one `Some(Err(_))` when the call fails.
///
/// ```ignore
/// let mut lines = client.fetch_lines().await?;
/// while let Some(line) = lines.next().await {
///     println!("{}", line?.line);
/// }
/// assert!(lines.call_state().is_finished());
/// ```
pub struct Streaming<T> {
    decoder: FrameDecoder<T>,
    state: SharedCallState,
    writer: Option<WriteHandle>,
    done: bool,
}

impl<T> Streaming<T> {
    pub(crate) fn new(
        decoder: FrameDecoder<T>,
        state: SharedCallState,
        writer: Option<WriteHandle>,
    ) -> Self {
        Self {
            decoder,
            state,
            writer,
            done: false,
        }
    }

    /// Snapshot of the call's direction states and outcome.
    ///
    /// Final once the stream has returned `None` or an error.
    pub fn call_state(&self) -> CallState {
        self.state.snapshot()
    }

    pub fn is_finished(&self) -> bool {
        self.done
    }

    fn fail(&mut self, err: ClientError) -> Poll<Option<Result<T, ClientError>>> {
        // a broken producer also breaks the response; report the cause
        let err = self
            .writer
            .as_mut()
            .and_then(WriteHandle::try_failure)
            .unwrap_or(err);
        self.state.fail();
        self.done = true;
        Poll::Ready(Some(Err(err)))
    }
}

impl<T> Streaming<T>
where
    T: Message + DeserializeOwned + Default,
{
    /// Consume the rest of the stream without processing it.
    ///
    /// Returns the number of replies drained.
    pub async fn drain(&mut self) -> usize {
        let mut count = 0;
        while let Some(result) = self.next().await {
            if result.is_ok() {
                count += 1;
            }
        }
        count
    }
}

impl<T> Stream for Streaming<T>
where
    T: Message + DeserializeOwned + Default,
{
    type Item = Result<T, ClientError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        match Pin::new(&mut this.decoder).poll_next(cx) {
            Poll::Ready(Some(Ok(message))) => match this.state.record_receive() {
                Ok(()) => Poll::Ready(Some(Ok(message))),
                Err(err) => this.fail(err),
            },
            Poll::Ready(Some(Err(err))) => this.fail(err),
            Poll::Ready(None) => match this.state.close_receive() {
                Ok(()) => {
                    this.done = true;
                    Poll::Ready(None)
                }
                Err(err) => this.fail(err),
            },
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> std::fmt::Debug for Streaming<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Streaming")
            .field("decoder", &self.decoder)
            .field("state", &self.state)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}
