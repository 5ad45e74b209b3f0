//! Request bodies handed to the HTTP/2 transport.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};
use pin_project_lite::pin_project;
use tokio::sync::mpsc;

use crate::ClientError;

/// Items the write activity queues for the transport. An `Err` resets the
/// HTTP/2 stream instead of ending it cleanly.
pub(crate) type Outgoing = Result<Bytes, ClientError>;

pin_project! {
    /// The request direction of one call.
    ///
    /// `Full` carries a direction known up front: the one request of a unary
    /// or server-stream call. `Channel` is fed by the write activity of a
    /// client-stream or bidi-stream call and ends once the writer drops its
    /// sender.
    #[project = TransportBodyProj]
    pub enum TransportBody {
        Full {
            data: Option<Bytes>,
        },
        Channel {
            rx: mpsc::Receiver<Outgoing>,
            drained: bool,
        },
    }
}

impl TransportBody {
    pub fn full(data: Bytes) -> Self {
        TransportBody::Full { data: Some(data) }
    }

    pub(crate) fn channel(rx: mpsc::Receiver<Outgoing>) -> Self {
        TransportBody::Channel { rx, drained: false }
    }
}

impl Body for TransportBody {
    type Data = Bytes;
    type Error = ClientError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match self.project() {
            TransportBodyProj::Full { data } => Poll::Ready(data.take().map(|d| Ok(Frame::data(d)))),
            TransportBodyProj::Channel { rx, drained } => {
                if *drained {
                    return Poll::Ready(None);
                }
                match rx.poll_recv(cx) {
                    Poll::Ready(Some(item)) => Poll::Ready(Some(item.map(Frame::data))),
                    Poll::Ready(None) => {
                        *drained = true;
                        Poll::Ready(None)
                    }
                    Poll::Pending => Poll::Pending,
                }
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            TransportBody::Full { data } => data.is_none(),
            TransportBody::Channel { drained, .. } => *drained,
        }
    }

    fn size_hint(&self) -> SizeHint {
        match self {
            TransportBody::Full { data } => {
                SizeHint::with_exact(data.as_ref().map_or(0, |d| d.len() as u64))
            }
            TransportBody::Channel { .. } => SizeHint::default(),
        }
    }
}

impl std::fmt::Debug for TransportBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportBody::Full { data } => f
                .debug_struct("TransportBody::Full")
                .field("len", &data.as_ref().map(|d| d.len()))
                .finish(),
            TransportBody::Channel { drained, .. } => f
                .debug_struct("TransportBody::Channel")
                .field("drained", drained)
                .finish(),
        }
    }
}
