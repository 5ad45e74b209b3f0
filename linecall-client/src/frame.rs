//! Envelope framing for the client.
//!
//! [`FrameDecoder`] turns a response body into typed messages.
//! [`FrameEncoder`] turns request messages into envelopes.

use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures::Stream;
use linecall_core::{Codec, EndStream, Frame, FrameReader, wrap_envelope};
use prost::Message;
use serde::{Serialize, de::DeserializeOwned};

use crate::ClientError;

/// Response body as a byte stream.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ClientError>> + Send>>;

/// Decodes enveloped messages from a streaming response body.
///
/// Yields `Ok` per message and ends with `None` on a success EndStream frame.
/// An error EndStream frame yields one `Err` with the handler's status. A body
/// that ends without EndStream is a protocol error.
pub struct FrameDecoder<T> {
    body: ByteStream,
    reader: FrameReader,
    codec: Codec,
    finished: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T> FrameDecoder<T> {
    pub fn new(body: ByteStream, codec: Codec) -> Self {
        Self {
            body,
            reader: FrameReader::default(),
            codec,
            finished: false,
            _marker: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for FrameDecoder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameDecoder")
            .field("codec", &self.codec)
            .field("buffered", &self.reader.buffered())
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl<T> Stream for FrameDecoder<T>
where
    T: Message + DeserializeOwned + Default,
{
    type Item = Result<T, ClientError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if this.finished {
                return Poll::Ready(None);
            }

            match this.reader.next_frame() {
                Ok(Some(Frame::Message(payload))) => {
                    let result = this.codec.decode::<T>(&payload).map_err(ClientError::from);
                    if result.is_err() {
                        this.finished = true;
                    }
                    return Poll::Ready(Some(result));
                }
                Ok(Some(Frame::EndStream(end))) => {
                    this.finished = true;
                    return match end.into_result() {
                        Ok(()) => Poll::Ready(None),
                        Err(status) => Poll::Ready(Some(Err(ClientError::Status(status)))),
                    };
                }
                Ok(None) => {}
                Err(e) => {
                    this.finished = true;
                    return Poll::Ready(Some(Err(e.into())));
                }
            }

            match this.body.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => this.reader.push(&chunk),
                Poll::Ready(Some(Err(e))) => {
                    this.finished = true;
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(None) => {
                    this.finished = true;
                    let err = match this.reader.finish() {
                        Err(e) => e.into(),
                        Ok(()) => ClientError::Protocol("stream ended without EndStream frame".into()),
                    };
                    return Poll::Ready(Some(Err(err)));
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Encodes request messages as envelopes.
#[derive(Clone, Copy, Debug)]
pub struct FrameEncoder {
    codec: Codec,
}

impl FrameEncoder {
    pub fn new(codec: Codec) -> Self {
        Self { codec }
    }

    /// One message envelope.
    pub fn message<T>(&self, message: &T) -> Result<Bytes, ClientError>
    where
        T: Message + Serialize,
    {
        let payload = self.codec.encode(message)?;
        Ok(wrap_envelope(&payload))
    }

    /// The end-of-input signal.
    pub fn end_stream(&self) -> Bytes {
        EndStream::ok().to_frame()
    }

    /// A complete request direction carrying one message.
    pub fn single<T>(&self, message: &T) -> Result<Bytes, ClientError>
    where
        T: Message + Serialize,
    {
        let mut body = BytesMut::new();
        body.extend_from_slice(&self.message(message)?);
        body.extend_from_slice(&self.end_stream());
        Ok(body.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use linecall_core::{Code, Status, TextLine};

    fn body(chunks: Vec<Bytes>) -> ByteStream {
        Box::pin(futures::stream::iter(chunks.into_iter().map(Ok)))
    }

    fn encoded(lines: &[&str]) -> Vec<u8> {
        let encoder = FrameEncoder::new(Codec::Proto);
        let mut bytes = Vec::new();
        for line in lines {
            bytes.extend_from_slice(&encoder.message(&TextLine::new(*line)).unwrap());
        }
        bytes
    }

    #[tokio::test]
    async fn test_decodes_until_end_stream() {
        let mut bytes = encoded(&["one", "two"]);
        bytes.extend_from_slice(&EndStream::ok().to_frame());

        // split in the middle of a header
        let (a, b) = bytes.split_at(3);
        let decoder = FrameDecoder::<TextLine>::new(
            body(vec![Bytes::copy_from_slice(a), Bytes::copy_from_slice(b)]),
            Codec::Proto,
        );
        let lines: Vec<String> = decoder.map(|r| r.unwrap().line).collect().await;
        assert_eq!(lines, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_end_stream_error_is_status() {
        let mut bytes = encoded(&["one"]);
        bytes.extend_from_slice(&EndStream::failed(Status::internal("boom")).to_frame());

        let mut decoder =
            FrameDecoder::<TextLine>::new(body(vec![Bytes::from(bytes)]), Codec::Proto);
        assert_eq!(decoder.next().await.unwrap().unwrap().line, "one");
        let err = decoder.next().await.unwrap().unwrap_err();
        assert_eq!(err.code(), Code::Internal);
        assert_eq!(err.message(), Some("boom"));
        assert!(decoder.next().await.is_none());
    }

    #[tokio::test]
    async fn test_missing_end_stream_is_protocol_error() {
        let decoder = FrameDecoder::<TextLine>::new(
            body(vec![Bytes::from(encoded(&["one"]))]),
            Codec::Proto,
        );
        let results: Vec<_> = decoder.collect().await;
        assert_eq!(results.len(), 2);
        assert!(matches!(results[1], Err(ClientError::Protocol(_))));
    }

    #[test]
    fn test_single_ends_with_end_stream() {
        let bytes = FrameEncoder::new(Codec::Json)
            .single(&TextLine::new("x"))
            .unwrap();
        let mut reader = FrameReader::default();
        reader.push(&bytes);
        assert!(matches!(reader.next_frame().unwrap(), Some(Frame::Message(_))));
        assert_eq!(
            reader.next_frame().unwrap(),
            Some(Frame::EndStream(EndStream::ok()))
        );
        assert_eq!(reader.next_frame().unwrap(), None);
    }
}
