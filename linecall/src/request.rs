//! Extractors for incoming calls.
//!
//! - [`UnaryRequest<T>`]: a bare message body (`application/proto`, `application/json`)
//! - [`StreamingRequest<T>`]: an enveloped message stream
//!   (`application/connect+proto`, `application/connect+json`)
//!
//! Both detect the codec from the content type so the response can answer in
//! kind.

use std::pin::Pin;
use std::task::{Context, Poll};

use axum::{
    body::Body,
    extract::{FromRequest, Request},
    http::header,
    response::{IntoResponse, Response},
};
use futures::{Stream, StreamExt};
use linecall_core::{
    Codec, DEFAULT_MAX_FRAME_SIZE, Frame, FrameReader, Framing, PatternKind, SequenceError,
};
use prost::Message;
use serde::de::DeserializeOwned;

use crate::error::{Code, ServiceError};

fn request_framing(req: &Request) -> Result<Framing, ServiceError> {
    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    Framing::from_content_type(content_type)
        .ok_or_else(|| ServiceError::unsupported_media_type(content_type))
}

/// A unary call's single request message.
#[derive(Debug, Clone)]
pub struct UnaryRequest<T> {
    pub codec: Codec,
    pub message: T,
}

impl<S, T> FromRequest<S> for UnaryRequest<T>
where
    S: Send + Sync,
    T: Message + DeserializeOwned + Default,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, _state: &S) -> Result<Self, Self::Rejection> {
        let codec = match request_framing(&req)? {
            Framing::Unary(codec) => codec,
            Framing::Streaming(codec) => {
                return Err(ServiceError::unsupported_media_type(
                    codec.streaming_content_type(),
                ));
            }
        };

        let bytes = axum::body::to_bytes(req.into_body(), DEFAULT_MAX_FRAME_SIZE)
            .await
            .map_err(|e| {
                ServiceError::new(
                    Code::ResourceExhausted,
                    format!("failed to read request body: {e}"),
                )
            })?;

        let message = codec.decode(&bytes)?;
        Ok(UnaryRequest { codec, message })
    }
}

/// A streaming call's request direction.
pub struct StreamingRequest<T> {
    pub codec: Codec,
    pub messages: MessageStream<T>,
}

/// Rejection for streaming calls: the error travels in an EndStream frame.
#[derive(Debug)]
pub struct StreamingRejection {
    codec: Codec,
    error: ServiceError,
}

impl IntoResponse for StreamingRejection {
    fn into_response(self) -> Response {
        self.error.into_streaming_response(self.codec)
    }
}

impl<S, T> FromRequest<S> for StreamingRequest<T>
where
    S: Send + Sync,
    T: Message + DeserializeOwned + Default + Send + 'static,
{
    type Rejection = StreamingRejection;

    async fn from_request(req: Request, _state: &S) -> Result<Self, Self::Rejection> {
        let codec = match request_framing(&req) {
            Ok(Framing::Streaming(codec)) => codec,
            Ok(Framing::Unary(codec)) => {
                return Err(StreamingRejection {
                    codec,
                    error: ServiceError::unsupported_media_type(codec.unary_content_type()),
                });
            }
            Err(error) => {
                return Err(StreamingRejection {
                    codec: Codec::default(),
                    error,
                });
            }
        };

        Ok(StreamingRequest {
            codec,
            messages: MessageStream::from_body(req.into_body(), codec, DEFAULT_MAX_FRAME_SIZE),
        })
    }
}

/// The messages of one request direction, in send order.
///
/// Yields `Ok` per message, ends with `None` at end of input (an EndStream
/// frame or the end of the body). A malformed frame or a body that breaks
/// off yields one `Err` and then ends.
pub struct MessageStream<T> {
    inner: Pin<Box<dyn Stream<Item = Result<T, ServiceError>> + Send>>,
}

impl<T> std::fmt::Debug for MessageStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageStream").finish_non_exhaustive()
    }
}

impl<T> MessageStream<T>
where
    T: Message + DeserializeOwned + Default + Send + 'static,
{
    /// Decode enveloped messages from a request body.
    pub fn from_body(body: Body, codec: Codec, max_frame_size: usize) -> Self {
        let stream = async_stream::stream! {
            let mut data = body.into_data_stream();
            let mut reader = FrameReader::new(max_frame_size);

            loop {
                loop {
                    match reader.next_frame() {
                        Ok(Some(Frame::Message(payload))) => match codec.decode::<T>(&payload) {
                            Ok(message) => yield Ok(message),
                            Err(e) => {
                                yield Err(ServiceError::from(e));
                                return;
                            }
                        },
                        // End of input; anything after it is ignored.
                        Ok(Some(Frame::EndStream(_))) => return,
                        Ok(None) => break,
                        Err(e) => {
                            yield Err(ServiceError::from(e));
                            return;
                        }
                    }
                }

                match data.next().await {
                    Some(Ok(chunk)) => reader.push(&chunk),
                    Some(Err(e)) => {
                        yield Err(ServiceError::abandoned(format!("request stream broke off: {e}")));
                        return;
                    }
                    None => {
                        if let Err(e) = reader.finish() {
                            yield Err(ServiceError::from(e));
                        }
                        return;
                    }
                }
            }
        };

        Self {
            inner: Box::pin(stream),
        }
    }
}

impl<T> MessageStream<T> {
    /// Wrap an in-process stream, e.g. to drive a handler directly.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<T, ServiceError>> + Send + 'static,
    {
        Self {
            inner: Box::pin(stream),
        }
    }

    /// Read the one and only message of a single-request call.
    ///
    /// Waits for end of input so a second message is caught as a protocol
    /// violation instead of being silently dropped.
    pub async fn single(mut self, kind: PatternKind) -> Result<T, ServiceError> {
        let first = match self.inner.next().await {
            Some(result) => result?,
            None => {
                return Err(SequenceError::MissingRequest {
                    kind: kind.as_str(),
                }
                .into());
            }
        };

        match self.inner.next().await {
            None => Ok(first),
            Some(Err(e)) => Err(e),
            Some(Ok(_)) => Err(SequenceError::ExtraRequest {
                kind: kind.as_str(),
            }
            .into()),
        }
    }
}

impl<T> Stream for MessageStream<T> {
    type Item = Result<T, ServiceError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}
