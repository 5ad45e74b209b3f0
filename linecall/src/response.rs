//! Response encoding for the four patterns.
//!
//! - [`UnaryReply`]: one bare message (unary)
//! - [`EnvelopedReply`]: one enveloped message then EndStream (client-stream)
//! - [`StreamReply`]: zero or more enveloped messages then EndStream
//!   (server-stream, bidi-stream)

use std::convert::Infallible;

use axum::{
    body::Body,
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use linecall_core::{Codec, EndStream, HandlerPhase, wrap_envelope};
use prost::Message;
use serde::Serialize;

use crate::error::ServiceError;
use crate::lifecycle::CallTracker;

fn with_content_type(body: Body, content_type: &'static str) -> Response {
    let mut response = Response::new(body);
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

/// A unary call's reply.
#[derive(Debug)]
pub struct UnaryReply<T> {
    codec: Codec,
    message: T,
}

impl<T> UnaryReply<T> {
    pub fn new(codec: Codec, message: T) -> Self {
        Self { codec, message }
    }
}

impl<T> IntoResponse for UnaryReply<T>
where
    T: Message + Serialize,
{
    fn into_response(self) -> Response {
        match self.codec.encode(&self.message) {
            Ok(bytes) => with_content_type(Body::from(bytes), self.codec.unary_content_type()),
            Err(e) => ServiceError::from(e).into_response(),
        }
    }
}

/// The single aggregate reply of a client-stream call.
#[derive(Debug)]
pub struct EnvelopedReply<T> {
    codec: Codec,
    message: T,
}

impl<T> EnvelopedReply<T> {
    pub fn new(codec: Codec, message: T) -> Self {
        Self { codec, message }
    }
}

impl<T> IntoResponse for EnvelopedReply<T>
where
    T: Message + Serialize,
{
    fn into_response(self) -> Response {
        match self.codec.encode(&self.message) {
            Ok(bytes) => {
                let mut body = wrap_envelope(&bytes).to_vec();
                body.extend_from_slice(&EndStream::ok().to_frame());
                with_content_type(Body::from(body), self.codec.streaming_content_type())
            }
            Err(e) => ServiceError::from(e).into_streaming_response(self.codec),
        }
    }
}

/// A stream of replies.
///
/// Each `Ok` item is written as one envelope as soon as the transport accepts
/// it. The first `Err` item ends the stream with an error EndStream frame;
/// natural exhaustion ends it with a success EndStream frame. The call tracker
/// rides along inside the body, so it is released exactly when the body is,
/// including when the initiator abandons the call.
pub struct StreamReply<S> {
    codec: Codec,
    stream: S,
    tracker: Option<CallTracker>,
}

impl<S> StreamReply<S> {
    pub fn new(codec: Codec, stream: S) -> Self {
        Self {
            codec,
            stream,
            tracker: None,
        }
    }

    pub(crate) fn tracked(mut self, tracker: CallTracker) -> Self {
        self.tracker = Some(tracker);
        self
    }
}

impl<S, T> StreamReply<S>
where
    S: Stream<Item = Result<T, ServiceError>> + Send + 'static,
    T: Message + Serialize + Send + 'static,
{
    fn into_frames(self) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
        let codec = self.codec;
        let mut tracker = self.tracker;
        let stream = self.stream;

        async_stream::stream! {
            if let Some(tracker) = tracker.as_mut() {
                tracker.advance(HandlerPhase::Streaming);
            }

            let mut stream = Box::pin(stream);
            while let Some(item) = stream.next().await {
                let encoded = item.and_then(|message| codec.encode(&message).map_err(ServiceError::from));
                match encoded {
                    Ok(bytes) => {
                        if let Some(tracker) = tracker.as_mut() {
                            tracker.record_emit();
                        }
                        yield Ok(wrap_envelope(&bytes));
                    }
                    Err(err) => {
                        if let Some(tracker) = tracker.take() {
                            tracker.fail(&err);
                        }
                        if !err.is_abandoned() {
                            yield Ok(EndStream::failed(err.into_status()).to_frame());
                        }
                        return;
                    }
                }
            }

            if let Some(tracker) = tracker.take() {
                tracker.complete();
            }
            yield Ok(EndStream::ok().to_frame());
        }
    }
}

impl<S, T> IntoResponse for StreamReply<S>
where
    S: Stream<Item = Result<T, ServiceError>> + Send + 'static,
    T: Message + Serialize + Send + 'static,
{
    fn into_response(self) -> Response {
        let content_type = self.codec.streaming_content_type();
        with_content_type(Body::from_stream(self.into_frames()), content_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use http_body_util::BodyExt;
    use linecall_core::{Code, Frame, FrameReader, HelloReply, TextLine};

    async fn frames(response: Response) -> Vec<Frame> {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let mut reader = FrameReader::default();
        reader.push(&bytes);
        let mut frames = Vec::new();
        while let Some(frame) = reader.next_frame().unwrap() {
            frames.push(frame);
        }
        reader.finish().unwrap();
        frames
    }

    #[tokio::test]
    async fn test_unary_reply_is_bare_message() {
        let response = UnaryReply::new(
            Codec::Json,
            HelloReply {
                message: "Hello ".into(),
            },
        )
        .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], br#"{"message":"Hello "}"#);
    }

    #[tokio::test]
    async fn test_stream_reply_ends_with_end_stream() {
        let lines = futures::stream::iter(vec![
            Ok::<_, ServiceError>(TextLine::new("a")),
            Ok(TextLine::new("b")),
        ]);
        let frames = frames(StreamReply::new(Codec::Proto, lines).into_response()).await;

        assert_eq!(frames.len(), 3);
        assert_eq!(
            frames[0],
            Frame::Message(Codec::Proto.encode(&TextLine::new("a")).unwrap())
        );
        assert_eq!(frames[2], Frame::EndStream(EndStream::ok()));
    }

    #[tokio::test]
    async fn test_stream_reply_stops_at_first_error() {
        let lines = futures::stream::iter(vec![
            Ok(TextLine::new("a")),
            Err(ServiceError::new(Code::Aborted, "halt")),
            Ok(TextLine::new("never")),
        ]);
        let frames = frames(StreamReply::new(Codec::Proto, lines).into_response()).await;

        assert_eq!(frames.len(), 2);
        let Frame::EndStream(end) = &frames[1] else {
            panic!("expected EndStream");
        };
        assert_eq!(end.error.as_ref().unwrap().code(), Code::Aborted);
    }

    #[tokio::test]
    async fn test_stream_reply_ends_quietly_when_abandoned() {
        let lines = futures::stream::iter(vec![
            Ok(TextLine::new("a")),
            Err(ServiceError::abandoned("request stream broke off")),
        ]);
        let frames = frames(StreamReply::new(Codec::Proto, lines).into_response()).await;

        assert_eq!(frames.len(), 1);
        assert!(matches!(frames[0], Frame::Message(_)));
    }

    #[tokio::test]
    async fn test_enveloped_reply_has_one_message() {
        let response = EnvelopedReply::new(
            Codec::Proto,
            linecall_core::StreamSummary { elapsed_seconds: 0 },
        )
        .into_response();
        let frames = frames(response).await;
        assert_eq!(frames.len(), 2);
        assert!(matches!(frames[0], Frame::Message(_)));
        assert_eq!(frames[1], Frame::EndStream(EndStream::ok()));
    }
}
