//! Maps the four logical calls to [`LineService`] methods.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Request, State},
    http::header,
    response::{IntoResponse, Response},
    routing::post,
};
use futures::StreamExt;
use linecall_core::{
    FetchLinesRequest, Framing, HandlerPhase, HelloRequest, TextLine,
    catalog::{FETCH_LINES, GREET, REVERSE_LINES, SUBMIT_LINES},
};
use prost::Message;
use serde::de::DeserializeOwned;

use crate::error::ServiceError;
use crate::lifecycle::CallTracker;
use crate::request::{MessageStream, StreamingRequest, UnaryRequest};
use crate::response::{EnvelopedReply, StreamReply, UnaryReply};
use crate::service::LineService;

/// Build the router serving `service`.
///
/// Unknown paths answer `unimplemented`.
pub fn router<S: LineService>(service: S) -> Router {
    Router::new()
        .route(&GREET.path(), post(greet::<S>))
        .route(&FETCH_LINES.path(), post(fetch_lines::<S>))
        .route(&SUBMIT_LINES.path(), post(submit_lines::<S>))
        .route(&REVERSE_LINES.path(), post(reverse_lines::<S>))
        .fallback(unimplemented)
        .with_state(Arc::new(service))
}

async fn greet<S: LineService>(
    State(service): State<Arc<S>>,
    request: UnaryRequest<HelloRequest>,
) -> Response {
    let mut tracker = CallTracker::open(GREET);
    tracker.processing();

    match service.greet(request.message).await {
        Ok(reply) => {
            tracker.advance(HandlerPhase::EmittingFinal);
            tracker.complete();
            UnaryReply::new(request.codec, reply).into_response()
        }
        Err(err) => {
            tracker.fail(&err);
            err.into_response()
        }
    }
}

async fn fetch_lines<S: LineService>(
    State(service): State<Arc<S>>,
    request: StreamingRequest<FetchLinesRequest>,
) -> Response {
    let codec = request.codec;
    let mut tracker = CallTracker::open(FETCH_LINES);

    let trigger = match request.messages.single(FETCH_LINES.kind).await {
        Ok(trigger) => trigger,
        Err(err) => {
            tracker.fail(&err);
            return err.into_streaming_response(codec);
        }
    };
    tracker.processing();

    match service.fetch_lines(trigger).await {
        Ok(lines) => StreamReply::new(codec, lines)
            .tracked(tracker)
            .into_response(),
        Err(err) => {
            tracker.fail(&err);
            err.into_streaming_response(codec)
        }
    }
}

async fn submit_lines<S: LineService>(
    State(service): State<Arc<S>>,
    request: StreamingRequest<TextLine>,
) -> Response {
    let codec = request.codec;
    let mut tracker = CallTracker::open(SUBMIT_LINES);
    let lines = first_message(request.messages, &mut tracker).await;

    match service.submit_lines(lines).await {
        Ok(summary) => {
            tracker.advance(HandlerPhase::EmittingFinal);
            tracker.complete();
            EnvelopedReply::new(codec, summary).into_response()
        }
        Err(err) => {
            tracker.fail(&err);
            err.into_streaming_response(codec)
        }
    }
}

async fn reverse_lines<S: LineService>(
    State(service): State<Arc<S>>,
    request: StreamingRequest<TextLine>,
) -> Response {
    let codec = request.codec;
    let mut tracker = CallTracker::open(REVERSE_LINES);
    // replies must not wait for input: the response opens before any line
    tracker.processing();

    match service.reverse_lines(request.messages).await {
        Ok(reversed) => StreamReply::new(codec, reversed)
            .tracked(tracker)
            .into_response(),
        Err(err) => {
            tracker.fail(&err);
            err.into_streaming_response(codec)
        }
    }
}

/// Wait for the first message (or end of input), then hand the whole
/// direction on with that message still at its head.
async fn first_message<T>(
    mut messages: MessageStream<T>,
    tracker: &mut CallTracker,
) -> MessageStream<T>
where
    T: Message + DeserializeOwned + Default + Send + 'static,
{
    let first = messages.next().await;
    tracker.processing();
    MessageStream::from_stream(futures::stream::iter(first).chain(messages))
}

async fn unimplemented(request: Request) -> Response {
    let framing = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(Framing::from_content_type);
    tracing::debug!(path = %request.uri().path(), "unknown procedure");

    let err = ServiceError::new_unimplemented();
    match framing {
        Some(Framing::Streaming(codec)) => err.into_streaming_response(codec),
        _ => err.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::{DemoConfig, DemoLineService};
    use axum::{body::Body, http::StatusCode};
    use http_body_util::BodyExt;
    use linecall_core::{Code, EndStream, Frame, FrameReader, wrap_envelope};
    use linecall_core::{Codec, PROTOCOL_VERSION, PROTOCOL_VERSION_HEADER};
    use tower::ServiceExt;

    fn app() -> Router {
        router(DemoLineService::new(DemoConfig::unpaced()))
    }

    fn post_request(path: &str, content_type: &str, body: impl Into<Body>) -> Request {
        axum::http::Request::post(path)
            .header(header::CONTENT_TYPE, content_type)
            .header(PROTOCOL_VERSION_HEADER, PROTOCOL_VERSION)
            .body(body.into())
            .unwrap()
    }

    async fn read_frames(response: Response) -> Vec<Frame> {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let mut reader = FrameReader::default();
        reader.push(&bytes);
        let mut frames = Vec::new();
        while let Some(frame) = reader.next_frame().unwrap() {
            frames.push(frame);
        }
        frames
    }

    fn envelopes<T: prost::Message + serde::Serialize>(messages: &[T]) -> Vec<u8> {
        let mut body = Vec::new();
        for message in messages {
            body.extend_from_slice(&wrap_envelope(&Codec::Proto.encode(message).unwrap()));
        }
        body.extend_from_slice(&EndStream::ok().to_frame());
        body
    }

    #[tokio::test]
    async fn test_greet_json() {
        let response = app()
            .oneshot(post_request(
                &GREET.path(),
                "application/json",
                r#"{"name":"Ada"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], br#"{"message":"Hello Ada"}"#);
    }

    #[tokio::test]
    async fn test_greet_rejects_streaming_content_type() {
        let response = app()
            .oneshot(post_request(
                &GREET.path(),
                "application/connect+json",
                "{}",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn test_unknown_procedure_is_unimplemented() {
        let response = app()
            .oneshot(post_request(
                "/linecall.v1.LineService/Nope",
                "application/json",
                "{}",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["code"], "unimplemented");
    }

    #[tokio::test]
    async fn test_fetch_lines_rejects_two_requests() {
        let body = envelopes(&[FetchLinesRequest {}, FetchLinesRequest {}]);
        let response = app()
            .oneshot(post_request(
                &FETCH_LINES.path(),
                "application/connect+proto",
                body,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let frames = read_frames(response).await;
        assert_eq!(frames.len(), 1);
        let Frame::EndStream(end) = &frames[0] else {
            panic!("expected EndStream");
        };
        assert_eq!(end.error.as_ref().unwrap().code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_submit_lines_replies_once() {
        let body = envelopes(&[TextLine::new("a"), TextLine::new("b")]);
        let response = app()
            .oneshot(post_request(
                &SUBMIT_LINES.path(),
                "application/connect+proto",
                body,
            ))
            .await
            .unwrap();
        let frames = read_frames(response).await;
        assert_eq!(frames.len(), 2);
        assert!(matches!(frames[0], Frame::Message(_)));
        assert_eq!(frames[1], Frame::EndStream(EndStream::ok()));
    }

    fn broken_body(lines: &[&str]) -> Body {
        let mut sent = Vec::new();
        for line in lines {
            sent.extend_from_slice(&wrap_envelope(
                &Codec::Proto.encode(&TextLine::new(*line)).unwrap(),
            ));
        }
        let chunks: Vec<Result<bytes::Bytes, std::io::Error>> = vec![
            Ok(sent.into()),
            Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "stream reset by peer",
            )),
        ];
        Body::from_stream(futures::stream::iter(chunks))
    }

    #[tokio::test]
    async fn test_submit_lines_broken_off_is_not_a_failure() {
        let response = app()
            .oneshot(post_request(
                &SUBMIT_LINES.path(),
                "application/connect+proto",
                broken_body(&["a"]),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // no error EndStream: the call closes early without a reported fault
        let frames = read_frames(response).await;
        assert!(frames.is_empty());
    }

    #[tokio::test]
    async fn test_reverse_lines_broken_off_is_not_a_failure() {
        let response = app()
            .oneshot(post_request(
                &REVERSE_LINES.path(),
                "application/connect+proto",
                broken_body(&["abc"]),
            ))
            .await
            .unwrap();

        let frames = read_frames(response).await;
        assert_eq!(frames.len(), 1);
        assert_eq!(
            frames[0],
            Frame::Message(Codec::Proto.encode(&TextLine::new("cba")).unwrap())
        );
    }

    #[tokio::test]
    async fn test_reverse_lines_over_router() {
        let body = envelopes(&[TextLine::new("abc"), TextLine::new("")]);
        let response = app()
            .oneshot(post_request(
                &REVERSE_LINES.path(),
                "application/connect+proto",
                body,
            ))
            .await
            .unwrap();
        let lines: Vec<String> = read_frames(response)
            .await
            .into_iter()
            .filter_map(|frame| match frame {
                Frame::Message(payload) => {
                    Some(Codec::Proto.decode::<TextLine>(&payload).unwrap().line)
                }
                Frame::EndStream(_) => None,
            })
            .collect();
        assert_eq!(lines, vec!["cba", ""]);
    }
}
