//! The call initiator.
//!
//! [`LineClient`] opens one HTTP/2 stream per logical call and drives the
//! local side of each pattern:
//!
//! - unary: one request, exactly one reply
//! - server-stream: one request, a lazy [`Streaming`] of replies
//! - client-stream: a producer of requests, exactly one reply
//! - bidi-stream: a producer of requests and a [`Streaming`] of replies that
//!   progress independently

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, StreamExt, TryStreamExt};
use http::{Method, Request, Response, StatusCode, header};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use linecall_core::{
    CallState, Codec, FetchLinesRequest, Framing, HelloReply, HelloRequest, PROTOCOL_VERSION,
    PROTOCOL_VERSION_HEADER, PatternKind, StreamSummary, TextLine,
    catalog::{FETCH_LINES, GREET, REVERSE_LINES, SUBMIT_LINES},
};
use prost::Message;
use serde::{Serialize, de::DeserializeOwned};

use crate::ClientError;
use crate::builder::ClientBuilder;
use crate::error_parser::parse_error_body;
use crate::frame::{ByteStream, FrameDecoder, FrameEncoder};
use crate::state::SharedCallState;
use crate::streaming::Streaming;
use crate::transport::{HyperTransport, TransportBody};
use crate::writer::spawn_writer;

/// Client of the line service.
///
/// Cheap to clone; clones share the pooled HTTP/2 connection.
///
/// ```ignore
/// let client = LineClient::builder("http://127.0.0.1:3000").build()?;
/// let reply = client.greet("Ada").await?;
/// assert_eq!(reply.message, "Hello Ada");
/// ```
#[derive(Debug, Clone)]
pub struct LineClient {
    transport: HyperTransport,
    base_url: String,
    codec: Codec,
    timeout: Option<Duration>,
    send_buffer: usize,
}

impl LineClient {
    pub fn builder<S: Into<String>>(base_url: S) -> ClientBuilder {
        ClientBuilder::new(base_url)
    }

    pub(crate) fn new(
        transport: HyperTransport,
        base_url: String,
        codec: Codec,
        timeout: Option<Duration>,
        send_buffer: usize,
    ) -> Self {
        Self {
            transport,
            base_url,
            codec,
            timeout,
            send_buffer,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    // ---- typed calls ----

    /// `Greet`: `"Hello " + name`.
    pub async fn greet<S: Into<String>>(&self, name: S) -> Result<HelloReply, ClientError> {
        let request = HelloRequest { name: name.into() };
        self.call_unary(&GREET.path(), &request).await
    }

    /// `FetchLines`: the service's sample lines, paced.
    pub async fn fetch_lines(&self) -> Result<Streaming<TextLine>, ClientError> {
        self.call_server_stream(&FETCH_LINES.path(), &FetchLinesRequest {})
            .await
    }

    /// `SubmitLines`: send every line, then wait for the summary.
    pub async fn submit_lines<P, E>(&self, lines: P) -> Result<StreamSummary, ClientError>
    where
        P: Stream<Item = Result<TextLine, E>> + Send + 'static,
        E: std::error::Error + Send + 'static,
    {
        self.call_client_stream(&SUBMIT_LINES.path(), lines).await
    }

    /// `ReverseLines`: each line comes back reversed while later lines are
    /// still being sent.
    pub async fn reverse_lines<P, E>(&self, lines: P) -> Result<Streaming<TextLine>, ClientError>
    where
        P: Stream<Item = Result<TextLine, E>> + Send + 'static,
        E: std::error::Error + Send + 'static,
    {
        self.call_bidi_stream(&REVERSE_LINES.path(), lines).await
    }

    // ---- generic calls ----

    /// One request, suspends until exactly one reply or failure.
    ///
    /// The configured timeout bounds the whole call.
    pub async fn call_unary<Req, Res>(&self, procedure: &str, request: &Req) -> Result<Res, ClientError>
    where
        Req: Message + Serialize,
        Res: Message + DeserializeOwned + Default,
    {
        let call = async {
            let mut state = CallState::new(PatternKind::Unary);
            let body = self.codec.encode(request)?;
            state.record_send()?;
            let request = self.build_request(
                procedure,
                Framing::Unary(self.codec),
                TransportBody::full(body),
            )?;
            state.finish_send()?;

            let response = self.transport.request(request).await?;
            let status = response.status();
            if status != StatusCode::OK {
                let body = read_body(response.into_body()).await?;
                return Err(parse_error_body(status, &body));
            }
            self.expect_framing(&response, Framing::Unary(self.codec))?;

            let body = read_body(response.into_body()).await?;
            let reply = self.codec.decode::<Res>(&body)?;
            state.record_receive()?;
            state.close_receive()?;
            Ok(reply)
        };

        self.deadline(trace(call, procedure, PatternKind::Unary, self.codec))
            .await
    }

    /// One request, then a lazy sequence of replies.
    ///
    /// The configured timeout bounds the wait for the response headers.
    pub async fn call_server_stream<Req, Res>(
        &self,
        procedure: &str,
        request: &Req,
    ) -> Result<Streaming<Res>, ClientError>
    where
        Req: Message + Serialize,
        Res: Message + DeserializeOwned + Default,
    {
        let call = async {
            let state = SharedCallState::new(PatternKind::ServerStream);
            let body = FrameEncoder::new(self.codec).single(request)?;
            state.record_send()?;
            let request = self.build_request(
                procedure,
                Framing::Streaming(self.codec),
                TransportBody::full(body),
            )?;
            state.finish_send()?;

            let response = self.deadline(self.transport.request(request)).await?;
            let body = self.streaming_body(response).await?;
            Ok(Streaming::new(
                FrameDecoder::new(body, self.codec),
                state,
                None,
            ))
        };

        trace(call, procedure, PatternKind::ServerStream, self.codec).await
    }

    /// Send every produced request, signal end of input, then suspend for
    /// exactly one reply.
    ///
    /// A producer error closes the send direction abnormally and fails the call
    /// with [`ClientError::Producer`] without waiting for a reply. The
    /// configured timeout bounds the whole call.
    pub async fn call_client_stream<Req, Res, P, E>(
        &self,
        procedure: &str,
        producer: P,
    ) -> Result<Res, ClientError>
    where
        Req: Message + Serialize + Send + 'static,
        Res: Message + DeserializeOwned + Default,
        P: Stream<Item = Result<Req, E>> + Send + 'static,
        E: std::error::Error + Send + 'static,
    {
        let call = async {
            let state = SharedCallState::new(PatternKind::ClientStream);
            let (body, mut writer) = spawn_writer(
                producer,
                FrameEncoder::new(self.codec),
                state.clone(),
                self.send_buffer,
            );
            let request = self.build_request(procedure, Framing::Streaming(self.codec), body)?;

            let response = tokio::select! {
                biased;
                err = writer.failure() => return Err(err),
                response = self.transport.request(request) => response?,
            };
            let body = match self.streaming_body(response).await {
                Ok(body) => body,
                Err(err) => return Err(writer.try_failure().unwrap_or(err)),
            };

            let mut replies = Streaming::<Res>::new(
                FrameDecoder::new(body, self.codec),
                state,
                Some(writer),
            );
            let reply = match replies.next().await {
                Some(reply) => reply?,
                None => return Err(ClientError::Protocol("call ended without its reply".into())),
            };
            match replies.next().await {
                None => Ok(reply),
                Some(Err(err)) => Err(err),
                Some(Ok(_)) => Err(ClientError::Protocol("call carries exactly one reply".into())),
            }
        };

        self.deadline(trace(call, procedure, PatternKind::ClientStream, self.codec))
            .await
    }

    /// Run a write activity (producer → send direction, then end of input)
    /// and return the read activity as a [`Streaming`]. Neither blocks the
    /// other.
    ///
    /// The configured timeout bounds the wait for the response headers.
    pub async fn call_bidi_stream<Req, Res, P, E>(
        &self,
        procedure: &str,
        producer: P,
    ) -> Result<Streaming<Res>, ClientError>
    where
        Req: Message + Serialize + Send + 'static,
        Res: Message + DeserializeOwned + Default,
        P: Stream<Item = Result<Req, E>> + Send + 'static,
        E: std::error::Error + Send + 'static,
    {
        let call = async {
            let state = SharedCallState::new(PatternKind::BidiStream);
            let (body, mut writer) = spawn_writer(
                producer,
                FrameEncoder::new(self.codec),
                state.clone(),
                self.send_buffer,
            );
            let request = self.build_request(procedure, Framing::Streaming(self.codec), body)?;

            let response = self
                .deadline(async {
                    tokio::select! {
                        biased;
                        err = writer.failure() => Err(err),
                        response = self.transport.request(request) => response,
                    }
                })
                .await?;
            let body = match self.streaming_body(response).await {
                Ok(body) => body,
                Err(err) => return Err(writer.try_failure().unwrap_or(err)),
            };

            Ok(Streaming::new(
                FrameDecoder::new(body, self.codec),
                state,
                Some(writer),
            ))
        };

        trace(call, procedure, PatternKind::BidiStream, self.codec).await
    }

    // ---- plumbing ----

    fn build_request(
        &self,
        procedure: &str,
        framing: Framing,
        body: TransportBody,
    ) -> Result<Request<TransportBody>, ClientError> {
        let procedure = procedure.strip_prefix('/').unwrap_or(procedure);
        let url = format!("{}/{}", self.base_url, procedure);

        Request::builder()
            .method(Method::POST)
            .uri(&url)
            .header(PROTOCOL_VERSION_HEADER, PROTOCOL_VERSION)
            .header(header::CONTENT_TYPE, framing.content_type())
            .body(body)
            .map_err(|e| ClientError::Protocol(format!("failed to build request: {e}")))
    }

    /// Apply the configured timeout.
    async fn deadline<F, T>(&self, call: F) -> Result<T, ClientError>
    where
        F: Future<Output = Result<T, ClientError>>,
    {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
                ClientError::deadline_exceeded(format!(
                    "no reply within {} ms",
                    limit.as_millis()
                ))
            })?,
            None => call.await,
        }
    }

    fn expect_framing(&self, response: &Response<Incoming>, expected: Framing) -> Result<(), ClientError> {
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok());
        match content_type.and_then(Framing::from_content_type) {
            Some(framing) if framing == expected => Ok(()),
            _ => Err(ClientError::Protocol(format!(
                "expected content type {}, got {:?}",
                expected.content_type(),
                content_type
            ))),
        }
    }

    /// Check a streaming response's status and framing and hand out its body.
    async fn streaming_body(&self, response: Response<Incoming>) -> Result<ByteStream, ClientError> {
        let status = response.status();
        if status != StatusCode::OK {
            let body = read_body(response.into_body()).await?;
            return Err(parse_error_body(status, &body));
        }
        self.expect_framing(&response, Framing::Streaming(self.codec))?;

        let body = response
            .into_body()
            .into_data_stream()
            .map_err(|e| ClientError::Transport(format!("response stream broke off: {e}")));
        Ok(Box::pin(body))
    }
}

async fn read_body(body: Incoming) -> Result<Bytes, ClientError> {
    body.collect()
        .await
        .map(|collected| collected.to_bytes())
        .map_err(|e| ClientError::Transport(format!("failed to read response body: {e}")))
}

/// Run `call` inside an `rpc.call` span.
#[cfg(feature = "tracing")]
async fn trace<F, T>(call: F, procedure: &str, kind: PatternKind, codec: Codec) -> Result<T, ClientError>
where
    F: Future<Output = Result<T, ClientError>>,
{
    use tracing::Instrument;

    let span = tracing::info_span!(
        "rpc.call",
        rpc.method = %procedure,
        rpc.pattern = kind.as_str(),
        rpc.encoding = codec.name(),
        otel.kind = "client",
    );
    let result = call.instrument(span.clone()).await;
    if let Err(err) = &result {
        span.in_scope(|| {
            tracing::warn!(code = err.code().as_str(), kind = ?err.kind(), error = %err, "call failed")
        });
    }
    result
}

#[cfg(not(feature = "tracing"))]
async fn trace<F, T>(call: F, _procedure: &str, _kind: PatternKind, _codec: Codec) -> Result<T, ClientError>
where
    F: Future<Output = Result<T, ClientError>>,
{
    call.await
}
