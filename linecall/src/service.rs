use std::future::Future;
use std::pin::Pin;

use futures::Stream;
use linecall_core::{FetchLinesRequest, HelloReply, HelloRequest, StreamSummary, TextLine};

use crate::error::ServiceError;
use crate::request::MessageStream;

/// A stream of lines produced by a handler.
///
/// The first `Err` ends the call with that error; anything after it is never
/// polled.
pub type LineStream = Pin<Box<dyn Stream<Item = Result<TextLine, ServiceError>> + Send>>;

/// Handlers of the four line calls.
///
/// The router validates message counts before a handler runs: `greet` and
/// `fetch_lines` receive exactly one decoded request. `submit_lines` and
/// `reverse_lines` receive the request direction as it arrives, ending at the
/// initiator's end of input.
pub trait LineService: Send + Sync + 'static {
    /// Unary: one request, one reply.
    fn greet(
        &self,
        request: HelloRequest,
    ) -> impl Future<Output = Result<HelloReply, ServiceError>> + Send;

    /// Server-stream: one request, a paced sequence of lines.
    fn fetch_lines(
        &self,
        request: FetchLinesRequest,
    ) -> impl Future<Output = Result<LineStream, ServiceError>> + Send;

    /// Client-stream: all incoming lines, then one summary.
    fn submit_lines(
        &self,
        lines: MessageStream<TextLine>,
    ) -> impl Future<Output = Result<StreamSummary, ServiceError>> + Send;

    /// Bidi-stream: replies interleaved with incoming lines.
    fn reverse_lines(
        &self,
        lines: MessageStream<TextLine>,
    ) -> impl Future<Output = Result<LineStream, ServiceError>> + Send;
}
