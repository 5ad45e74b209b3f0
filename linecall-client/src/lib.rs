//! Call initiator for the line service.
//!
//! Speaks the Connect protocol over HTTP/2 cleartext to servers built with
//! `linecall`.
//!
//! ## Features
//!
//! - Unary calls (request-response)
//! - Server-stream calls
//! - Client-stream calls driven by a producer stream
//! - Bidi-stream calls where sending and receiving never block each other
//! - Protobuf and JSON encoding
//!
//! ## Example
//!
//! ```ignore
//! use futures::{StreamExt, stream};
//! use linecall_client::LineClient;
//!
//! let client = LineClient::builder("http://localhost:3000").build()?;
//!
//! let reply = client.greet("Ada").await?;
//! println!("{}", reply.message);
//!
//! let mut lines = client.fetch_lines().await?;
//! while let Some(line) = lines.next().await {
//!     println!("{}", line?.line);
//! }
//! ```
//!
//! ## Bidi-stream Example
//!
//! ```ignore
//! use std::convert::Infallible;
//!
//! let input = stream::iter(["abc", "hello"].map(|s| Ok::<_, Infallible>(TextLine::new(s))));
//! let mut reversed = client.reverse_lines(input).await?;
//! while let Some(line) = reversed.next().await {
//!     println!("{}", line?.line);
//! }
//! ```
//!
//! ## Errors
//!
//! Every failure is a [`ClientError`]; [`ClientError::kind`] tells transport
//! loss, protocol violations, handler faults, producer failures and
//! cancellation apart.
//!
//! ## Feature flags
//!
//! - `tracing`: one `rpc.call` span per call, and a warning per failed call

mod builder;
mod client;
mod error;
mod error_parser;
pub mod frame;
mod state;
mod streaming;
pub mod transport;
mod writer;

pub use builder::{ClientBuilder, DEFAULT_SEND_BUFFER};
pub use client::LineClient;
pub use error::{ClientError, FailureKind};
pub use streaming::Streaming;
pub use transport::{HyperTransport, HyperTransportBuilder};

// Re-export the shared protocol types
pub use linecall_core::{
    CallState, Code, Codec, FetchLinesRequest, HelloReply, HelloRequest, Outcome, PatternKind,
    RecvState, SendState, Status, StreamSummary, TextLine,
};
