//! # linecall
//!
//! Handler side of the line service: four logical calls, one per interaction
//! pattern, served over HTTP/2 cleartext with the Connect envelope framing.
//!
//! | call           | pattern       |
//! |----------------|---------------|
//! | `Greet`        | unary         |
//! | `FetchLines`   | server-stream |
//! | `SubmitLines`  | client-stream |
//! | `ReverseLines` | bidi-stream   |
//!
//! Implement [`LineService`] (or use [`DemoLineService`]), build a router with
//! [`router`], and hand it to [`serve`].
//!
//! ```ignore
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! linecall::serve(listener, linecall::router(DemoLineService::default())).await?;
//! ```

pub mod demo;
pub mod error;
mod lifecycle;
pub mod pacing;
pub mod request;
pub mod response;
mod router;
mod serve;
pub mod service;

pub use demo::{DemoConfig, DemoLineService};
pub use error::{Code, ServiceError};
pub use pacing::Pacing;
pub use request::MessageStream;
pub use router::router;
pub use serve::{serve, serve_with_shutdown};
pub use service::{LineService, LineStream};

// Re-export the shared crate
pub use linecall_core;

pub mod prelude {
    //! The most common types for implementing a handler.
    pub use crate::error::{Code, ServiceError};
    pub use crate::request::MessageStream;
    pub use crate::service::{LineService, LineStream};
    pub use linecall_core::{FetchLinesRequest, HelloReply, HelloRequest, StreamSummary, TextLine};
}
