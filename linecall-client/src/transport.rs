//! HTTP transport for the line client.
//!
//! [`HyperTransport`] speaks HTTP/2 cleartext (h2c) with prior knowledge, so
//! client-stream and bidi-stream calls get a request body that keeps flowing
//! while the response is read.

mod body;
mod hyper;

pub(crate) use body::Outgoing;
pub use body::TransportBody;
pub use hyper::{HyperTransport, HyperTransportBuilder};
