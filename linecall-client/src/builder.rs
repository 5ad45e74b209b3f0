//! Client builder.

use std::time::Duration;

use linecall_core::Codec;

use crate::ClientError;
use crate::client::LineClient;
use crate::transport::HyperTransport;

/// Envelopes a write activity may queue ahead of the transport.
pub const DEFAULT_SEND_BUFFER: usize = 16;

/// Builder for [`LineClient`].
///
/// ```ignore
/// let client = ClientBuilder::new("http://127.0.0.1:3000")
///     .use_json()
///     .timeout(Duration::from_secs(10))
///     .build()?;
/// ```
#[derive(Debug)]
pub struct ClientBuilder {
    base_url: String,
    transport: Option<HyperTransport>,
    codec: Codec,
    timeout: Option<Duration>,
    send_buffer: usize,
}

impl ClientBuilder {
    /// `base_url` is scheme and authority, e.g. `http://localhost:3000`.
    pub fn new<S: Into<String>>(base_url: S) -> Self {
        Self {
            base_url: base_url.into(),
            transport: None,
            codec: Codec::Proto,
            timeout: None,
            send_buffer: DEFAULT_SEND_BUFFER,
        }
    }

    /// Use a pre-configured transport.
    pub fn transport(mut self, transport: HyperTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    /// Protobuf messages. This is the default.
    pub fn use_proto(self) -> Self {
        self.codec(Codec::Proto)
    }

    pub fn use_json(self) -> Self {
        self.codec(Codec::Json)
    }

    /// Bound on waiting for a reply: the whole call for unary and
    /// client-stream, the response headers for server-stream and bidi-stream.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Send-side backpressure of streaming calls.
    ///
    /// Default: [`DEFAULT_SEND_BUFFER`]. Zero is treated as one.
    pub fn send_buffer(mut self, depth: usize) -> Self {
        self.send_buffer = depth;
        self
    }

    pub fn build(self) -> Result<LineClient, ClientError> {
        let base_url = self.base_url.trim_end_matches('/').to_string();
        let uri: http::Uri = base_url
            .parse()
            .map_err(|e| ClientError::Transport(format!("invalid base URL {base_url:?}: {e}")))?;

        match uri.scheme_str() {
            Some("http") => {}
            Some(other) => {
                return Err(ClientError::Transport(format!(
                    "unsupported scheme {other:?}: only h2c over http is spoken"
                )));
            }
            None => {
                return Err(ClientError::Transport(format!(
                    "base URL {base_url:?} has no scheme"
                )));
            }
        }
        if uri.authority().is_none() {
            return Err(ClientError::Transport(format!(
                "base URL {base_url:?} has no host"
            )));
        }

        Ok(LineClient::new(
            self.transport.unwrap_or_default(),
            base_url,
            self.codec,
            self.timeout,
            self.send_buffer,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let client = ClientBuilder::new("http://localhost:3000/").build().unwrap();
        assert_eq!(client.base_url(), "http://localhost:3000");
        assert_eq!(client.codec(), Codec::Proto);
        assert!(client.timeout().is_none());
    }

    #[test]
    fn test_builder_options() {
        let client = ClientBuilder::new("http://localhost:3000")
            .use_json()
            .timeout(Duration::from_secs(5))
            .send_buffer(0)
            .build()
            .unwrap();
        assert_eq!(client.codec(), Codec::Json);
        assert_eq!(client.timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_rejects_tls_and_garbage() {
        assert!(ClientBuilder::new("https://localhost:3000").build().is_err());
        assert!(ClientBuilder::new("localhost:3000").build().is_err());
        assert!(ClientBuilder::new("not a url").build().is_err());
    }
}
