//! Hyper-based h2c transport.

use std::time::Duration;

use hyper::body::Incoming;
use hyper_util::client::legacy::{Client, connect::HttpConnector};
use hyper_util::rt::{TokioExecutor, TokioTimer};

use super::body::TransportBody;
use crate::ClientError;

type HyperClient = Client<HttpConnector, TransportBody>;

/// HTTP/2 cleartext transport using hyper_util's legacy client.
///
/// Calls to the same authority share one pooled connection; each call is one
/// HTTP/2 stream on it.
#[derive(Clone)]
pub struct HyperTransport {
    client: HyperClient,
}

impl std::fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperTransport").finish_non_exhaustive()
    }
}

impl HyperTransport {
    pub fn builder() -> HyperTransportBuilder {
        HyperTransportBuilder::new()
    }

    /// Send a request and wait for the response headers.
    pub async fn request(
        &self,
        request: http::Request<TransportBody>,
    ) -> Result<http::Response<Incoming>, ClientError> {
        self.client
            .request(request)
            .await
            .map_err(|e| ClientError::Transport(transport_message(&e)))
    }
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// `Display` of the legacy client error hides the cause ("client error
/// (Connect)"); append the source chain.
fn transport_message(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Builder for [`HyperTransport`].
#[derive(Clone, Debug)]
pub struct HyperTransportBuilder {
    pool_idle_timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    h2_keep_alive_interval: Option<Duration>,
}

impl Default for HyperTransportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HyperTransportBuilder {
    pub fn new() -> Self {
        Self {
            pool_idle_timeout: Some(Duration::from_secs(90)),
            connect_timeout: None,
            h2_keep_alive_interval: None,
        }
    }

    /// Default: 90 seconds.
    pub fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = Some(timeout);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Send HTTP/2 PING frames at this interval to detect dead connections.
    pub fn h2_keep_alive_interval(mut self, interval: Duration) -> Self {
        self.h2_keep_alive_interval = Some(interval);
        self
    }

    pub fn build(self) -> HyperTransport {
        let mut connector = HttpConnector::new();
        connector.set_nodelay(true);
        connector.set_connect_timeout(self.connect_timeout);

        let mut builder = Client::builder(TokioExecutor::new());
        builder.pool_timer(TokioTimer::new());
        builder.http2_only(true);
        if let Some(timeout) = self.pool_idle_timeout {
            builder.pool_idle_timeout(timeout);
        }
        if let Some(interval) = self.h2_keep_alive_interval {
            builder.timer(TokioTimer::new());
            builder.http2_keep_alive_interval(interval);
        }

        HyperTransport {
            client: builder.build(connector),
        }
    }
}
