//! HTTP/2 cleartext (h2c) accept loop.
//!
//! Every logical call is one HTTP/2 stream, so streaming calls get full-duplex
//! request and response bodies over a single connection.

use std::future::Future;
use std::io;
use std::time::Duration;

use axum::Router;
use hyper::server::conn::http2;
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    service::TowerToHyperService,
};
use tokio::net::TcpListener;

/// Serve `router` on `listener` until the process ends.
pub async fn serve(listener: TcpListener, router: Router) -> std::io::Result<()> {
    serve_with_shutdown(listener, router, std::future::pending()).await
}

/// Serve `router` on `listener` until `shutdown` resolves.
///
/// Connections already accepted keep running until their peer closes them.
pub async fn serve_with_shutdown<F>(
    listener: TcpListener,
    router: Router,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send,
{
    tokio::pin!(shutdown);
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "serving h2c");
    }

    loop {
        let accepted = tokio::select! {
            accepted = listener.accept() => accepted,
            () = &mut shutdown => {
                tracing::info!("shutdown requested, no longer accepting");
                return Ok(());
            }
        };
        let (stream, peer) = match accepted {
            Ok(accepted) => accepted,
            Err(err) => {
                if let Some(pause) = accept_backoff(&err) {
                    tracing::error!(error = %err, "accept failed, retrying");
                    tokio::time::sleep(pause).await;
                } else {
                    tracing::debug!(error = %err, "peer dropped before accept");
                }
                continue;
            }
        };

        let io = TokioIo::new(stream);
        let service = TowerToHyperService::new(router.clone());

        tokio::spawn(async move {
            tracing::debug!(%peer, "connection accepted");
            if let Err(err) = http2::Builder::new(TokioExecutor::new())
                .serve_connection(io, service)
                .await
            {
                tracing::debug!(%peer, error = %err, "connection closed with error");
            }
        });
    }
}

/// How long to pause after a failed `accept`. Errors confined to one peer
/// need none; anything else (e.g. out of file descriptors) backs off.
fn accept_backoff(err: &io::Error) -> Option<Duration> {
    match err.kind() {
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionReset => None,
        _ => Some(Duration::from_secs(1)),
    }
}
