//! Serves the reference line service over h2c.
//!
//! Run with: cargo run --bin line-server
//!
//! Configure with `PORT`, `LINECALL_FETCH_PACING_MS`,
//! `LINECALL_REVERSE_PACING_MS` and `RUST_LOG`.

use linecall::{DemoLineService, router, serve_with_shutdown};
use linecall_demo::{ServerConfig, init_logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let config = ServerConfig::from_env()?;
    let service = DemoLineService::new(config.service_config());

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(
        %addr,
        fetch_pacing_ms = config.fetch_pacing.delay().as_millis() as u64,
        reverse_pacing_ms = config.reverse_pacing.delay().as_millis() as u64,
        "line service ready"
    );
    for procedure in linecall::linecall_core::catalog::PROCEDURES {
        tracing::info!(path = %procedure.path(), pattern = ?procedure.kind, "route");
    }

    serve_with_shutdown(listener, router(service), async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutting down");
    })
    .await?;
    Ok(())
}
