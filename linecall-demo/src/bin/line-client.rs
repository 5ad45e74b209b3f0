//! Calls every procedure of a running line-server once.
//!
//! Usage:
//!   # First, start the server in another terminal:
//!   cargo run --bin line-server
//!
//!   # Then run the client (defaults to http://127.0.0.1:3000):
//!   cargo run --bin line-client
//!
//!   # Or:
//!   LINECALL_ADDR=http://127.0.0.1:8080 LINECALL_CODEC=json cargo run --bin line-client

use std::convert::Infallible;
use std::time::Instant;

use futures::{StreamExt, stream};
use linecall_client::{LineClient, TextLine};
use linecall_demo::{ClientConfig, init_logging};

const SUBMITTED: [&str; 3] = ["first line", "second line", "third line"];
const REVERSED: [&str; 4] = ["abc", "Sphinx of black quartz", "", "racecar!"];

fn producer(
    lines: &'static [&'static str],
) -> impl futures::Stream<Item = Result<TextLine, Infallible>> + Send + 'static {
    stream::iter(lines.iter().map(|line| Ok(TextLine::new(*line))))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let config = ClientConfig::from_env()?;
    let client = LineClient::builder(&config.addr)
        .codec(config.codec)
        .build()?;

    println!("=== line-client ===");
    println!("Server URL: {}", config.addr);
    println!("Encoding:   {}", config.codec.name());
    println!();

    println!("Greet (unary)");
    let reply = client.greet("Ada").await?;
    println!("  {}", reply.message);
    println!();

    println!("FetchLines (server-stream)");
    let started = Instant::now();
    let mut lines = client.fetch_lines().await?;
    while let Some(line) = lines.next().await {
        println!("  [{:>6} ms] {}", started.elapsed().as_millis(), line?.line);
    }
    println!();

    println!("SubmitLines (client-stream)");
    let summary = client.submit_lines(producer(&SUBMITTED)).await?;
    println!(
        "  sent {} lines, handler took {} s",
        SUBMITTED.len(),
        summary.elapsed_seconds
    );
    println!();

    println!("ReverseLines (bidi-stream)");
    let started = Instant::now();
    let mut reversed = client.reverse_lines(producer(&REVERSED)).await?;
    while let Some(line) = reversed.next().await {
        println!("  [{:>6} ms] {:?}", started.elapsed().as_millis(), line?.line);
    }
    let state = reversed.call_state();
    println!("  sent {}, received {}", state.sent(), state.received());

    Ok(())
}
