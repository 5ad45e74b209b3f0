//! Environment configuration and logging setup shared by the demo binaries.

use std::net::SocketAddr;

use anyhow::{Context, bail};
use linecall::{DemoConfig, Pacing};
use linecall_client::Codec;

/// Server settings, read from `PORT`, `LINECALL_FETCH_PACING_MS` and
/// `LINECALL_REVERSE_PACING_MS`.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub port: u16,
    pub fetch_pacing: Pacing,
    pub reverse_pacing: Pacing,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            fetch_pacing: Pacing::fixed(linecall::demo::DEFAULT_FETCH_PACING),
            reverse_pacing: Pacing::fixed(linecall::demo::DEFAULT_REVERSE_PACING),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = Self::default();
        if let Some(port) = lookup("PORT") {
            config.port = port
                .trim()
                .parse()
                .with_context(|| format!("invalid PORT {port:?}"))?;
        }
        if let Some(ms) = lookup("LINECALL_FETCH_PACING_MS") {
            config.fetch_pacing = parse_pacing("LINECALL_FETCH_PACING_MS", &ms)?;
        }
        if let Some(ms) = lookup("LINECALL_REVERSE_PACING_MS") {
            config.reverse_pacing = parse_pacing("LINECALL_REVERSE_PACING_MS", &ms)?;
        }
        Ok(config)
    }

    /// Listen on all interfaces.
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }

    pub fn service_config(&self) -> DemoConfig {
        DemoConfig::default()
            .fetch_pacing(self.fetch_pacing)
            .reverse_pacing(self.reverse_pacing)
    }
}

fn parse_pacing(key: &str, value: &str) -> anyhow::Result<Pacing> {
    let millis: u64 = value
        .trim()
        .parse()
        .with_context(|| format!("invalid {key} {value:?}"))?;
    Ok(Pacing::from_millis(millis))
}

/// Client settings, read from `LINECALL_ADDR` and `LINECALL_CODEC`.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub addr: String,
    pub codec: Codec,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            addr: "http://127.0.0.1:3000".to_string(),
            codec: Codec::Proto,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = Self::default();
        if let Some(addr) = lookup("LINECALL_ADDR") {
            config.addr = addr.trim().to_string();
        }
        if let Some(codec) = lookup("LINECALL_CODEC") {
            let Some(parsed) = Codec::from_name(&codec) else {
                bail!("invalid LINECALL_CODEC {codec:?}: expected proto or json");
            };
            config.codec = parsed;
        }
        Ok(config)
    }
}

/// Install the `fmt` subscriber filtered by `RUST_LOG`, defaulting to `info`.
pub fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();
}
