use std::path::PathBuf;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Log filter override; falls back to `RUST_LOG`, then `info`.
pub const LOG_ENV: &str = "RECORDSD_LOG";

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub workspace: Option<PathBuf>,
}

impl Config {
    /// The only positional argument is an optional workspace directory to open at startup.
    pub fn from_args<I>(args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let workspace = args
            .into_iter()
            .skip(1)
            .find(|a| !a.trim().is_empty())
            .map(PathBuf::from);
        Self { workspace }
    }
}

pub fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // stdout carries the protocol, so logs go to stderr.
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}
