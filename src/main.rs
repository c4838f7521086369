use std::time::Duration;

use clap::Parser;
use stylesheet_lsp::config::{
    DEFAULT_MAX_CACHED_STYLESHEETS, DEFAULT_VALIDATION_DELAY_MS, ServerConfig,
};
use stylesheet_lsp::lsp::server::run_server;

/// Language server for CSS, SCSS and Less stylesheets
#[derive(Debug, Parser)]
#[command(name = "stylesheet-lsp", version, about)]
struct Args {
    /// Communicate over stdio (the only supported transport)
    #[arg(long = "stdio")]
    _stdio: bool,

    /// Quiet period after the last edit before a document is validated
    #[arg(long, default_value_t = DEFAULT_VALIDATION_DELAY_MS)]
    validation_delay_ms: u64,

    /// Number of parsed stylesheets kept in memory
    #[arg(long, default_value_t = DEFAULT_MAX_CACHED_STYLESHEETS)]
    max_cached_stylesheets: usize,
}

impl Args {
    fn server_config(&self) -> ServerConfig {
        let mut config = ServerConfig {
            validation_delay: Duration::from_millis(self.validation_delay_ms),
            ..Default::default()
        };
        config.cache_limits.max_entries = Some(self.max_cached_stylesheets);
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    run_server(args.server_config()).await
}
