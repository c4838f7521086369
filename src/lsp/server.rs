use crate::config::{ServerConfig, log_path};
use crate::log::init;
use tower_lsp::{LspService, Server};
use tracing::info;

use crate::lsp::backend::Backend;

pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    init()?;

    info!("Logging to {}", log_path().display());
    info!(
        "Starting stylesheet-lsp server (validation delay {:?}, cache limits {:?})",
        config.validation_delay, config.cache_limits
    );

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::new(move |client| Backend::with_config(client, config));
    Server::new(stdin, stdout, socket).serve(service).await;

    info!("stylesheet-lsp server stopped");
    Ok(())
}
