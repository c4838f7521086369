//! Custom data files listed in the `dataPaths` initialization option

use std::path::Path;

use tracing::{info, warn};

use crate::service::types::CustomData;

/// Reads every data file, skipping the ones that cannot be read or parsed.
pub async fn load_custom_data(paths: &[String]) -> Vec<CustomData> {
    let mut loaded = Vec::with_capacity(paths.len());
    for path in paths {
        match load_file(Path::new(path)).await {
            Ok(data) => {
                info!(
                    "Loaded custom data from {}: {} properties, {} at-directives",
                    path,
                    data.properties.len(),
                    data.at_directives.len()
                );
                loaded.push(data);
            }
            Err(e) => warn!("Failed to load custom data from {}: {:#}", path, e),
        }
    }
    loaded
}

async fn load_file(path: &Path) -> anyhow::Result<CustomData> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&content)?)
}
