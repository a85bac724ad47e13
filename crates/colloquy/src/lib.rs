pub mod cli;
pub mod commands;
pub mod error;

pub use colloquy_core::{api, config, history, message, utils};

use colloquy_core::api::OpenAiCompatibleClient;
use colloquy_core::config::Config;
use colloquy_core::secrets::{API_KEY_ENV, SecretStore};
use colloquy_core::upload::HttpUploadClient;
use tracing::warn;

use crate::error::{Error, Result};

/// Read the API key from the secret store (the environment variable wins).
pub async fn resolve_api_key(store: &dyn SecretStore) -> Result<String> {
    match store.load_secret().await? {
        Some(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(Error::MissingApiKey { env: API_KEY_ENV }),
    }
}

pub fn provider_from_config(config: &Config, api_key: &str) -> Result<OpenAiCompatibleClient> {
    Ok(OpenAiCompatibleClient::new(
        api_key,
        &config.base_url,
        config.request_timeout(),
    )?)
}

/// Upload sidecar client. A client that cannot be built only disables uploads.
pub fn uploader_from_config(config: &Config) -> Option<HttpUploadClient> {
    match HttpUploadClient::new(&config.upload_server_url, config.request_timeout()) {
        Ok(client) => Some(client),
        Err(e) => {
            warn!(target: "colloquy::startup", "Upload client unavailable: {}", e);
            None
        }
    }
}

#[cfg(feature = "ui")]
pub fn build_services(config: &Config, api_key: &str) -> Result<colloquy_tui::Services> {
    use colloquy_core::attachments::ThumbnailLoader;
    use colloquy_core::history::HistoryStore;
    use colloquy_core::upload::UploadService;
    use std::sync::Arc;

    let provider = provider_from_config(config, api_key)?;
    let uploader =
        uploader_from_config(config).map(|client| Arc::new(client) as Arc<dyn UploadService>);
    let thumbnails = match ThumbnailLoader::new(
        config.uploads_prefix(),
        config.upload_path(),
        config.request_timeout(),
    ) {
        Ok(loader) => Some(loader),
        Err(e) => {
            warn!(target: "colloquy::startup", "Thumbnails disabled: {}", e);
            None
        }
    };

    Ok(colloquy_tui::Services {
        provider: Arc::new(provider),
        uploader,
        thumbnails,
        store: HistoryStore::open(config.history_path()),
    })
}
