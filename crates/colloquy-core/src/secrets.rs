//! API key storage.

use async_trait::async_trait;
use std::sync::Mutex;
use thiserror::Error;

/// Environment variable that overrides the stored key.
pub const API_KEY_ENV: &str = "COLLOQUY_API_KEY";

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("Secret storage error: {0}")]
    Storage(String),
}

#[async_trait]
pub trait SecretStore: Send + Sync + 'static {
    async fn load_secret(&self) -> Result<Option<String>, SecretError>;

    async fn save_secret(&self, secret: &str) -> Result<(), SecretError>;
}

/// Stores the API key in the OS keyring, with `COLLOQUY_API_KEY` taking
/// precedence when set.
pub struct KeyringSecretStore {
    service_name: String,
}

impl Default for KeyringSecretStore {
    fn default() -> Self {
        Self::new("colloquy")
    }
}

impl KeyringSecretStore {
    pub fn new(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
        }
    }

    fn get_username() -> String {
        whoami::username()
    }
}

#[async_trait]
impl SecretStore for KeyringSecretStore {
    async fn load_secret(&self) -> Result<Option<String>, SecretError> {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                return Ok(Some(key));
            }
        }

        let service = self.service_name.clone();
        let username = Self::get_username();
        tokio::task::spawn_blocking(move || -> Result<Option<String>, keyring::Error> {
            let entry = keyring::Entry::new(&service, &username)?;
            match entry.get_password() {
                Ok(secret) => Ok(Some(secret)),
                Err(keyring::Error::NoEntry) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(|e| SecretError::Storage(format!("Task join error: {e}")))?
        .map_err(SecretError::from)
    }

    async fn save_secret(&self, secret: &str) -> Result<(), SecretError> {
        let service = self.service_name.clone();
        let username = Self::get_username();
        let secret = secret.to_string();
        tokio::task::spawn_blocking(move || -> Result<(), keyring::Error> {
            keyring::Entry::new(&service, &username)?.set_password(&secret)
        })
        .await
        .map_err(|e| SecretError::Storage(format!("Task join error: {e}")))?
        .map_err(SecretError::from)
    }
}

/// In-memory store for tests and one-off runs.
#[derive(Default)]
pub struct MemorySecretStore {
    secret: Mutex<Option<String>>,
}

impl MemorySecretStore {
    pub fn with_secret(secret: &str) -> Self {
        Self {
            secret: Mutex::new(Some(secret.to_string())),
        }
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn load_secret(&self) -> Result<Option<String>, SecretError> {
        self.secret
            .lock()
            .map(|guard| guard.clone())
            .map_err(|e| SecretError::Storage(e.to_string()))
    }

    async fn save_secret(&self, secret: &str) -> Result<(), SecretError> {
        let mut guard = self
            .secret
            .lock()
            .map_err(|e| SecretError::Storage(e.to_string()))?;
        *guard = Some(secret.to_string());
        Ok(())
    }
}
