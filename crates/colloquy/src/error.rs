use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No API key found. Run `colloquy login` or set {env}")]
    MissingApiKey { env: &'static str },

    #[error(transparent)]
    Core(#[from] colloquy_core::error::Error),

    #[cfg(feature = "ui")]
    #[error(transparent)]
    Tui(#[from] colloquy_tui::error::Error),
}

impl From<colloquy_core::error::PersistenceError> for Error {
    fn from(e: colloquy_core::error::PersistenceError) -> Self {
        Error::Core(e.into())
    }
}

impl From<colloquy_core::api::ApiError> for Error {
    fn from(e: colloquy_core::api::ApiError) -> Self {
        Error::Core(e.into())
    }
}

impl From<colloquy_core::secrets::SecretError> for Error {
    fn from(e: colloquy_core::secrets::SecretError) -> Self {
        Error::Core(e.into())
    }
}
