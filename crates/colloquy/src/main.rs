use clap::Parser;
use eyre::Result;

use colloquy::cli::{Cli, Commands};
use colloquy::commands::{
    Command,
    config::ConfigCommand,
    history::{ClearCommand, ExportCommand, ImportCommand},
    login::LoginCommand,
    models::ModelsCommand,
};
use colloquy_core::config::Config;
use colloquy_core::history::HistoryStore;
use colloquy_core::secrets::KeyringSecretStore;
use colloquy_core::upload::UploadService;
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Install color-eyre for better error reports
    color_eyre::install()?;

    let cli = Cli::parse();

    // Load .env file if it exists
    colloquy::cli::load_env()?;

    // Initialize tracing (level configured via RUST_LOG env var)
    colloquy_core::utils::tracing::init_tracing()?;

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => Config::config_path()?,
    };
    let mut config = Config::load_from(&config_path)?;
    cli.apply_overrides(&mut config)?;
    debug!(target: "colloquy::startup", path = %config_path.display(), "Configuration loaded");

    let store = HistoryStore::open(config.history_path());
    let secrets = KeyringSecretStore::default();

    match cli.command.clone().unwrap_or(Commands::Tui) {
        Commands::Tui => {
            #[cfg(feature = "ui")]
            {
                setup_signal_handlers();
                let api_key = colloquy::resolve_api_key(&secrets).await?;
                let services = colloquy::build_services(&config, &api_key)?;
                info!(
                    target: "colloquy::startup",
                    history = %config.history_path().display(),
                    "Launching TUI"
                );
                colloquy_tui::run_tui(&config, services).await?;
                Ok(())
            }
            #[cfg(not(feature = "ui"))]
            {
                eyre::bail!(
                    "Terminal UI not available. This binary was compiled without the 'ui' feature."
                );
            }
        }
        Commands::Export { output } => ExportCommand { store, output }.execute().await,
        Commands::Import { input } => ImportCommand { store, input }.execute().await,
        Commands::Clear { yes } => {
            let uploader = colloquy::uploader_from_config(&config)
                .map(|client| Box::new(client) as Box<dyn UploadService>);
            ClearCommand {
                store,
                uploader,
                confirmed: yes,
            }
            .execute()
            .await
        }
        Commands::Models => {
            let api_key = colloquy::resolve_api_key(&secrets).await?;
            let provider = colloquy::provider_from_config(&config, &api_key)?;
            ModelsCommand {
                provider: Box::new(provider),
                vision_models: config.vision_models.clone(),
                current: config.model.clone(),
            }
            .execute()
            .await
        }
        Commands::Login => {
            LoginCommand {
                store: Box::new(secrets),
            }
            .execute()
            .await
        }
        Commands::Config { action } => {
            ConfigCommand {
                action,
                path: config_path,
                effective: config,
            }
            .execute()
            .await
        }
    }
}

/// Restore the terminal when the process is told to stop while the TUI owns it.
#[cfg(feature = "ui")]
fn setup_signal_handlers() {
    #[cfg(not(windows))]
    {
        use tokio::signal::unix::{SignalKind, signal};

        tokio::spawn(async move {
            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(signal) => signal,
                Err(error) => {
                    warn!(error = %error, "Failed to set up SIGTERM handler");
                    return;
                }
            };
            sigterm.recv().await;
            colloquy_tui::tui::terminal::restore();
            std::process::exit(0);
        });
    }
    #[cfg(windows)]
    {
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                colloquy_tui::tui::terminal::restore();
                std::process::exit(0);
            }
        });
    }
}
