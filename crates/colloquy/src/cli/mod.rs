pub mod args;

pub use args::{Cli, Commands, ConfigCommands};

use eyre::Result;

/// Load a `.env` file from the working directory if there is one.
pub fn load_env() -> Result<()> {
    dotenvy::dotenv().ok();
    Ok(())
}
