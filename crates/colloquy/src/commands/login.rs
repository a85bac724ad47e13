use super::Command;
use crate::error::{Error, Result as CliResult};
use async_trait::async_trait;
use colloquy_core::secrets::SecretStore;
use eyre::Result;
use std::io::{BufRead, Write};

/// Stores an API key read from standard input.
pub struct LoginCommand {
    pub store: Box<dyn SecretStore>,
}

impl LoginCommand {
    pub fn read_key(input: &mut impl BufRead, out: &mut impl Write) -> CliResult<String> {
        write!(out, "API key: ")?;
        out.flush()?;
        let mut line = String::new();
        input.read_line(&mut line)?;
        let key = line.trim();
        if key.is_empty() {
            return Err(Error::Config("No API key entered".to_string()));
        }
        Ok(key.to_string())
    }

    pub async fn save(&self, key: &str) -> CliResult<()> {
        self.store.save_secret(key).await?;
        Ok(())
    }
}

#[async_trait]
impl Command for LoginCommand {
    async fn execute(&self) -> Result<()> {
        let mut stdout = std::io::stdout();
        let key = Self::read_key(&mut std::io::stdin().lock(), &mut stdout)?;
        self.save(&key).await?;
        writeln!(stdout, "API key saved")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colloquy_core::secrets::MemorySecretStore;
    use std::io::Cursor;
    use std::sync::Arc;

    struct Shared(Arc<MemorySecretStore>);

    #[async_trait]
    impl SecretStore for Shared {
        async fn load_secret(
            &self,
        ) -> std::result::Result<Option<String>, colloquy_core::secrets::SecretError> {
            self.0.load_secret().await
        }

        async fn save_secret(
            &self,
            secret: &str,
        ) -> std::result::Result<(), colloquy_core::secrets::SecretError> {
            self.0.save_secret(secret).await
        }
    }

    #[tokio::test]
    async fn saves_trimmed_key() {
        let inner = Arc::new(MemorySecretStore::default());
        let command = LoginCommand {
            store: Box::new(Shared(inner.clone())),
        };
        let key = LoginCommand::read_key(&mut Cursor::new("  sk-abc \n"), &mut Vec::new()).unwrap();
        command.save(&key).await.unwrap();
        assert_eq!(inner.load_secret().await.unwrap().as_deref(), Some("sk-abc"));
    }

    #[test]
    fn rejects_blank_input() {
        let mut out = Vec::new();
        assert!(LoginCommand::read_key(&mut Cursor::new("\n"), &mut out).is_err());
        assert_eq!(out, b"API key: ");
    }
}
