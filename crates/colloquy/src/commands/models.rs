use super::Command;
use crate::error::Result as CliResult;
use async_trait::async_trait;
use colloquy_core::api::{CompletionProvider, ModelInfo};
use colloquy_core::pipeline::classify_models;
use eyre::Result;
use std::io::Write;

pub struct ModelsCommand {
    pub provider: Box<dyn CompletionProvider>,
    pub vision_models: Vec<String>,
    pub current: Option<String>,
}

impl ModelsCommand {
    pub async fn run(&self, out: &mut (impl Write + Send)) -> CliResult<Vec<ModelInfo>> {
        let models = classify_models(self.provider.list_models().await?, &self.vision_models);
        let width = models.iter().map(|m| m.id.len()).max().unwrap_or(0);
        for model in &models {
            let marker = if self.current.as_deref() == Some(model.id.as_str()) {
                "*"
            } else {
                " "
            };
            writeln!(
                out,
                "{marker} {:<width$}  {}",
                model.id,
                model.kind.label(),
                width = width
            )?;
        }
        if models.is_empty() {
            writeln!(out, "No models available")?;
        }
        Ok(models)
    }
}

#[async_trait]
impl Command for ModelsCommand {
    async fn execute(&self) -> Result<()> {
        self.run(&mut std::io::stdout()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colloquy_core::api::{ApiError, CompletionRequest, ModelKind};
    use uuid::Uuid;

    struct FixedModels;

    #[async_trait]
    impl CompletionProvider for FixedModels {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn complete(
            &self,
            _request: &CompletionRequest,
            _request_id: Uuid,
        ) -> std::result::Result<String, ApiError> {
            Ok(String::new())
        }

        async fn list_models(&self) -> std::result::Result<Vec<ModelInfo>, ApiError> {
            Ok(vec![
                ModelInfo::new("llama", ModelKind::Chat),
                ModelInfo::new("llava", ModelKind::Chat),
                ModelInfo::new("bge", ModelKind::Embedding),
            ])
        }

        async fn embed(&self, _model: &str, _input: &str) -> std::result::Result<Vec<f32>, ApiError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn lists_models_with_kinds_and_marks_current() {
        let command = ModelsCommand {
            provider: Box::new(FixedModels),
            vision_models: vec!["llava".to_string()],
            current: Some("llama".to_string()),
        };
        let mut out = Vec::new();
        let models = command.run(&mut out).await.unwrap();
        assert_eq!(models[1].kind, ModelKind::Vision);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["* llama  Chat", "  llava  Vision", "  bge    Embedding"]);
    }
}
