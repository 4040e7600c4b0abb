// Ollama backend
// Baseline engine talking to a local Ollama daemon over /api/generate

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::OllamaConfig;
use crate::error::{Result, NeuralError};
use crate::language::{detect_by_script, Language};
use super::{Engine, EngineKind, common::{build_improve_prompt, build_translation_prompt, classify_request_error, clean_translation_response}};

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
}

/// Outcome of one model attempt
enum ModelAttempt {
    Done(String),
    /// The model is not installed, try the next candidate
    Missing(String),
    Failed(NeuralError),
}

pub struct OllamaEngine {
    client: Client,
    config: OllamaConfig,
}

impl OllamaEngine {
    pub fn new(config: OllamaConfig, client: Client) -> Self {
        Self { client, config }
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.config.endpoint.trim_end_matches('/'))
    }

    fn tags_url(&self) -> String {
        format!("{}/api/tags", self.config.endpoint.trim_end_matches('/'))
    }

    async fn generate_with_model(&self, model: &str, prompt: &str) -> Result<ModelAttempt> {
        let body = json!({
            "model": model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": self.config.temperature,
                "top_p": self.config.top_p,
                "num_predict": self.config.num_predict,
                "stop": self.config.stop,
            }
        });

        let response = self.client
            .post(self.generate_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_request_error(EngineKind::Ollama, &self.config.endpoint, e))?;

        let status = response.status();
        debug!("Ollama response status for {}: {}", model, status);

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            if status == StatusCode::NOT_FOUND || error_text.contains("model") {
                return Ok(ModelAttempt::Missing(format!("{} ({}): {}", model, status, error_text)));
            }
            return Ok(ModelAttempt::Failed(NeuralError::Transport {
                engine: EngineKind::Ollama,
                message: format!("Ollama API error {}: {}", status, error_text),
            }));
        }

        match response.json::<GenerateResponse>().await {
            Ok(parsed) => Ok(ModelAttempt::Done(parsed.response)),
            Err(e) => Ok(ModelAttempt::Failed(NeuralError::Transport {
                engine: EngineKind::Ollama,
                message: format!("Failed to parse response from {}: {}", model, e),
            })),
        }
    }

    /// Run `prompt` on each candidate model in order until one answers.
    ///
    /// Only a refused connection ends the loop early; timeouts and other
    /// per-model failures move on to the next candidate.
    async fn generate(&self, prompt: &str, source: &str) -> Result<String> {
        let mut last_failure: Option<NeuralError> = None;

        for model in &self.config.models {
            debug!("Trying Ollama model: {}", model);

            let attempt = match self.generate_with_model(model, prompt).await {
                Ok(attempt) => attempt,
                Err(e @ NeuralError::ConnectionRefused { .. }) => return Err(e),
                Err(e) => ModelAttempt::Failed(e),
            };

            match attempt {
                ModelAttempt::Done(raw) => {
                    let cleaned = clean_translation_response(source, &raw);
                    if cleaned.is_empty() {
                        last_failure = Some(NeuralError::Transport {
                            engine: EngineKind::Ollama,
                            message: format!("Empty response received from {}", model),
                        });
                        continue;
                    }
                    info!("Ollama generation succeeded with model {}", model);
                    return Ok(cleaned);
                }
                ModelAttempt::Missing(detail) => {
                    debug!("Ollama model unavailable: {}", detail);
                }
                ModelAttempt::Failed(e) => {
                    warn!("Ollama model {} failed: {}", model, e);
                    last_failure = Some(e);
                }
            }
        }

        Err(last_failure.unwrap_or_else(|| NeuralError::MissingCapability {
            engine: EngineKind::Ollama,
            message: format!("please install one of: {}", self.config.models.join(", ")),
        }))
    }

    /// Installed models that are also in the candidate list
    pub async fn available_models(&self) -> Result<Vec<String>> {
        let response = self.client
            .get(self.tags_url())
            .send()
            .await
            .map_err(|e| classify_request_error(EngineKind::Ollama, &self.config.endpoint, e))?;

        if !response.status().is_success() {
            return Err(NeuralError::Transport {
                engine: EngineKind::Ollama,
                message: format!("Ollama API returned {}", response.status()),
            });
        }

        let tags: TagsResponse = response.json().await?;
        Ok(self.config.models
            .iter()
            .filter(|candidate| tags.models.iter().any(|m| model_matches(&m.name, candidate)))
            .cloned()
            .collect())
    }
}

/// "phi4-mini" matches an installed "phi4-mini:latest"
fn model_matches(installed: &str, candidate: &str) -> bool {
    installed == candidate
        || installed
            .strip_prefix(candidate)
            .is_some_and(|rest| rest.starts_with(':'))
}

#[async_trait]
impl Engine for OllamaEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Ollama
    }

    async fn detect_language(&self, text: &str) -> Result<Language> {
        Ok(detect_by_script(text))
    }

    async fn translate(&self, text: &str, from: Language, to: Language) -> Result<String> {
        self.generate(&build_translation_prompt(text, from, to), text).await
    }

    async fn improve(&self, text: &str, language: Language) -> Result<String> {
        self.generate(&build_improve_prompt(text, language), text).await
    }

    async fn check_health(&self) -> bool {
        match self.available_models().await {
            Ok(models) if !models.is_empty() => {
                debug!("Ollama is healthy, models available: {}", models.join(", "));
                true
            }
            Ok(_) => {
                warn!("Ollama is running but none of the configured models are installed");
                false
            }
            Err(e) => {
                debug!("Ollama health check failed: {}", e);
                false
            }
        }
    }
}
