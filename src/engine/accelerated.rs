// Accelerated backend
// Local OpenAI-compatible chat server (llama.cpp server, mlx_lm.server, ...)

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::AcceleratedConfig;
use crate::error::{Result, NeuralError};
use crate::language::{detect_by_script, Language};
use super::{Engine, EngineKind, common::{build_detection_prompt, build_improve_prompt, classify_request_error, clean_translation_response, parse_detection_reply, translation_instructions}};

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

pub struct AcceleratedEngine {
    client: Client,
    config: AcceleratedConfig,
}

impl AcceleratedEngine {
    pub fn new(config: AcceleratedConfig, client: Client) -> Self {
        Self { client, config }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    async fn chat(&self, system: &str, user: &str, max_tokens: u32) -> Result<String> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: user },
            ],
            temperature: self.config.temperature,
            max_tokens,
            stream: false,
        };

        let response = self.client
            .post(self.url("/v1/chat/completions"))
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_request_error(EngineKind::Accelerated, &self.config.endpoint, e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            if status == StatusCode::NOT_FOUND {
                return Err(NeuralError::MissingCapability {
                    engine: EngineKind::Accelerated,
                    message: format!("model '{}' not served: {}", self.config.model, error_text),
                });
            }
            return Err(NeuralError::Transport {
                engine: EngineKind::Accelerated,
                message: format!("server error {}: {}", status, error_text),
            });
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| NeuralError::Transport {
            engine: EngineKind::Accelerated,
            message: format!("Failed to parse response: {}", e),
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| NeuralError::Transport {
                engine: EngineKind::Accelerated,
                message: "response contained no choices".to_string(),
            })
    }

    fn serves_configured_model(&self, models: &[ModelEntry]) -> bool {
        // Single-model servers usually ignore the model name
        self.config.model == "default" || models.iter().any(|m| m.id == self.config.model)
    }
}

#[async_trait]
impl Engine for AcceleratedEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Accelerated
    }

    async fn detect_language(&self, text: &str) -> Result<Language> {
        let reply = self
            .chat("You are a language identification tool.", &build_detection_prompt(text), 8)
            .await?;

        match parse_detection_reply(&reply) {
            Some(language) => Ok(language),
            None => {
                debug!("Unparseable detection reply {:?}, using script heuristic", reply);
                Ok(detect_by_script(text))
            }
        }
    }

    async fn translate(&self, text: &str, from: Language, to: Language) -> Result<String> {
        let instructions = translation_instructions(from, to);
        let raw = self.chat(&instructions, text, self.config.max_tokens).await?;
        let translated = clean_translation_response(text, &raw);

        if translated.is_empty() {
            return Err(NeuralError::Transport {
                engine: EngineKind::Accelerated,
                message: "Empty translation received".to_string(),
            });
        }

        Ok(translated)
    }

    async fn improve(&self, text: &str, language: Language) -> Result<String> {
        let prompt = build_improve_prompt(text, language);
        let raw = self.chat("You are a careful proofreader.", &prompt, self.config.max_tokens).await?;
        let improved = clean_translation_response(text, &raw);

        if improved.is_empty() {
            return Err(NeuralError::Transport {
                engine: EngineKind::Accelerated,
                message: "Empty response received".to_string(),
            });
        }

        Ok(improved)
    }

    async fn check_health(&self) -> bool {
        let response = match self.client.get(self.url("/v1/models")).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!("Accelerated server health check failed: {}", e);
                return false;
            }
        };

        if !response.status().is_success() {
            debug!("Accelerated server returned {}", response.status());
            return false;
        }

        match response.json::<ModelsResponse>().await {
            Ok(models) if !models.data.is_empty() => {
                if self.serves_configured_model(&models.data) {
                    true
                } else {
                    warn!("Accelerated server does not serve model '{}'", self.config.model);
                    false
                }
            }
            Ok(_) => false,
            Err(e) => {
                debug!("Failed to read accelerated model list: {}", e);
                false
            }
        }
    }
}
