use crate::config::LlmConfig;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;

const DEFAULT_OPENAI_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_DEEPSEEK_BASE: &str = "https://api.deepseek.com/v1";

/// A single-turn chat completion. Providers that answer without any text
/// yield an empty string rather than an error.
#[async_trait]
pub trait LlmClient: Send + Sync + Debug {
    async fn chat(&self, system: &str, user: &str) -> Result<String>;
}

/// Sampling knobs shared by every provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sampling {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

pub fn create_llm(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    let sampling = Sampling {
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    };
    match config.provider.as_str() {
        "gemini" => {
            let cfg = config.gemini.as_ref().context("Gemini config missing")?;
            Ok(Arc::new(GeminiClient::new(&cfg.api_key, &cfg.model, sampling)))
        }
        "ollama" => {
            let cfg = config.ollama.as_ref().context("Ollama config missing")?;
            Ok(Arc::new(OllamaClient::new(&cfg.base_url, &cfg.model, sampling)))
        }
        "openai" => {
            let cfg = config.openai.as_ref().context("OpenAI config missing")?;
            let base = cfg.base_url.as_deref().unwrap_or(DEFAULT_OPENAI_BASE);
            Ok(Arc::new(OpenAIClient::new(&cfg.api_key, &cfg.model, base, sampling)))
        }
        // DeepSeek speaks the OpenAI chat-completions dialect.
        "deepseek" => {
            let cfg = config.deepseek.as_ref().context("DeepSeek config missing")?;
            let base = cfg.base_url.as_deref().unwrap_or(DEFAULT_DEEPSEEK_BASE);
            Ok(Arc::new(OpenAIClient::new(&cfg.api_key, &cfg.model, base, sampling)))
        }
        _ => Err(anyhow!("Unknown LLM provider: {}", config.provider)),
    }
}

// --- Gemini ---
#[derive(Debug)]
struct GeminiClient {
    api_key: String,
    model: String,
    sampling: Sampling,
    client: reqwest::Client,
}

impl GeminiClient {
    fn new(api_key: &str, model: &str, sampling: Sampling) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            sampling,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystemInstruction>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize)]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(rename = "maxOutputTokens", skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiError>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContentResponse>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Deserialize)]
struct GeminiPartResponse {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize, Debug)]
struct GeminiError {
    message: String,
}

/// Concatenates the text parts of the first candidate. A candidate without
/// parts (blocked, truncated) is reported as empty text.
fn gemini_text(response: GeminiResponse) -> Result<String> {
    if let Some(err) = response.error {
        return Err(anyhow!("Gemini API returned error: {}", err.message));
    }
    let candidate = response
        .candidates
        .and_then(|c| c.into_iter().next())
        .context("Gemini response has no candidates")?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        log::warn!(
            "Gemini returned no text. Finish reason: {}",
            candidate.finish_reason.as_deref().unwrap_or("UNKNOWN")
        );
    }
    Ok(text)
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn chat(&self, system: &str, user: &str) -> Result<String> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, self.api_key
        );

        let generation_config = (self.sampling.temperature.is_some()
            || self.sampling.max_tokens.is_some())
        .then(|| GeminiGenerationConfig {
            temperature: self.sampling.temperature,
            max_output_tokens: self.sampling.max_tokens,
        });

        let request_body = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart { text: user.to_string() }],
            }],
            system_instruction: Some(GeminiSystemInstruction {
                parts: vec![GeminiPart { text: system.to_string() }],
            }),
            generation_config,
        };

        let resp = self.client.post(&url).json(&request_body).send().await?;

        if !resp.status().is_success() {
            let error_text = resp.text().await?;
            return Err(anyhow!("Gemini API error: {}", error_text));
        }

        let response_text = resp.text().await?;
        let result: GeminiResponse = serde_json::from_str(&response_text).with_context(|| {
            format!("Failed to parse Gemini response. Body: {}", response_text)
        })?;
        gemini_text(result)
    }
}

// --- Ollama ---
#[derive(Debug)]
struct OllamaClient {
    base_url: String,
    model: String,
    sampling: Sampling,
    client: reqwest::Client,
}

impl OllamaClient {
    fn new(base_url: &str, model: &str, sampling: Sampling) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            sampling,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

impl ChatMessage {
    fn pair(system: &str, user: &str) -> Vec<Self> {
        vec![
            Self { role: "system".to_string(), content: system.to_string() },
            Self { role: "user".to_string(), content: user.to_string() },
        ]
    }
}

#[derive(Deserialize)]
struct OllamaResponse {
    message: Option<OllamaMessageResponse>,
}

#[derive(Deserialize)]
struct OllamaMessageResponse {
    #[serde(default)]
    content: String,
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn chat(&self, system: &str, user: &str) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);

        let options = (self.sampling.temperature.is_some() || self.sampling.max_tokens.is_some())
            .then(|| OllamaOptions {
                temperature: self.sampling.temperature,
                num_predict: self.sampling.max_tokens,
            });

        let request_body = OllamaRequest {
            model: self.model.clone(),
            messages: ChatMessage::pair(system, user),
            stream: false,
            options,
        };

        let resp = self.client.post(&url).json(&request_body).send().await?;

        if !resp.status().is_success() {
            let error_text = resp.text().await?;
            return Err(anyhow!("Ollama API error: {}", error_text));
        }

        let result: OllamaResponse = resp.json().await?;
        Ok(result.message.map(|m| m.content).unwrap_or_default())
    }
}

// --- OpenAI compatible ---

#[derive(Debug)]
struct OpenAIClient {
    api_key: String,
    model: String,
    base_url: String,
    sampling: Sampling,
    client: reqwest::Client,
}

impl OpenAIClient {
    fn new(api_key: &str, model: &str, base_url: &str, sampling: Sampling) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            sampling,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessageResponse,
}

#[derive(Deserialize)]
struct OpenAIMessageResponse {
    content: Option<String>,
}

fn openai_text(response: OpenAIResponse) -> String {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .unwrap_or_default()
}

#[async_trait]
impl LlmClient for OpenAIClient {
    async fn chat(&self, system: &str, user: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);

        let request_body = OpenAIRequest {
            model: self.model.clone(),
            messages: ChatMessage::pair(system, user),
            temperature: self.sampling.temperature,
            max_tokens: self.sampling.max_tokens,
        };

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request_body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let error_text = resp.text().await?;
            return Err(anyhow!("Chat completion API error ({}): {}", self.base_url, error_text));
        }

        let result: OpenAIResponse = resp.json().await?;
        Ok(openai_text(result))
    }
}
