use crate::error::GatewayError;
use crate::models::ChatMessage;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_EMBED_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_IMAGE_MODEL: &str = "gpt-image-1";
pub const DEFAULT_EMBED_BATCH_SIZE: usize = 16;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const RATE_LIMIT_RETRY_DELAY: Duration = Duration::from_secs(2);
const ERROR_BODY_LIMIT: usize = 400;

#[async_trait]
pub trait ChatClient {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, GatewayError>;
}

#[async_trait]
pub trait EmbeddingClient {
    /// Embedding model identifier, recorded in the index so queries against
    /// vectors from a different model can be rejected.
    fn model(&self) -> &str;

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, GatewayError>;
}

#[async_trait]
pub trait ImageClient {
    async fn generate_image(&self, prompt: &str, size: &str) -> Result<Vec<u8>, GatewayError>;
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub api_key: String,
    pub chat_model: String,
    pub embed_model: String,
    pub image_model: String,
    pub embed_batch_size: usize,
}

impl GatewayConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            embed_batch_size: DEFAULT_EMBED_BATCH_SIZE,
        }
    }

    pub fn from_env() -> Result<Self, GatewayError> {
        let api_key = read_env("OPENAI_API_KEY").ok_or(GatewayError::MissingApiKey)?;
        let mut config = Self::new(api_key);

        if let Some(base_url) = read_env("OPENAI_BASE_URL") {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(model) = read_env("CHAT_MODEL") {
            config.chat_model = model;
        }
        if let Some(model) = read_env("EMBEDDING_MODEL") {
            config.embed_model = model;
        }
        if let Some(model) = read_env("IMAGE_MODEL") {
            config.image_model = model;
        }

        Url::parse(&config.base_url)?;
        Ok(config)
    }
}

fn read_env(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|value| {
        let trimmed = value.trim().to_string();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    })
}

/// HTTP client for an OpenAI-compatible API covering the three collaborator
/// contracts: chat completion, embedding, and image generation.
pub struct OpenAiGateway {
    config: GatewayConfig,
    client: Client,
}

impl OpenAiGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { config, client })
    }

    pub fn from_env() -> Result<Self, GatewayError> {
        Self::new(GatewayConfig::from_env()?)
    }

    async fn post_json<T: Serialize>(
        &self,
        path: &str,
        operation: &'static str,
        payload: &T,
    ) -> Result<reqwest::Response, GatewayError> {
        let response = self
            .client
            .post(format!("{}/{}", self.config.base_url, path))
            .bearer_auth(&self.config.api_key)
            .json(payload)
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(response);
        }

        Err(api_error(operation, &response.status(), read_error_body(response).await))
    }

    async fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>, GatewayError> {
        let payload = EmbeddingsRequest {
            model: &self.config.embed_model,
            input: batch,
        };

        let mut response = self
            .client
            .post(format!("{}/embeddings", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await?;

        // One bounded retry on a rate-limit signal before surfacing.
        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            tokio::time::sleep(RATE_LIMIT_RETRY_DELAY).await;
            response = self
                .client
                .post(format!("{}/embeddings", self.config.base_url))
                .bearer_auth(&self.config.api_key)
                .json(&payload)
                .send()
                .await?;
        }

        if !response.status().is_success() {
            let status = response.status();
            return Err(api_error("embeddings", &status, read_error_body(response).await));
        }

        let parsed: EmbeddingsResponse = response.json().await?;
        let mut data = parsed.data;
        data.sort_by_key(|datum| datum.index);
        Ok(data.into_iter().map(|datum| datum.embedding).collect())
    }
}

#[async_trait]
impl ChatClient for OpenAiGateway {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, GatewayError> {
        let payload = ChatRequest {
            model: &self.config.chat_model,
            messages,
        };

        let response = self.post_json("chat/completions", "chat", &payload).await?;
        let parsed: ChatResponse = response.json().await?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(GatewayError::EmptyResponse("chat"))
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiGateway {
    fn model(&self) -> &str {
        &self.config.embed_model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, GatewayError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let clean = sanitize_inputs(texts);
        let mut vectors = Vec::with_capacity(clean.len());
        for batch in batch_inputs(&clean, self.config.embed_batch_size) {
            vectors.extend(self.embed_batch(batch).await?);
        }
        Ok(vectors)
    }
}

#[async_trait]
impl ImageClient for OpenAiGateway {
    async fn generate_image(&self, prompt: &str, size: &str) -> Result<Vec<u8>, GatewayError> {
        let payload = ImageRequest {
            model: &self.config.image_model,
            prompt,
            size,
        };

        let response = self
            .post_json("images/generations", "images", &payload)
            .await?;
        let parsed: ImageResponse = response.json().await?;

        let datum = parsed
            .data
            .into_iter()
            .next()
            .ok_or(GatewayError::EmptyResponse("images"))?;
        Ok(STANDARD.decode(datum.b64_json)?)
    }
}

/// The embeddings service rejects literal empty strings, so blank inputs are
/// replaced with a single-space placeholder.
pub fn sanitize_inputs(texts: &[String]) -> Vec<String> {
    texts
        .iter()
        .map(|text| {
            if text.trim().is_empty() {
                " ".to_string()
            } else {
                text.clone()
            }
        })
        .collect()
}

/// Partitions sanitized inputs into request-sized batches, preserving order.
/// A zero batch size degrades to one input per request.
pub fn batch_inputs(texts: &[String], batch_size: usize) -> impl Iterator<Item = &[String]> {
    texts.chunks(batch_size.max(1))
}

fn api_error(operation: &'static str, status: &StatusCode, details: String) -> GatewayError {
    GatewayError::Api {
        operation,
        status: Some(status.as_u16()),
        details,
    }
}

async fn read_error_body(response: reqwest::Response) -> String {
    let body = response.text().await.unwrap_or_default();
    let mut details = body.trim().to_string();
    details.truncate(ERROR_BODY_LIMIT);
    details
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    size: &'a str,
}

#[derive(Deserialize)]
struct ImageResponse {
    data: Vec<ImageDatum>,
}

#[derive(Deserialize)]
struct ImageDatum {
    b64_json: String,
}
