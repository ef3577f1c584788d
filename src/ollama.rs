//! Blocking HTTP client for a local Ollama instance.
//!
//! Two seams sit on top of it: `LlmClient` (text generation, used for
//! suggestions) and `VisionClient` (image chat, used for OCR). Both are
//! traits so the pipeline can run against mocks.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Cannot reach Ollama at {0}")]
    Connection(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Ollama returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Unreadable Ollama response: {0}")]
    ResponseParsing(String),
}

/// Text generation.
pub trait LlmClient {
    /// `json_format` asks the server to constrain output to valid JSON.
    fn generate(
        &self,
        model: &str,
        prompt: &str,
        system: &str,
        json_format: bool,
    ) -> Result<String, LlmError>;
}

/// Multimodal chat with base64-encoded images.
pub trait VisionClient {
    fn chat_with_images(
        &self,
        model: &str,
        prompt: &str,
        images: &[String],
        system: Option<&str>,
    ) -> Result<String, LlmError>;
}

pub struct OllamaClient {
    base_url: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OllamaClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, LlmError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| LlmError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<reqwest::blocking::Response, LlmError> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    fn map_send_error(&self, e: reqwest::Error) -> LlmError {
        if e.is_connect() {
            LlmError::Connection(self.base_url.clone())
        } else if e.is_timeout() {
            LlmError::Timeout(self.timeout_secs)
        } else {
            LlmError::HttpClient(e.to_string())
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<&'a [String]>,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl LlmClient for OllamaClient {
    fn generate(
        &self,
        model: &str,
        prompt: &str,
        system: &str,
        json_format: bool,
    ) -> Result<String, LlmError> {
        let body = GenerateRequest {
            model,
            prompt,
            system,
            stream: false,
            format: json_format.then_some("json"),
        };

        let parsed: GenerateResponse = self
            .post("/api/generate", &body)?
            .json()
            .map_err(|e| LlmError::ResponseParsing(e.to_string()))?;

        Ok(parsed.response)
    }
}

impl VisionClient for OllamaClient {
    fn chat_with_images(
        &self,
        model: &str,
        prompt: &str,
        images: &[String],
        system: Option<&str>,
    ) -> Result<String, LlmError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
                images: None,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
            images: Some(images),
        });

        let body = ChatRequest {
            model,
            messages,
            stream: false,
        };

        let parsed: ChatResponse = self
            .post("/api/chat", &body)?
            .json()
            .map_err(|e| LlmError::ResponseParsing(e.to_string()))?;

        Ok(parsed.message.content)
    }
}

/// Mock client for testing: returns a configured response or error text.
pub struct MockLlmClient {
    response: Result<String, String>,
}

impl MockLlmClient {
    pub fn new(response: &str) -> Self {
        Self {
            response: Ok(response.to_string()),
        }
    }

    /// Every call fails as if Ollama were unreachable.
    pub fn unreachable() -> Self {
        Self {
            response: Err("http://localhost:11434".to_string()),
        }
    }

    fn reply(&self) -> Result<String, LlmError> {
        self.response.clone().map_err(LlmError::Connection)
    }
}

impl LlmClient for MockLlmClient {
    fn generate(
        &self,
        _model: &str,
        _prompt: &str,
        _system: &str,
        _json_format: bool,
    ) -> Result<String, LlmError> {
        self.reply()
    }
}

impl VisionClient for MockLlmClient {
    fn chat_with_images(
        &self,
        _model: &str,
        _prompt: &str,
        _images: &[String],
        _system: Option<&str>,
    ) -> Result<String, LlmError> {
        self.reply()
    }
}
