use crate::types::{ChatMessage, MessageRole};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Connection establishment bound for streaming calls, where the overall
/// timeout cannot apply because the body arrives incrementally.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model server is not reachable")]
    ServerUnreachable,
    #[error("inference timed out after {seconds} seconds")]
    Timeout { seconds: u64 },
    #[error("model '{model}' not found on the server")]
    ModelNotFound { model: String },
    #[error("model server returned status {status}")]
    Upstream { status: StatusCode },
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),
    #[error("model server returned invalid response: {0}")]
    InvalidResponse(String),
}

impl ModelError {
    /// User-facing rendition with a recognizable failure marker. The
    /// presentation layers print this instead of the raw error chain.
    pub fn user_message(&self) -> String {
        match self {
            ModelError::ServerUnreachable => {
                "Error: Model server is not running. Please start the model server.".to_string()
            }
            ModelError::Timeout { seconds } => format!(
                "Error: Model inference timed out after {seconds} seconds. \
                 Try reducing text length or number of questions."
            ),
            ModelError::ModelNotFound { model } => {
                format!("Error: Model '{model}' not found in model repository.")
            }
            ModelError::Upstream { status } => {
                format!("Error: Model server request failed with status {}.", status.as_u16())
            }
            ModelError::Network(_) => {
                "Error: A network error occurred while contacting the model server.".to_string()
            }
            ModelError::InvalidResponse(_) => {
                "Error: The model server returned a response that could not be processed."
                    .to_string()
            }
        }
    }
}

/// Backend able to turn a prompt into generated text.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn generate(&self, prompt: &str, model: &str) -> Result<String, ModelError>;

    /// Streaming variant; backends without incremental delivery fall back to
    /// the blocking call.
    async fn generate_streaming(&self, prompt: &str, model: &str) -> Result<String, ModelError> {
        self.generate(prompt, model).await
    }

    async fn list_models(&self) -> Result<Vec<String>, ModelError> {
        Ok(Vec::new())
    }
}

/// Client for a local Ollama-style model server.
///
/// Requests go to `/api/chat` first; a 404 there (older servers, or models
/// exposed only through the plain completion route) triggers exactly one
/// retry against `/api/generate` with the same prompt.
#[derive(Clone)]
pub struct OllamaClient {
    http: Client,
    base_url: String,
    timeout: Duration,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Self {
        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self::with_client(base_url, timeout_secs, http)
    }

    pub fn with_client(base_url: impl Into<String>, timeout_secs: u64, client: Client) -> Self {
        Self {
            http: client,
            base_url: base_url.into(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        let trimmed = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{trimmed}/{path}")
    }

    fn classify(&self, err: reqwest::Error) -> ModelError {
        if err.is_connect() {
            ModelError::ServerUnreachable
        } else if err.is_timeout() {
            ModelError::Timeout {
                seconds: self.timeout.as_secs(),
            }
        } else {
            ModelError::Network(err)
        }
    }

    /// Sends the chat-shaped request, retrying once against `/api/generate`
    /// on 404.
    async fn dispatch(
        &self,
        prompt: &str,
        model: &str,
        stream: bool,
    ) -> Result<Response, ModelError> {
        let chat_url = self.endpoint("/api/chat");
        let payload = OllamaChatRequest {
            model: model.to_string(),
            messages: vec![ChatMessage::new(MessageRole::User, prompt)],
            stream,
        };
        info!(model, url = %chat_url, stream, "Sending request to model server");

        let mut builder = self.http.post(&chat_url).json(&payload);
        if !stream {
            builder = builder.timeout(self.timeout);
        }
        let response = builder.send().await.map_err(|e| self.classify(e))?;

        if response.status() != StatusCode::NOT_FOUND {
            return Ok(response);
        }

        // Fallback shape for servers without the chat route.
        let generate_url = self.endpoint("/api/generate");
        let payload = OllamaGenerateRequest {
            model: model.to_string(),
            prompt: prompt.to_string(),
            stream,
        };
        info!(model, url = %generate_url, "Chat endpoint missing; retrying with generate");

        let mut builder = self.http.post(&generate_url).json(&payload);
        if !stream {
            builder = builder.timeout(self.timeout);
        }
        builder.send().await.map_err(|e| self.classify(e))
    }

    fn check_status(&self, response: &Response, model: &str) -> Result<(), ModelError> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ModelError::ModelNotFound {
                model: model.to_string(),
            });
        }
        if !status.is_success() {
            return Err(ModelError::Upstream { status });
        }
        Ok(())
    }
}

#[async_trait]
impl ModelProvider for OllamaClient {
    async fn generate(&self, prompt: &str, model: &str) -> Result<String, ModelError> {
        let response = self.dispatch(prompt, model, false).await?;
        self.check_status(&response, model)?;

        let body: OllamaCompletion = response.json().await.map_err(|e| self.classify(e))?;
        debug!("Received response from model server");
        body.into_content()
            .ok_or_else(|| ModelError::InvalidResponse("missing message or response field".into()))
    }

    async fn generate_streaming(&self, prompt: &str, model: &str) -> Result<String, ModelError> {
        let response = self.dispatch(prompt, model, true).await?;
        self.check_status(&response, model)?;

        let mut accumulated = String::new();
        let mut pending = Vec::new();
        let mut stream = response.bytes_stream();

        while let Some(piece) = stream.next().await {
            let bytes = piece.map_err(|e| self.classify(e))?;
            pending.extend_from_slice(&bytes);

            // The server emits newline-delimited JSON fragments; a network
            // read may end mid-fragment, so keep the tail buffered.
            while let Some(newline) = pending.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = pending.drain(..=newline).collect();
                append_fragment(&line[..newline], &mut accumulated);
            }
        }
        if !pending.is_empty() {
            append_fragment(&pending, &mut accumulated);
        }

        debug!(
            chars = accumulated.chars().count(),
            "Accumulated streamed response"
        );
        Ok(accumulated)
    }

    async fn list_models(&self) -> Result<Vec<String>, ModelError> {
        let url = self.endpoint("/api/tags");
        debug!(url = %url, "Listing available models");
        let response = self
            .http
            .get(&url)
            .timeout(CONNECT_TIMEOUT)
            .send()
            .await
            .map_err(|e| self.classify(e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ModelError::Upstream { status });
        }
        let tags: OllamaTags = response.json().await.map_err(|e| self.classify(e))?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

/// Decodes one streamed fragment and appends its content. Malformed
/// fragments are skipped, not fatal.
fn append_fragment(line: &[u8], accumulated: &mut String) {
    if line.iter().all(|b| b.is_ascii_whitespace()) {
        return;
    }
    match serde_json::from_slice::<OllamaCompletion>(line) {
        Ok(fragment) => {
            if let Some(content) = fragment.into_content() {
                accumulated.push_str(&content);
            }
        }
        Err(error) => {
            warn!(%error, "Skipping undecodable stream fragment");
        }
    }
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OllamaGenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
}

/// Covers both response shapes: `/api/chat` nests the text under
/// `message.content`, `/api/generate` returns it as `response`.
#[derive(Debug, Deserialize)]
struct OllamaCompletion {
    message: Option<OllamaMessage>,
    response: Option<String>,
}

impl OllamaCompletion {
    fn into_content(self) -> Option<String> {
        match self.message {
            Some(message) => Some(message.content),
            None => self.response,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaTags {
    #[serde(default)]
    models: Vec<OllamaTag>,
}

#[derive(Debug, Deserialize)]
struct OllamaTag {
    name: String,
}
