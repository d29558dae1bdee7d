//! Summarization client for a local Ollama server.
//!
//! The backend is reached through `/api/generate` in either blocking mode
//! (one JSON object) or streaming mode (newline-delimited JSON, one fragment
//! per line, the last carrying `"done": true`).

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bookmark_logging::{pipeline_debug, pipeline_info, pipeline_trace};
use bytes::Bytes;
use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the generative backend.
#[derive(Debug, Error)]
pub enum SummarizeError {
    #[error("generative backend unavailable at {url}: {message}")]
    Unavailable { url: String, message: String },

    #[error("generation timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("backend reported an error: {0}")]
    Backend(String),

    #[error("failed to decode backend response: {0}")]
    Decode(String),

    #[error("failed to load system prompt from {path:?}: {message}")]
    SystemPrompt { path: PathBuf, message: String },

    #[error("failed to build http client: {0}")]
    Client(String),
}

/// Optional sampling parameters; unset fields fall back to the backend default.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GenerationOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(rename = "num_ctx", skip_serializing_if = "Option::is_none")]
    pub context_length: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct SummarizerConfig {
    /// Base URL of the Ollama server.
    pub base_url: String,
    pub model: String,
    /// File holding the system instruction. A missing file means no instruction.
    pub system_prompt_path: Option<PathBuf>,
    /// End-of-generation token stripped from every fragment.
    pub end_marker: String,
    pub connect_timeout: Duration,
    /// Whole-request limit in blocking mode, idle-read limit when streaming.
    pub request_timeout: Duration,
    pub options: GenerationOptions,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".into(),
            model: "mistral:latest".into(),
            system_prompt_path: None,
            end_marker: "</s>".into(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(300),
            options: GenerationOptions::default(),
        }
    }
}

/// Finite, non-restartable sequence of cleaned text fragments.
pub type FragmentStream = BoxStream<'static, Result<String, SummarizeError>>;

#[async_trait::async_trait]
pub trait Summarizer: Send + Sync {
    /// Wait for the whole generation and return it.
    async fn complete(&self, prompt: &str) -> Result<String, SummarizeError>;

    /// Start a generation and hand back its fragments as they arrive.
    async fn complete_streaming(&self, prompt: &str) -> Result<FragmentStream, SummarizeError>;
}

/// Strip every occurrence of the end-of-generation marker.
pub fn clean_output(text: &str, end_marker: &str) -> String {
    if end_marker.is_empty() {
        return text.to_string();
    }
    text.replace(end_marker, "")
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    options: &'a GenerationOptions,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

pub struct OllamaSummarizer {
    client: reqwest::Client,
    config: SummarizerConfig,
    system_prompt: String,
    generate_url: String,
}

impl OllamaSummarizer {
    /// Build the client and read the system instruction once.
    pub fn new(config: SummarizerConfig) -> Result<Self, SummarizeError> {
        let system_prompt = load_system_prompt(config.system_prompt_path.as_deref())?;
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.request_timeout)
            .build()
            .map_err(|err| SummarizeError::Client(err.to_string()))?;
        let generate_url = format!("{}/api/generate", config.base_url.trim_end_matches('/'));

        pipeline_info!(
            "Summarizer ready: model={} endpoint={} system_prompt_chars={}",
            config.model,
            generate_url,
            system_prompt.chars().count()
        );

        Ok(Self {
            client,
            config,
            system_prompt,
            generate_url,
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    async fn send(&self, prompt: &str, stream: bool) -> Result<reqwest::Response, SummarizeError> {
        let body = GenerateRequest {
            model: &self.config.model,
            system: &self.system_prompt,
            prompt,
            options: &self.config.options,
            stream,
        };
        let mut request = self.client.post(&self.generate_url).json(&body);
        if !stream {
            request = request.timeout(self.config.request_timeout);
        }

        let response = request.send().await.map_err(|err| self.map_error(err))?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(SummarizeError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    fn map_error(&self, err: reqwest::Error) -> SummarizeError {
        map_backend_error(err, &self.config.base_url, self.config.request_timeout)
    }
}

#[async_trait::async_trait]
impl Summarizer for OllamaSummarizer {
    async fn complete(&self, prompt: &str) -> Result<String, SummarizeError> {
        let response = self.send(prompt, false).await?;
        let chunk: GenerateChunk = response.json().await.map_err(|err| self.map_error(err))?;
        if let Some(message) = chunk.error {
            return Err(SummarizeError::Backend(message));
        }
        pipeline_debug!("Generated {} chars", chunk.response.len());
        Ok(clean_output(&chunk.response, &self.config.end_marker))
    }

    async fn complete_streaming(&self, prompt: &str) -> Result<FragmentStream, SummarizeError> {
        let response = self.send(prompt, true).await?;
        let decoder = NdjsonFragments {
            body: response.bytes_stream().boxed(),
            buffer: Vec::new(),
            pending: VecDeque::new(),
            finished: false,
            end_marker: self.config.end_marker.clone(),
            base_url: self.config.base_url.clone(),
            timeout: self.config.request_timeout,
        };
        Ok(decoder.into_stream())
    }
}

impl std::fmt::Debug for OllamaSummarizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaSummarizer")
            .field("endpoint", &self.generate_url)
            .field("model", &self.config.model)
            .finish()
    }
}

/// Incremental decoder turning a byte stream of NDJSON into fragments.
struct NdjsonFragments {
    body: BoxStream<'static, reqwest::Result<Bytes>>,
    buffer: Vec<u8>,
    pending: VecDeque<Result<String, SummarizeError>>,
    finished: bool,
    end_marker: String,
    base_url: String,
    timeout: Duration,
}

impl NdjsonFragments {
    fn into_stream(self) -> FragmentStream {
        stream::unfold(self, |mut state| async move {
            loop {
                if let Some(item) = state.pending.pop_front() {
                    return Some((item, state));
                }
                if state.finished {
                    return None;
                }
                match state.body.next().await {
                    Some(Ok(chunk)) => state.absorb(&chunk),
                    Some(Err(err)) => {
                        let err = map_backend_error(err, &state.base_url, state.timeout);
                        state.fail(err);
                    }
                    None => {
                        let rest = std::mem::take(&mut state.buffer);
                        state.parse_line(&rest);
                        if !state.finished {
                            state.fail(SummarizeError::Backend(
                                "stream ended before completion".to_string(),
                            ));
                        }
                    }
                }
            }
        })
        .boxed()
    }

    fn absorb(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
        while !self.finished {
            let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') else {
                break;
            };
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            self.parse_line(&line);
        }
    }

    fn parse_line(&mut self, line: &[u8]) {
        let line = line.trim_ascii();
        if line.is_empty() || self.finished {
            return;
        }
        match serde_json::from_slice::<GenerateChunk>(line) {
            Ok(GenerateChunk {
                error: Some(message),
                ..
            }) => self.fail(SummarizeError::Backend(message)),
            Ok(chunk) => {
                let cleaned = clean_output(&chunk.response, &self.end_marker);
                pipeline_trace!("Fragment: {} chars, done={}", cleaned.len(), chunk.done);
                if !cleaned.is_empty() {
                    self.pending.push_back(Ok(cleaned));
                }
                if chunk.done {
                    self.finished = true;
                }
            }
            Err(err) => self.fail(SummarizeError::Decode(err.to_string())),
        }
    }

    fn fail(&mut self, err: SummarizeError) {
        self.pending.push_back(Err(err));
        self.finished = true;
    }
}

fn map_backend_error(err: reqwest::Error, base_url: &str, timeout: Duration) -> SummarizeError {
    if err.is_timeout() {
        return SummarizeError::Timeout {
            timeout_secs: timeout.as_secs(),
        };
    }
    if err.is_connect() {
        return SummarizeError::Unavailable {
            url: base_url.to_string(),
            message: err.to_string(),
        };
    }
    if err.is_decode() {
        return SummarizeError::Decode(err.to_string());
    }
    SummarizeError::Backend(err.to_string())
}

fn load_system_prompt(path: Option<&Path>) -> Result<String, SummarizeError> {
    let Some(path) = path else {
        return Ok(String::new());
    };
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            pipeline_debug!("No system prompt at {:?}; using none", path);
            Ok(String::new())
        }
        Err(err) => Err(SummarizeError::SystemPrompt {
            path: path.to_path_buf(),
            message: err.to_string(),
        }),
    }
}
