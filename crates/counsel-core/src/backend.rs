//! Outbound HTTP client for the assistant backend.
//!
//! Two single-shot endpoints, both JSON in:
//!
//! - `POST {base}/chat` `{ "user_input": ..., "context": ... | null }` returns
//!   `{ "response": ... }`
//! - `POST {base}/tts` `{ "user_input": ... }` returns raw audio bytes
//!
//! [`HttpBackend`] is blocking; async callers run it on the blocking pool.

use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logging::Transcript;

/// Audio replies larger than this are rejected.
const MAX_AUDIO_BYTES: u64 = 32 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub user_input: String,
    /// First question of the conversation; `null` until one is fixed.
    pub context: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechRequest {
    pub user_input: String,
}

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Backend returned HTTP {0}")]
    Status(u16),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Request task did not complete: {0}")]
    Interrupted(String),
}

/// The two calls the client makes against the assistant backend.
pub trait Backend: Send + Sync + 'static {
    fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, BackendError>;
    fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>, BackendError>;
}

impl<B: Backend + ?Sized> Backend for Arc<B> {
    fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, BackendError> {
        (**self).chat(request)
    }

    fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>, BackendError> {
        (**self).synthesize(request)
    }
}

/// Blocking HTTP implementation over `ureq`.
pub struct HttpBackend {
    agent: ureq::Agent,
    base_url: String,
    transcript: Arc<Transcript>,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self::with_transcript(base_url, timeout, Arc::new(Transcript::disabled()))
    }

    pub fn with_transcript(base_url: &str, timeout: Duration, transcript: Arc<Transcript>) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
            transcript,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<ureq::Response, BackendError> {
        let url = self.endpoint(path);
        let payload = serde_json::to_value(body).map_err(|e| BackendError::Decode(e.to_string()))?;
        self.transcript.line(&format!("POST {path}"), &payload.to_string());
        log::debug!("POST {}", url);

        match self
            .agent
            .post(&url)
            .set("Content-Type", "application/json")
            .send_json(payload)
        {
            Ok(response) => Ok(response),
            Err(ureq::Error::Status(code, _)) => {
                self.transcript.line(&format!("{code} {path}"), "");
                Err(BackendError::Status(code))
            }
            Err(ureq::Error::Transport(e)) => {
                self.transcript.line(&format!("ERR {path}"), &e.to_string());
                Err(BackendError::Transport(e.to_string()))
            }
        }
    }
}

impl Backend for HttpBackend {
    fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, BackendError> {
        let response = self.post("/chat", request)?;
        let status = response.status();
        let body = response
            .into_string()
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        self.transcript.line(&format!("{status} /chat"), &body);

        serde_json::from_str(&body).map_err(|e| BackendError::Decode(e.to_string()))
    }

    fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>, BackendError> {
        let response = self.post("/tts", request)?;
        let status = response.status();

        let mut audio = Vec::new();
        response
            .into_reader()
            .take(MAX_AUDIO_BYTES + 1)
            .read_to_end(&mut audio)
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        if audio.len() as u64 > MAX_AUDIO_BYTES {
            return Err(BackendError::Decode(format!(
                "audio payload exceeds {MAX_AUDIO_BYTES} bytes"
            )));
        }

        self.transcript
            .line(&format!("{status} /tts"), &format!("<{} bytes>", audio.len()));
        Ok(audio)
    }
}
