//! Text generation backends.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::prompts::OUTPUT_SCHEMA;
use crate::records::AnalysisOutput;

/// Generation errors.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid response format: {0}")]
    InvalidFormat(String),

    #[error("Cannot reach generator at {0}")]
    Connection(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Generator returned {status}: {body}")]
    Service { status: u16, body: String },
}

pub type GenerationResult<T> = Result<T, GenerationError>;

/// Something that turns a prompt into text.
pub trait TextGenerator: Send + Sync {
    fn generate(&self, system: &str, prompt: &str) -> GenerationResult<String>;
}

impl<T: TextGenerator + ?Sized> TextGenerator for Box<T> {
    fn generate(&self, system: &str, prompt: &str) -> GenerationResult<String> {
        (**self).generate(system, prompt)
    }
}

impl<T: TextGenerator + ?Sized> TextGenerator for &T {
    fn generate(&self, system: &str, prompt: &str) -> GenerationResult<String> {
        (**self).generate(system, prompt)
    }
}

/// Parse the structured `{"summary": ...}` output out of raw model text.
pub fn parse_summary_output(raw: &str) -> GenerationResult<AnalysisOutput> {
    // Models sometimes wrap the object in prose or code fences
    let json_start = raw.find('{').ok_or_else(|| {
        GenerationError::InvalidFormat("No JSON object found in response".into())
    })?;
    let json_end = raw.rfind('}').ok_or_else(|| {
        GenerationError::InvalidFormat("No closing brace found in response".into())
    })?;
    if json_end < json_start {
        return Err(GenerationError::InvalidFormat(
            "Closing brace precedes opening brace".into(),
        ));
    }

    let output: AnalysisOutput = serde_json::from_str(&raw[json_start..=json_end])?;
    Ok(output)
}

/// HTTP client for an Ollama-compatible generator.
pub struct HttpGenerator {
    base_url: String,
    model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl HttpGenerator {
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> GenerationResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| GenerationError::Http(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
            timeout_secs,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    format: serde_json::Value,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl TextGenerator for HttpGenerator {
    fn generate(&self, system: &str, prompt: &str) -> GenerationResult<String> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            system,
            stream: false,
            format: serde_json::from_str(OUTPUT_SCHEMA)?,
        };

        tracing::debug!(url = %url, model = %self.model, "sending generation request");

        let response = self.client.post(&url).json(&body).send().map_err(|e| {
            if e.is_connect() {
                GenerationError::Connection(self.base_url.clone())
            } else if e.is_timeout() {
                GenerationError::Http(format!("Request timed out after {}s", self.timeout_secs))
            } else {
                GenerationError::Http(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(GenerationError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .map_err(|e| GenerationError::InvalidFormat(e.to_string()))?;

        Ok(parsed.response)
    }
}

/// Canned generator for tests and offline use.
pub struct MockGenerator {
    response: GenerationResult<String>,
    calls: std::sync::atomic::AtomicUsize,
}

impl MockGenerator {
    pub fn new(response: &str) -> Self {
        Self {
            response: Ok(response.to_string()),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            response: Err(GenerationError::Connection(message.to_string())),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Number of times `generate` was invoked.
    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl TextGenerator for MockGenerator {
    fn generate(&self, _system: &str, _prompt: &str) -> GenerationResult<String> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        match &self.response {
            Ok(text) => Ok(text.clone()),
            Err(e) => Err(GenerationError::Connection(e.to_string())),
        }
    }
}
