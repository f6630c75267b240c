//! Resilient gateway to the generative-content API.
//!
//! The gateway splits into two layers, mirroring the crate's other trait
//! seams:
//!
//! * [`ContentTransport`]: one wire round-trip. The bundled
//!   [`GenerativeApiTransport`] speaks the `models/{model}:generateContent`
//!   REST shape over reqwest; tests substitute their own implementations.
//! * [`ApiGateway`]: the retry loop. Each attempt runs under a cooperative
//!   timeout, failures (network, non-2xx, timeout, empty payload) all burn an
//!   attempt, and attempts are separated by a doubling backoff. After the
//!   configured number of attempts the gateway returns a tagged
//!   [`GatewayError::Exhausted`]; it never panics and never lets a raw
//!   transport error escape untagged.
//!
//! # Example
//!
//! ```rust,no_run
//! use playsmith::gateway::{ApiGateway, GatewayConfig, GenerativeApiTransport};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = GatewayConfig::from_env();
//!     let transport = Arc::new(GenerativeApiTransport::new(&config));
//!     let gateway = ApiGateway::new(transport, config);
//!
//!     match gateway.call("Create a small HTML game about planets.").await {
//!         Ok(response) => println!("{} chars generated", response.content.len()),
//!         Err(err) => eprintln!("generation failed: {}", err),
//!     }
//! }
//! ```

use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use reqwest::Client;
use serde_json::{json, Value as JsonValue};

/// Default per-attempt timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
/// Default total attempts (not retries-after-first: attempts).
const MAX_RETRY_ATTEMPTS: u32 = 3;
/// Default base of the doubling backoff schedule.
const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(1);
/// Responses larger than this are rejected while still streaming.
const MAX_RESPONSE_BYTES: usize = 10 * 1024 * 1024;

/// Generative model identifiers the gateway is normally pointed at.
pub enum Model {
    /// `gemini-2.0-flash` – the default for game generation.
    Flash20,
    /// `gemini-2.0-flash-lite` – cheaper, lower-quality output.
    FlashLite20,
    /// `gemini-2.0-pro-exp` – slower, for complex topics.
    ProExp20,
    /// `gemini-1.5-flash` – previous generation fallback.
    Flash15,
    /// `gemini-1.5-pro` – previous generation, higher quality.
    Pro15,
}

/// Convert a [`Model`] variant into its public string identifier.
pub fn model_to_string(model: Model) -> String {
    match model {
        Model::Flash20 => "gemini-2.0-flash".to_string(),
        Model::FlashLite20 => "gemini-2.0-flash-lite".to_string(),
        Model::ProExp20 => "gemini-2.0-pro-exp".to_string(),
        Model::Flash15 => "gemini-1.5-flash".to_string(),
        Model::Pro15 => "gemini-1.5-pro".to_string(),
    }
}

/// Error type for gateway operations.
#[derive(Debug, Clone)]
pub enum GatewayError {
    /// The attempt's cooperative timeout fired and the request was aborted.
    Timeout,
    /// The upstream answered with a non-success HTTP status.
    Http { status: u16, message: String },
    /// The request never completed (DNS, TLS, connection reset, ...).
    Network(String),
    /// The response arrived but carried no usable text payload.
    EmptyPayload,
    /// The response body could not be parsed into the expected shape.
    Malformed(String),
    /// All attempts were consumed without a success.
    Exhausted {
        attempts: u32,
        last_error: Box<GatewayError>,
    },
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::Timeout => write!(f, "request timed out"),
            GatewayError::Http { status, message } => {
                write!(f, "API error: {} {}", status, message)
            }
            GatewayError::Network(msg) => write!(f, "network error: {}", msg),
            GatewayError::EmptyPayload => write!(f, "empty response payload"),
            GatewayError::Malformed(msg) => write!(f, "malformed response: {}", msg),
            GatewayError::Exhausted {
                attempts,
                last_error,
            } => write!(
                f,
                "gave up after {} attempts; last error: {}",
                attempts, last_error
            ),
        }
    }
}

impl Error for GatewayError {}

/// Record of one wire attempt inside the retry loop. Kept for logging and for
/// the exhaustion report; never persisted.
#[derive(Debug, Clone)]
pub struct GatewayAttempt {
    pub attempt_number: u32,
    pub started_at: DateTime<Utc>,
    pub timed_out: bool,
    pub http_status: Option<u16>,
    pub error: Option<String>,
}

/// Successful gateway result: the extracted text plus attempt metrics.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    /// Raw model text, exactly as extracted from the response body.
    pub content: String,
    /// Every attempt made during this call, the successful one last.
    pub attempts: Vec<GatewayAttempt>,
}

/// Configuration for the gateway and its bundled transport.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub api_base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    /// Per-attempt timeout; the in-flight request is aborted when it fires.
    pub timeout: Duration,
    /// Total attempts, counting the first.
    pub max_attempts: u32,
    /// Base of the doubling backoff schedule between attempts.
    pub backoff_base: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            api_base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key: String::new(),
            model: model_to_string(Model::Flash20),
            temperature: 0.9,
            timeout: DEFAULT_TIMEOUT,
            max_attempts: MAX_RETRY_ATTEMPTS,
            backoff_base: DEFAULT_BACKOFF_BASE,
        }
    }
}

impl GatewayConfig {
    /// Build a config from the `GEMINI_API_KEY` environment variable, with
    /// defaults for everything else.
    pub fn from_env() -> Self {
        GatewayConfig {
            api_key: std::env::var("GEMINI_API_KEY").unwrap_or_default(),
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: Model) -> Self {
        self.model = model_to_string(model);
        self
    }
}

/// One wire round-trip to a generative-content endpoint.
///
/// Implementations return the extracted text payload, which may be empty;
/// deciding whether empty is acceptable belongs to the retry loop, not the
/// transport.
#[async_trait]
pub trait ContentTransport: Send + Sync {
    async fn generate_content(
        &self,
        prompt: &str,
        model: &str,
        temperature: f32,
    ) -> Result<String, GatewayError>;
}

/// reqwest-backed transport speaking the `generateContent` REST shape.
pub struct GenerativeApiTransport {
    client: Client,
    api_base_url: String,
    api_key: String,
}

impl GenerativeApiTransport {
    pub fn new(config: &GatewayConfig) -> Self {
        GenerativeApiTransport {
            client: Client::new(),
            api_base_url: config.api_base_url.clone(),
            api_key: config.api_key.clone(),
        }
    }

    /// Stream the body under the size cap so an oversized response can never
    /// be fully buffered.
    async fn read_body(&self, response: reqwest::Response) -> Result<String, GatewayError> {
        let mut stream = response.bytes_stream();
        let mut body_bytes: Vec<u8> = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| GatewayError::Network(e.to_string()))?;
            if body_bytes.len() + chunk.len() > MAX_RESPONSE_BYTES {
                return Err(GatewayError::Malformed(format!(
                    "response body exceeds maximum size of {} bytes",
                    MAX_RESPONSE_BYTES
                )));
            }
            body_bytes.extend_from_slice(&chunk);
        }
        Ok(String::from_utf8_lossy(&body_bytes).into_owned())
    }
}

#[async_trait]
impl ContentTransport for GenerativeApiTransport {
    async fn generate_content(
        &self,
        prompt: &str,
        model: &str,
        temperature: f32,
    ) -> Result<String, GatewayError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.api_base_url,
            model,
            urlencoding::encode(&self.api_key)
        );

        let payload = json!({
            "contents": [{
                "parts": [{ "text": prompt }]
            }],
            "generationConfig": {
                "temperature": temperature,
                "topK": 32,
                "topP": 1,
                "maxOutputTokens": 8192,
                "stopSequences": []
            },
            "safetySettings": []
        });

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Http {
                status: status.as_u16(),
                message: status
                    .canonical_reason()
                    .unwrap_or("unknown status")
                    .to_string(),
            });
        }

        let body = self.read_body(response).await?;
        let parsed: JsonValue = serde_json::from_str(&body)
            .map_err(|e| GatewayError::Malformed(format!("invalid JSON: {}", e)))?;

        extract_text(&parsed).ok_or_else(|| {
            GatewayError::Malformed("no candidates in response".to_string())
        })
    }
}

/// Pull the text payload out of a `generateContent` response body.
///
/// Returns `None` when the candidate structure is absent entirely; an empty
/// string when the structure exists but carries no text.
fn extract_text(response: &JsonValue) -> Option<String> {
    response
        .get("candidates")?
        .get(0)?
        .get("content")
        .and_then(|content| content.get("parts"))
        .and_then(|parts| parts.get(0))
        .and_then(|part| part.get("text"))
        .and_then(|text| text.as_str())
        .map(|text| text.to_string())
        .or(Some(String::new()))
}

/// Backoff delay between attempt `n` and `n + 1` (1-based).
///
/// The schedule doubles from the base: 1s, 2s, 4s, ... and is monotonically
/// non-decreasing in `n`.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base * 2u32.saturating_pow(attempt.saturating_sub(1))
}

/// Retry loop wrapping a [`ContentTransport`].
pub struct ApiGateway {
    transport: Arc<dyn ContentTransport>,
    config: GatewayConfig,
}

impl ApiGateway {
    pub fn new(transport: Arc<dyn ContentTransport>, config: GatewayConfig) -> Self {
        ApiGateway { transport, config }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Issue the prompt, retrying transient failures with doubling backoff.
    ///
    /// Attempts are strictly sequential: attempt *n+1* never starts before
    /// attempt *n*'s result is known and its backoff delay has elapsed. The
    /// per-attempt timeout drops the transport future, so a late completion
    /// from an aborted attempt can never overwrite a later attempt's result.
    pub async fn call(&self, prompt: &str) -> Result<GatewayResponse, GatewayError> {
        let mut attempts: Vec<GatewayAttempt> = Vec::new();
        let mut last_error = GatewayError::EmptyPayload;

        for attempt_number in 1..=self.config.max_attempts {
            let started_at = Utc::now();
            let outcome = tokio::time::timeout(
                self.config.timeout,
                self.transport
                    .generate_content(prompt, &self.config.model, self.config.temperature),
            )
            .await;

            let error = match outcome {
                Ok(Ok(text)) if !text.trim().is_empty() => {
                    attempts.push(GatewayAttempt {
                        attempt_number,
                        started_at,
                        timed_out: false,
                        http_status: None,
                        error: None,
                    });
                    log::info!(
                        "gateway: attempt {}/{} succeeded ({} chars)",
                        attempt_number,
                        self.config.max_attempts,
                        text.len()
                    );
                    return Ok(GatewayResponse {
                        content: text,
                        attempts,
                    });
                }
                Ok(Ok(_)) => GatewayError::EmptyPayload,
                Ok(Err(err)) => err,
                Err(_) => GatewayError::Timeout,
            };

            let timed_out = matches!(error, GatewayError::Timeout);
            let http_status = match &error {
                GatewayError::Http { status, .. } => Some(*status),
                _ => None,
            };
            attempts.push(GatewayAttempt {
                attempt_number,
                started_at,
                timed_out,
                http_status,
                error: Some(error.to_string()),
            });

            if timed_out {
                log::error!(
                    "gateway: attempt {}/{} timed out after {:?}",
                    attempt_number,
                    self.config.max_attempts,
                    self.config.timeout
                );
            } else {
                log::error!(
                    "gateway: attempt {}/{} failed: {}",
                    attempt_number,
                    self.config.max_attempts,
                    error
                );
            }

            last_error = error;

            // Backoff runs after every failed attempt short of the last one,
            // timeouts included.
            if attempt_number < self.config.max_attempts {
                let delay = backoff_delay(self.config.backoff_base, attempt_number);
                log::debug!("gateway: backing off {:?} before retry", delay);
                tokio::time::sleep(delay).await;
            }
        }

        Err(GatewayError::Exhausted {
            attempts: self.config.max_attempts,
            last_error: Box::new(last_error),
        })
    }
}
