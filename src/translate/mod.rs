use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as HttpClient, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod orchestrator;

pub use orchestrator::TranslationOrchestrator;

const DEFAULT_BASE_URL: &str = "http://localhost:5000";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const TARGET_LANGUAGE: &str = "en";
pub const SOURCE_AUTO: &str = "auto";

/// What the provider hands back for one piece of text.
#[derive(Clone, Debug, PartialEq)]
pub struct Translation {
    pub text: String,
    pub detected_language: Option<String>,
}

/// Machine translation into English with automatic source detection.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str) -> Result<Translation, TranslateError>;
}

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("http error: {0}")]
    Http(#[source] reqwest::Error),
    #[error("request timed out")]
    Timeout,
    #[error("api error {status}: {message}")]
    Api { status: StatusCode, message: String },
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("mock translator response queue is empty")]
    MockQueueEmpty,
}

impl TranslateError {
    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() { TranslateError::Timeout } else { TranslateError::Http(err) }
    }
}

#[derive(Clone, Debug)]
pub struct HttpTranslatorConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for HttpTranslatorConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Client for a LibreTranslate-compatible `/translate` endpoint.
#[derive(Clone)]
pub struct HttpTranslator {
    http: HttpClient,
    cfg: HttpTranslatorConfig,
}

impl HttpTranslator {
    pub fn new(cfg: HttpTranslatorConfig) -> Result<Self, TranslateError> {
        let http = HttpClient::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(TranslateError::from_reqwest)?;
        Ok(Self { http, cfg })
    }

    fn endpoint(&self) -> String {
        format!("{}/translate", self.cfg.base_url.trim_end_matches('/'))
    }

    fn build_api_request<'a>(&'a self, text: &'a str) -> ApiTranslateRequest<'a> {
        ApiTranslateRequest {
            q: text,
            source: SOURCE_AUTO,
            target: TARGET_LANGUAGE,
            format: "text",
            api_key: self.cfg.api_key.as_deref(),
        }
    }
}

#[async_trait]
impl Translator for HttpTranslator {
    async fn translate(&self, text: &str) -> Result<Translation, TranslateError> {
        let response = self
            .http
            .post(self.endpoint())
            .json(&self.build_api_request(text))
            .send()
            .await
            .map_err(TranslateError::from_reqwest)?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(TranslateError::from_reqwest)?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ApiErrorBody>(&bytes)
                .map(|b| b.error)
                .unwrap_or_else(|_| String::from_utf8_lossy(&bytes).into_owned());
            return Err(TranslateError::Api { status, message });
        }

        let parsed: ApiTranslateResponse = serde_json::from_slice(&bytes)?;
        Ok(Translation {
            text: parsed.translated_text,
            detected_language: parsed.detected_language.map(|d| d.language),
        })
    }
}

#[derive(Debug, Serialize)]
struct ApiTranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ApiTranslateResponse {
    #[serde(rename = "translatedText")]
    translated_text: String,
    #[serde(rename = "detectedLanguage", default)]
    detected_language: Option<ApiDetectedLanguage>,
}

#[derive(Debug, Deserialize)]
struct ApiDetectedLanguage {
    language: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: String,
}

/// Queue-backed translator for tests; records every input it receives.
#[derive(Debug, Default)]
pub struct MockTranslator {
    responses: Mutex<VecDeque<Result<Translation, TranslateError>>>,
    calls: Mutex<Vec<String>>,
}

impl MockTranslator {
    pub fn new() -> Self { Self::default() }

    pub fn push_response(&self, resp: Result<Translation, TranslateError>) {
        self.responses.lock().unwrap().push_back(resp);
    }

    pub fn push_ok(&self, text: &str, detected: &str) {
        self.push_response(Ok(Translation { text: text.to_string(), detected_language: Some(detected.to_string()) }));
    }

    pub fn calls(&self) -> Vec<String> { self.calls.lock().unwrap().clone() }
}

#[async_trait]
impl Translator for MockTranslator {
    async fn translate(&self, text: &str) -> Result<Translation, TranslateError> {
        self.calls.lock().unwrap().push(text.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(TranslateError::MockQueueEmpty))
    }
}
