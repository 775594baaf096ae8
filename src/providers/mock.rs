//! Scripted in-process provider for dispatch and facade tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::core::backend::Backend;
use crate::core::errors::{Result, TranslationError};
use crate::core::input::TranslationUnit;
use crate::core::response::{
    AnthropicMessage, ChatChoice, ChatCompletion, ChatMessage, ContentBlock, DeepLTranslation,
    GeminiCandidate, GeminiContent, GeminiPart, GeminiResponse, RawResponse,
};
use crate::core::settings::SettingsRecord;
use crate::providers::ProviderClient;

/// Test double that answers `<TRANSLATED:input>` in the backend's native
/// response shape and keeps counters for call and concurrency assertions.
pub(crate) struct MockProvider {
    backend: Backend,
    /// Per-call latencies, cycled by call index; empty means no sleep
    latencies: Vec<Duration>,
    failures_left: AtomicUsize,
    valid_credentials: bool,
    /// Answer with a collection where a single object is expected
    collection_response: bool,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockProvider {
    pub(crate) fn new(backend: Backend) -> Self {
        Self {
            backend,
            latencies: Vec::new(),
            failures_left: AtomicUsize::new(0),
            valid_credentials: true,
            collection_response: false,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Simulated per-call latency
    pub(crate) fn with_latency(self, latency: Duration) -> Self {
        self.with_latencies(vec![latency])
    }

    /// Latencies applied per call in a cycle, so units finish out of order
    pub(crate) fn with_latencies(mut self, latencies: Vec<Duration>) -> Self {
        self.latencies = latencies;
        self
    }

    /// Fail the first `n` calls with a retryable 500 before succeeding
    pub(crate) fn failing_first(self, n: usize) -> Self {
        self.failures_left.store(n, Ordering::SeqCst);
        self
    }

    pub(crate) fn with_invalid_credentials(mut self) -> Self {
        self.valid_credentials = false;
        self
    }

    pub(crate) fn with_collection_response(mut self) -> Self {
        self.collection_response = true;
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn take_failure(&self) -> bool {
        self.failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn response_for(&self, text: &str) -> RawResponse {
        let translated = format!("<TRANSLATED:{text}>");
        if self.collection_response {
            return RawResponse::GoogleTranslate(json!([
                { "translatedText": translated.clone() },
                { "translatedText": translated },
            ]));
        }
        match self.backend {
            Backend::DeepL => RawResponse::DeepL(DeepLTranslation {
                text: translated,
                detected_source_language: Some("EN".to_string()),
            }),
            Backend::OpenAi => RawResponse::OpenAi(ChatCompletion {
                id: "cmpl-mock".to_string(),
                model: "gpt-4".to_string(),
                choices: vec![ChatChoice {
                    message: ChatMessage {
                        role: "assistant".to_string(),
                        content: Some(translated),
                    },
                    finish_reason: Some("stop".to_string()),
                }],
                usage: None,
            }),
            Backend::Gemini => RawResponse::Gemini(GeminiResponse {
                candidates: vec![GeminiCandidate {
                    content: GeminiContent {
                        parts: vec![GeminiPart { text: translated }],
                        role: Some("model".to_string()),
                    },
                    finish_reason: Some("STOP".to_string()),
                }],
            }),
            Backend::Anthropic => RawResponse::Anthropic(AnthropicMessage {
                id: "msg-mock".to_string(),
                model: "claude-3-haiku-20240307".to_string(),
                content: vec![ContentBlock::Text { text: translated }],
                stop_reason: Some("end_turn".to_string()),
                usage: None,
            }),
            Backend::GoogleTranslate => {
                RawResponse::GoogleTranslate(json!({"translatedText": translated}))
            }
            Backend::Azure => RawResponse::Azure(json!({
                "translations": [{"text": translated, "to": "en"}]
            })),
        }
    }
}

#[async_trait]
impl ProviderClient for MockProvider {
    fn backend(&self) -> Backend {
        self.backend
    }

    async fn translate_unit(
        &self,
        unit: &TranslationUnit,
        _record: &SettingsRecord,
    ) -> Result<RawResponse> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if !self.latencies.is_empty() {
            let latency = self.latencies[index % self.latencies.len()];
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.take_failure() {
            return Err(TranslationError::ApiError {
                backend: self.backend,
                status: 500,
                message: "scripted failure".to_string(),
            });
        }
        Ok(self.response_for(&unit.text))
    }

    async fn verify_credentials(&self, _record: &SettingsRecord) -> Result<()> {
        if self.valid_credentials {
            Ok(())
        } else {
            Err(TranslationError::ApiError {
                backend: self.backend,
                status: 401,
                message: "invalid api key".to_string(),
            })
        }
    }
}
