//! Backend response shapes and the normalizer mapping them onto the
//! text/raw contract

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::backend::{Backend, ResponseMode};
use crate::core::errors::{Result, TranslationError};

/// One DeepL translation (the v2 response unwrapped to its single element)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeepLTranslation {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_source_language: Option<String>,
}

/// OpenAI chat completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletion {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: String,
    pub choices: Vec<ChatChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<CompletionUsage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    /// Null when the model answered with something other than text
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

/// Gemini generateContent response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeminiResponse {
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeminiCandidate {
    pub content: GeminiContent,
    #[serde(default, rename = "finishReason", skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeminiContent {
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeminiPart {
    pub text: String,
}

impl GeminiResponse {
    /// Concatenated text of the first candidate's parts, if any
    pub fn text(&self) -> Option<String> {
        let candidate = self.candidates.first()?;
        if candidate.content.parts.is_empty() {
            return None;
        }
        Some(
            candidate
                .content
                .parts
                .iter()
                .map(|p| p.text.as_str())
                .collect(),
        )
    }
}

/// Anthropic message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnthropicMessage {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: String,
    pub content: Vec<ContentBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<AnthropicUsage>,
}

/// Anthropic content block: plain text, or the tool invocation carrying the
/// JSON-mode payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    ToolUse { id: String, name: String, input: Value },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnthropicUsage {
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
}

/// Backend-native response value, tagged by backend
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RawResponse {
    DeepL(DeepLTranslation),
    OpenAi(ChatCompletion),
    Gemini(GeminiResponse),
    Anthropic(AnthropicMessage),
    GoogleTranslate(Value),
    Azure(Value),
}

impl RawResponse {
    /// Backend that produced this response
    pub fn backend(&self) -> Backend {
        match self {
            RawResponse::DeepL(_) => Backend::DeepL,
            RawResponse::OpenAi(_) => Backend::OpenAi,
            RawResponse::Gemini(_) => Backend::Gemini,
            RawResponse::Anthropic(_) => Backend::Anthropic,
            RawResponse::GoogleTranslate(_) => Backend::GoogleTranslate,
            RawResponse::Azure(_) => Backend::Azure,
        }
    }
}

/// One normalized result: extracted text or the backend-native object
#[derive(Debug, Clone, PartialEq)]
pub enum TranslationResult {
    Text(String),
    Raw(RawResponse),
}

impl TranslationResult {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            TranslationResult::Text(s) => Some(s),
            TranslationResult::Raw(_) => None,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            TranslationResult::Text(s) => Some(s),
            TranslationResult::Raw(_) => None,
        }
    }

    pub fn into_raw(self) -> Option<RawResponse> {
        match self {
            TranslationResult::Text(_) => None,
            TranslationResult::Raw(r) => Some(r),
        }
    }
}

/// Scalar-or-batch result, matching the shape of the caller's input
#[derive(Debug, Clone, PartialEq)]
pub enum TranslationOutput {
    /// Result of a scalar input
    Single(TranslationResult),
    /// Ordered results of a batch input, same length as the input
    Batch(Vec<TranslationResult>),
}

impl TranslationOutput {
    pub fn len(&self) -> usize {
        match self {
            TranslationOutput::Single(_) => 1,
            TranslationOutput::Batch(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Extracted text of a scalar result
    pub fn into_text(self) -> Option<String> {
        match self {
            TranslationOutput::Single(r) => r.into_text(),
            TranslationOutput::Batch(_) => None,
        }
    }

    /// Extracted texts of a batch result, in input order
    pub fn into_texts(self) -> Option<Vec<String>> {
        match self {
            TranslationOutput::Single(_) => None,
            TranslationOutput::Batch(v) => v.into_iter().map(TranslationResult::into_text).collect(),
        }
    }

    /// Backend-native object of a scalar raw-mode result
    pub fn into_raw(self) -> Option<RawResponse> {
        match self {
            TranslationOutput::Single(r) => r.into_raw(),
            TranslationOutput::Batch(_) => None,
        }
    }

    /// Backend-native objects of a batch raw-mode result, in input order
    pub fn into_raws(self) -> Option<Vec<RawResponse>> {
        match self {
            TranslationOutput::Single(_) => None,
            TranslationOutput::Batch(v) => v.into_iter().map(TranslationResult::into_raw).collect(),
        }
    }
}

pub(crate) fn malformed(backend: Backend, message: impl Into<String>) -> TranslationError {
    TranslationError::MalformedResponse {
        backend,
        message: message.into(),
    }
}

/// Whether the mode returns the backend-native object for this backend.
/// Azure has no raw mode; its `json` mode returns the raw payload instead.
fn returns_raw(backend: Backend, mode: ResponseMode) -> bool {
    mode.wants_raw() || (backend == Backend::Azure && mode == ResponseMode::Json)
}

/// Extraction rule for Anthropic batches, chosen from the first response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AnthropicShape {
    Text,
    ToolUse,
}

fn anthropic_shape(first: &RawResponse) -> Result<AnthropicShape> {
    let RawResponse::Anthropic(message) = first else {
        return Err(malformed(
            Backend::Anthropic,
            "expected an anthropic message",
        ));
    };
    match message.content.first() {
        Some(ContentBlock::Text { .. }) => Ok(AnthropicShape::Text),
        Some(ContentBlock::ToolUse { .. }) => Ok(AnthropicShape::ToolUse),
        None => Err(malformed(Backend::Anthropic, "message has no content blocks")),
    }
}

fn extract_anthropic(raw: RawResponse, shape: AnthropicShape) -> Result<String> {
    let RawResponse::Anthropic(message) = raw else {
        return Err(malformed(
            Backend::Anthropic,
            "expected an anthropic message",
        ));
    };
    let block = message
        .content
        .into_iter()
        .next()
        .ok_or_else(|| malformed(Backend::Anthropic, "message has no content blocks"))?;
    match (shape, block) {
        (AnthropicShape::Text, ContentBlock::Text { text }) => Ok(text),
        (AnthropicShape::ToolUse, ContentBlock::ToolUse { input, .. }) => {
            Ok(serde_json::to_string(&input)?)
        }
        // the extraction rule is fixed by the first response of the batch
        _ => Err(malformed(
            Backend::Anthropic,
            "mixed content shapes in one batch",
        )),
    }
}

fn google_text(value: Value) -> Result<String> {
    if value.is_array() {
        return Err(malformed(
            Backend::GoogleTranslate,
            "got a collection where a single translation object was expected",
        ));
    }
    value
        .get("translatedText")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| malformed(Backend::GoogleTranslate, "missing translatedText field"))
}

fn azure_text(value: Value) -> Result<String> {
    if value.is_array() {
        return Err(malformed(
            Backend::Azure,
            "got a collection where a single translation object was expected",
        ));
    }
    value
        .get("translations")
        .and_then(|t| t.get(0))
        .and_then(|t| t.get("text"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| malformed(Backend::Azure, "missing translations[0].text field"))
}

fn extract_text(raw: RawResponse) -> Result<String> {
    match raw {
        RawResponse::DeepL(t) => Ok(t.text),
        RawResponse::OpenAi(completion) => {
            let choice = completion
                .choices
                .into_iter()
                .next()
                .ok_or_else(|| malformed(Backend::OpenAi, "completion has no choices"))?;
            choice
                .message
                .content
                .ok_or_else(|| malformed(Backend::OpenAi, "message content is absent"))
        }
        RawResponse::Gemini(response) => response
            .text()
            .ok_or_else(|| malformed(Backend::Gemini, "no candidates with text parts")),
        RawResponse::Anthropic(message) => {
            // a lone anthropic response dispatches on its own shape
            let raw = RawResponse::Anthropic(message);
            let shape = anthropic_shape(&raw)?;
            extract_anthropic(raw, shape)
        }
        RawResponse::GoogleTranslate(value) => google_text(value),
        RawResponse::Azure(value) => azure_text(value),
    }
}

/// Normalize one response for a scalar dispatch
pub(crate) fn normalize_single(
    backend: Backend,
    mode: ResponseMode,
    response: RawResponse,
) -> Result<TranslationResult> {
    if returns_raw(backend, mode) {
        return Ok(TranslationResult::Raw(response));
    }
    extract_text(response).map(TranslationResult::Text)
}

/// Normalize a batch of responses, preserving order.
///
/// For Anthropic the extraction rule is dispatched on the concrete shape of
/// the first response and applied uniformly; mixed-shape batches fail as
/// malformed rather than producing a shortened or mixed result.
pub(crate) fn normalize_batch(
    backend: Backend,
    mode: ResponseMode,
    responses: Vec<RawResponse>,
) -> Result<Vec<TranslationResult>> {
    if returns_raw(backend, mode) {
        return Ok(responses.into_iter().map(TranslationResult::Raw).collect());
    }
    if backend == Backend::Anthropic {
        let Some(first) = responses.first() else {
            return Ok(Vec::new());
        };
        let shape = anthropic_shape(first)?;
        return responses
            .into_iter()
            .map(|r| extract_anthropic(r, shape).map(TranslationResult::Text))
            .collect();
    }
    responses
        .into_iter()
        .map(|r| extract_text(r).map(TranslationResult::Text))
        .collect()
}
