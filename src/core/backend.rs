//! Backend identities and their capability tables

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::errors::TranslationError;

/// One of the six supported translation backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
    /// DeepL v2 API (character-metered)
    DeepL,
    /// OpenAI chat completions (token-metered)
    OpenAi,
    /// Google Gemini (token-metered)
    Gemini,
    /// Anthropic messages (token-metered)
    Anthropic,
    /// Google Translate v2 (character-metered)
    GoogleTranslate,
    /// Azure Translator (character-metered)
    Azure,
}

impl Backend {
    /// All backends, in documentation order
    pub const ALL: [Backend; 6] = [
        Backend::DeepL,
        Backend::OpenAi,
        Backend::Gemini,
        Backend::Anthropic,
        Backend::GoogleTranslate,
        Backend::Azure,
    ];

    /// Response modes the backend accepts
    pub fn supported_modes(&self) -> &'static [ResponseMode] {
        match self {
            Backend::DeepL | Backend::GoogleTranslate => {
                &[ResponseMode::Text, ResponseMode::Raw]
            }
            Backend::Azure => &[ResponseMode::Text, ResponseMode::Json],
            Backend::OpenAi | Backend::Gemini | Backend::Anthropic => &[
                ResponseMode::Text,
                ResponseMode::Raw,
                ResponseMode::Json,
                ResponseMode::RawJson,
            ],
        }
    }

    /// Check whether a response mode is accepted by this backend
    pub fn supports_mode(&self, mode: ResponseMode) -> bool {
        self.supported_modes().contains(&mode)
    }

    /// Whether the backend is an instruction-driven LLM
    pub fn is_llm(&self) -> bool {
        matches!(self, Backend::OpenAi | Backend::Gemini | Backend::Anthropic)
    }

    /// Default model name for LLM backends, `None` for the MT services
    pub fn default_model(&self) -> Option<&'static str> {
        match self {
            Backend::OpenAi => Some("gpt-4"),
            Backend::Gemini => Some("gemini-pro"),
            Backend::Anthropic => Some("claude-3-haiku-20240307"),
            _ => None,
        }
    }

    /// Default concurrency limit for async batches.
    ///
    /// The MT services tolerate more in-flight requests than the LLM APIs;
    /// Gemini 1.5-pro models carry a much stricter rate limit and default to 2.
    pub fn default_concurrency(&self, model: Option<&str>) -> usize {
        match self {
            Backend::DeepL | Backend::GoogleTranslate | Backend::Azure => 15,
            Backend::OpenAi | Backend::Anthropic => 5,
            Backend::Gemini => {
                if model.is_some_and(|m| m.starts_with("gemini-1.5-pro")) {
                    2
                } else {
                    5
                }
            }
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Backend::DeepL => "deepl",
            Backend::OpenAi => "openai",
            Backend::Gemini => "gemini",
            Backend::Anthropic => "anthropic",
            Backend::GoogleTranslate => "google translate",
            Backend::Azure => "azure",
        };
        write!(f, "{name}")
    }
}

impl FromStr for Backend {
    type Err = TranslationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "deepl" => Ok(Backend::DeepL),
            "openai" => Ok(Backend::OpenAi),
            "gemini" => Ok(Backend::Gemini),
            "anthropic" => Ok(Backend::Anthropic),
            "google translate" | "google-translate" | "google" => {
                Ok(Backend::GoogleTranslate)
            }
            "azure" => Ok(Backend::Azure),
            _ => Err(TranslationError::InvalidBackend {
                name: s.to_string(),
            }),
        }
    }
}

/// Caller-selected shape of the returned value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    /// Extracted textual content
    #[default]
    Text,
    /// Backend-native response object
    Raw,
    /// Extracted content with JSON output requested from the backend
    Json,
    /// Backend-native response object with JSON output requested
    RawJson,
}

impl ResponseMode {
    /// Whether the mode asks the backend for JSON-shaped output
    pub fn wants_json(&self) -> bool {
        matches!(self, ResponseMode::Json | ResponseMode::RawJson)
    }

    /// Whether the mode returns the backend-native response object
    pub fn wants_raw(&self) -> bool {
        matches!(self, ResponseMode::Raw | ResponseMode::RawJson)
    }
}

impl fmt::Display for ResponseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResponseMode::Text => "text",
            ResponseMode::Raw => "raw",
            ResponseMode::Json => "json",
            ResponseMode::RawJson => "raw_json",
        };
        write!(f, "{name}")
    }
}

impl FromStr for ResponseMode {
    type Err = TranslationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(ResponseMode::Text),
            "raw" => Ok(ResponseMode::Raw),
            "json" => Ok(ResponseMode::Json),
            "raw_json" | "raw-json" => Ok(ResponseMode::RawJson),
            _ => Err(TranslationError::InvalidSettings {
                message: format!("unknown response mode: {s}"),
            }),
        }
    }
}
