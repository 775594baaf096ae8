//! Polytrans - one client for six translation services
//!
//! This library wraps DeepL, OpenAI, Gemini, Anthropic, Google Translate
//! and Azure Translator behind a single pair of entry points, with shared
//! settings handling, bounded concurrency and retries.

#![forbid(unsafe_code)]

pub mod cli;
pub mod core;
pub mod providers;
pub mod translator;

// Re-export key types for convenience
pub use crate::core::{
    backend::{Backend, ResponseMode},
    cost::CostEstimate,
    errors::{Result, TranslationError},
    input::{TextInput, TranslationUnit},
    response::{RawResponse, TranslationOutput, TranslationResult},
    retry::RetryPolicy,
    settings::{
        AnthropicOptions, AzureOptions, DeepLOptions, DelayMode, GeminiOptions, GoogleOptions,
        OpenAiOptions, ProviderOptions, TranslateOptions,
    },
};

pub use crate::translator::{CredentialCheck, Translator};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
