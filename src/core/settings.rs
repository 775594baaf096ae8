//! Per-backend settings records and the registry that owns them

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Semaphore;

use crate::core::backend::{Backend, ResponseMode};
use crate::core::errors::{Result, TranslationError};
use crate::core::retry::RetryPolicy;

/// DeepL sentence-splitting behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SplitSentences {
    Off,
    #[default]
    All,
    NoNewlines,
}

impl SplitSentences {
    /// Wire value for the v2 API
    pub fn as_param(&self) -> &'static str {
        match self {
            SplitSentences::Off => "0",
            SplitSentences::All => "1",
            SplitSentences::NoNewlines => "nonewlines",
        }
    }
}

/// DeepL formality preference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Formality {
    Default,
    More,
    Less,
    PreferMore,
    PreferLess,
}

impl Formality {
    pub fn as_param(&self) -> &'static str {
        match self {
            Formality::Default => "default",
            Formality::More => "more",
            Formality::Less => "less",
            Formality::PreferMore => "prefer_more",
            Formality::PreferLess => "prefer_less",
        }
    }
}

/// DeepL tag handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagHandling {
    Xml,
    Html,
}

impl TagHandling {
    pub fn as_param(&self) -> &'static str {
        match self {
            TagHandling::Xml => "xml",
            TagHandling::Html => "html",
        }
    }
}

/// DeepL translation options (v2 text API)
#[derive(Debug, Clone, PartialEq)]
pub struct DeepLOptions {
    pub target_lang: String,
    pub source_lang: Option<String>,
    pub context: Option<String>,
    pub split_sentences: SplitSentences,
    pub preserve_formatting: Option<bool>,
    pub formality: Option<Formality>,
    pub glossary_id: Option<String>,
    pub tag_handling: Option<TagHandling>,
    pub outline_detection: Option<bool>,
    pub non_splitting_tags: Vec<String>,
    pub splitting_tags: Vec<String>,
    pub ignore_tags: Vec<String>,
}

impl Default for DeepLOptions {
    fn default() -> Self {
        Self::new("EN-US")
    }
}

impl DeepLOptions {
    pub fn new(target_lang: impl Into<String>) -> Self {
        Self {
            target_lang: target_lang.into(),
            source_lang: None,
            context: None,
            split_sentences: SplitSentences::default(),
            preserve_formatting: None,
            formality: None,
            glossary_id: None,
            tag_handling: None,
            outline_detection: None,
            non_splitting_tags: Vec::new(),
            splitting_tags: Vec::new(),
            ignore_tags: Vec::new(),
        }
    }

    pub fn with_source_lang(mut self, source_lang: impl Into<String>) -> Self {
        self.source_lang = Some(source_lang.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_formality(mut self, formality: Formality) -> Self {
        self.formality = Some(formality);
        self
    }

    pub fn with_glossary_id(mut self, glossary_id: impl Into<String>) -> Self {
        self.glossary_id = Some(glossary_id.into());
        self
    }

    pub fn with_split_sentences(mut self, split_sentences: SplitSentences) -> Self {
        self.split_sentences = split_sentences;
        self
    }
}

/// OpenAI chat-completion options.
///
/// Unset sampling parameters are omitted from the request body entirely, so
/// the API applies its own defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenAiOptions {
    pub model: String,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub stop: Option<Vec<String>>,
    pub max_tokens: Option<u32>,
    pub presence_penalty: Option<f32>,
    pub frequency_penalty: Option<f32>,
}

impl Default for OpenAiOptions {
    fn default() -> Self {
        Self::new("gpt-4")
    }
}

impl OpenAiOptions {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: None,
            top_p: None,
            stop: None,
            max_tokens: None,
            presence_penalty: None,
            frequency_penalty: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Gemini generation options
#[derive(Debug, Clone, PartialEq)]
pub struct GeminiOptions {
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub candidate_count: u32,
    pub stop_sequences: Option<Vec<String>>,
    pub max_output_tokens: Option<u32>,
}

impl Default for GeminiOptions {
    fn default() -> Self {
        Self::new("gemini-pro")
    }
}

impl GeminiOptions {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: 0.5,
            top_p: 0.9,
            top_k: 40,
            candidate_count: 1,
            stop_sequences: None,
            max_output_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = Some(max_output_tokens);
        self
    }
}

/// Anthropic message options
#[derive(Debug, Clone, PartialEq)]
pub struct AnthropicOptions {
    pub model: String,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
    pub stop_sequences: Option<Vec<String>>,
    /// Required by the messages API; 4096 unless the caller lowers it
    pub max_tokens: u32,
}

impl Default for AnthropicOptions {
    fn default() -> Self {
        Self::new("claude-3-haiku-20240307")
    }
}

impl AnthropicOptions {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: None,
            top_p: None,
            top_k: None,
            stop_sequences: None,
            max_tokens: 4096,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Google Translate output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GoogleFormat {
    #[default]
    Text,
    Html,
}

impl GoogleFormat {
    pub fn as_param(&self) -> &'static str {
        match self {
            GoogleFormat::Text => "text",
            GoogleFormat::Html => "html",
        }
    }
}

/// Google Translate v2 options
#[derive(Debug, Clone, PartialEq)]
pub struct GoogleOptions {
    pub target_lang: String,
    pub source_lang: Option<String>,
    pub format: GoogleFormat,
}

impl Default for GoogleOptions {
    fn default() -> Self {
        Self::new("en")
    }
}

impl GoogleOptions {
    pub fn new(target_lang: impl Into<String>) -> Self {
        Self {
            target_lang: target_lang.into(),
            source_lang: None,
            format: GoogleFormat::default(),
        }
    }

    pub fn with_source_lang(mut self, source_lang: impl Into<String>) -> Self {
        self.source_lang = Some(source_lang.into());
        self
    }

    pub fn with_format(mut self, format: GoogleFormat) -> Self {
        self.format = format;
        self
    }
}

/// Default Azure Translator endpoint
pub const AZURE_DEFAULT_ENDPOINT: &str = "https://api.cognitive.microsofttranslator.com";

/// Azure Translator options
#[derive(Debug, Clone, PartialEq)]
pub struct AzureOptions {
    pub target_lang: String,
    pub source_lang: Option<String>,
    pub api_version: String,
    pub region: String,
    pub endpoint: String,
}

impl Default for AzureOptions {
    fn default() -> Self {
        Self::new("en")
    }
}

impl AzureOptions {
    pub fn new(target_lang: impl Into<String>) -> Self {
        Self {
            target_lang: target_lang.into(),
            source_lang: None,
            api_version: "3.0".to_string(),
            region: "global".to_string(),
            endpoint: AZURE_DEFAULT_ENDPOINT.to_string(),
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

/// Provider-specific options for one backend
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderOptions {
    DeepL(DeepLOptions),
    OpenAi(OpenAiOptions),
    Gemini(GeminiOptions),
    Anthropic(AnthropicOptions),
    GoogleTranslate(GoogleOptions),
    Azure(AzureOptions),
}

impl ProviderOptions {
    /// Backend these options belong to
    pub fn backend(&self) -> Backend {
        match self {
            ProviderOptions::DeepL(_) => Backend::DeepL,
            ProviderOptions::OpenAi(_) => Backend::OpenAi,
            ProviderOptions::Gemini(_) => Backend::Gemini,
            ProviderOptions::Anthropic(_) => Backend::Anthropic,
            ProviderOptions::GoogleTranslate(_) => Backend::GoogleTranslate,
            ProviderOptions::Azure(_) => Backend::Azure,
        }
    }

    /// Defaults for the given backend
    pub fn default_for(backend: Backend) -> Self {
        match backend {
            Backend::DeepL => ProviderOptions::DeepL(DeepLOptions::default()),
            Backend::OpenAi => ProviderOptions::OpenAi(OpenAiOptions::default()),
            Backend::Gemini => ProviderOptions::Gemini(GeminiOptions::default()),
            Backend::Anthropic => ProviderOptions::Anthropic(AnthropicOptions::default()),
            Backend::GoogleTranslate => ProviderOptions::GoogleTranslate(GoogleOptions::default()),
            Backend::Azure => ProviderOptions::Azure(AzureOptions::default()),
        }
    }

    /// Model name, for the LLM backends
    pub fn model(&self) -> Option<&str> {
        match self {
            ProviderOptions::OpenAi(o) => Some(&o.model),
            ProviderOptions::Gemini(o) => Some(&o.model),
            ProviderOptions::Anthropic(o) => Some(&o.model),
            _ => None,
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            ProviderOptions::DeepL(o) => {
                require(!o.target_lang.is_empty(), "deepl target_lang must not be empty")
            }
            ProviderOptions::OpenAi(o) => {
                require(!o.model.is_empty(), "openai model must not be empty")?;
                check_range(o.temperature, 0.0, 2.0, "openai temperature")?;
                check_range(o.top_p, 0.0, 1.0, "openai top_p")?;
                check_range(o.presence_penalty, -2.0, 2.0, "openai presence_penalty")?;
                check_range(o.frequency_penalty, -2.0, 2.0, "openai frequency_penalty")?;
                check_stop_sequences(o.stop.as_deref())?;
                if o.max_tokens == Some(0) {
                    return Err(invalid("openai max_tokens must be at least 1"));
                }
                Ok(())
            }
            ProviderOptions::Gemini(o) => {
                require(!o.model.is_empty(), "gemini model must not be empty")?;
                check_range(Some(o.temperature), 0.0, 2.0, "gemini temperature")?;
                check_range(Some(o.top_p), 0.0, 1.0, "gemini top_p")?;
                require(o.top_k >= 1, "gemini top_k must be at least 1")?;
                require(o.candidate_count == 1, "gemini candidate_count must be 1")?;
                check_stop_sequences(o.stop_sequences.as_deref())?;
                if o.max_output_tokens == Some(0) {
                    return Err(invalid("gemini max_output_tokens must be at least 1"));
                }
                Ok(())
            }
            ProviderOptions::Anthropic(o) => {
                require(!o.model.is_empty(), "anthropic model must not be empty")?;
                check_range(o.temperature, 0.0, 1.0, "anthropic temperature")?;
                check_range(o.top_p, 0.0, 1.0, "anthropic top_p")?;
                if o.top_k == Some(0) {
                    return Err(invalid("anthropic top_k must be at least 1"));
                }
                check_stop_sequences(o.stop_sequences.as_deref())?;
                require(o.max_tokens >= 1, "anthropic max_tokens must be at least 1")
            }
            ProviderOptions::GoogleTranslate(o) => {
                require(!o.target_lang.is_empty(), "google translate target_lang must not be empty")
            }
            ProviderOptions::Azure(o) => {
                require(!o.target_lang.is_empty(), "azure target_lang must not be empty")?;
                require(!o.api_version.is_empty(), "azure api_version must not be empty")?;
                require(
                    o.endpoint.starts_with("http"),
                    "azure endpoint must be an http(s) URL",
                )
            }
        }
    }
}

impl From<DeepLOptions> for ProviderOptions {
    fn from(o: DeepLOptions) -> Self {
        ProviderOptions::DeepL(o)
    }
}

impl From<OpenAiOptions> for ProviderOptions {
    fn from(o: OpenAiOptions) -> Self {
        ProviderOptions::OpenAi(o)
    }
}

impl From<GeminiOptions> for ProviderOptions {
    fn from(o: GeminiOptions) -> Self {
        ProviderOptions::Gemini(o)
    }
}

impl From<AnthropicOptions> for ProviderOptions {
    fn from(o: AnthropicOptions) -> Self {
        ProviderOptions::Anthropic(o)
    }
}

impl From<GoogleOptions> for ProviderOptions {
    fn from(o: GoogleOptions) -> Self {
        ProviderOptions::GoogleTranslate(o)
    }
}

impl From<AzureOptions> for ProviderOptions {
    fn from(o: AzureOptions) -> Self {
        ProviderOptions::Azure(o)
    }
}

fn invalid(message: &str) -> TranslationError {
    TranslationError::InvalidSettings {
        message: message.to_string(),
    }
}

fn require(ok: bool, message: &str) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(invalid(message))
    }
}

fn check_range(value: Option<f32>, min: f32, max: f32, name: &str) -> Result<()> {
    if let Some(v) = value {
        if !(min..=max).contains(&v) {
            return Err(TranslationError::InvalidSettings {
                message: format!("{name} must be within [{min}, {max}], got {v}"),
            });
        }
    }
    Ok(())
}

fn check_stop_sequences(stop: Option<&[String]>) -> Result<()> {
    if let Some(sequences) = stop {
        if sequences.len() > 4 {
            return Err(invalid("at most 4 stop sequences are supported"));
        }
        if sequences.iter().any(String::is_empty) {
            return Err(invalid("stop sequences must not be empty strings"));
        }
    }
    Ok(())
}

/// Placement of the configured inter-request delay in concurrent batches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DelayMode {
    /// Each unit sleeps the delay after its semaphore permit is acquired,
    /// immediately before the request is sent. A unit that waited on the
    /// semaphore still pays the full delay.
    #[default]
    PerRequest,
    /// Requests are globally paced: a unit may not start until the delay has
    /// elapsed since the previous request completed. Stricter burst limiting,
    /// at the price of serializing the batch.
    BetweenCompletions,
}

/// Dispatch-level options shared by all backends
#[derive(Debug, Clone)]
pub struct CallOptions {
    pub response_mode: ResponseMode,
    /// Replace the backend's settings record with this call's options
    /// (`true`, the default) or reuse the previous record unchanged
    pub override_previous_settings: bool,
    /// Translation instructions (system message) for the LLM backends
    pub instructions: Option<String>,
    /// JSON schema for the LLM JSON modes; well-formedness only, never content
    pub response_schema: Option<Value>,
    pub retry: Option<RetryPolicy>,
    /// Explicit concurrency limit; wins over the backend default
    pub concurrency: Option<usize>,
    /// Inter-request delay
    pub delay: Option<Duration>,
    pub delay_mode: DelayMode,
    /// Directory receiving `translations.log` entries for each unit
    pub log_directory: Option<PathBuf>,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            response_mode: ResponseMode::default(),
            override_previous_settings: true,
            instructions: None,
            response_schema: None,
            retry: None,
            concurrency: None,
            delay: None,
            delay_mode: DelayMode::default(),
            log_directory: None,
        }
    }
}

/// Everything a translate call needs: provider options plus call options.
///
/// Converts from a bare [`Backend`] (all defaults) or from any per-backend
/// options struct.
#[derive(Debug, Clone)]
pub struct TranslateOptions {
    pub provider: ProviderOptions,
    pub call: CallOptions,
}

impl TranslateOptions {
    pub fn new(provider: impl Into<ProviderOptions>) -> Self {
        Self {
            provider: provider.into(),
            call: CallOptions::default(),
        }
    }

    /// Backend selected by these options
    pub fn backend(&self) -> Backend {
        self.provider.backend()
    }

    pub fn with_response_mode(mut self, response_mode: ResponseMode) -> Self {
        self.call.response_mode = response_mode;
        self
    }

    /// Reuse the backend's previous settings record instead of replacing it
    pub fn keep_previous_settings(mut self) -> Self {
        self.call.override_previous_settings = false;
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.call.instructions = Some(instructions.into());
        self
    }

    pub fn with_response_schema(mut self, response_schema: Value) -> Self {
        self.call.response_schema = Some(response_schema);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.call.retry = Some(retry);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.call.concurrency = Some(concurrency);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.call.delay = Some(delay);
        self
    }

    pub fn with_delay_mode(mut self, delay_mode: DelayMode) -> Self {
        self.call.delay_mode = delay_mode;
        self
    }

    pub fn with_log_directory(mut self, log_directory: impl Into<PathBuf>) -> Self {
        self.call.log_directory = Some(log_directory.into());
        self
    }
}

impl From<Backend> for TranslateOptions {
    fn from(backend: Backend) -> Self {
        Self::new(ProviderOptions::default_for(backend))
    }
}

impl From<ProviderOptions> for TranslateOptions {
    fn from(provider: ProviderOptions) -> Self {
        Self::new(provider)
    }
}

impl From<DeepLOptions> for TranslateOptions {
    fn from(o: DeepLOptions) -> Self {
        Self::new(o)
    }
}

impl From<OpenAiOptions> for TranslateOptions {
    fn from(o: OpenAiOptions) -> Self {
        Self::new(o)
    }
}

impl From<GeminiOptions> for TranslateOptions {
    fn from(o: GeminiOptions) -> Self {
        Self::new(o)
    }
}

impl From<AnthropicOptions> for TranslateOptions {
    fn from(o: AnthropicOptions) -> Self {
        Self::new(o)
    }
}

impl From<GoogleOptions> for TranslateOptions {
    fn from(o: GoogleOptions) -> Self {
        Self::new(o)
    }
}

impl From<AzureOptions> for TranslateOptions {
    fn from(o: AzureOptions) -> Self {
        Self::new(o)
    }
}

/// Parse a response schema from text, verifying well-formedness only
pub fn schema_from_str(schema: &str) -> Result<Value> {
    serde_json::from_str(schema).map_err(|e| TranslationError::InvalidSettings {
        message: format!("response schema is not valid JSON: {e}"),
    })
}

/// Validate a full set of translate options against the selected backend.
///
/// Response-mode support is checked separately (and first) by the entry
/// points, so this covers the provider values and the call-level fields.
pub(crate) fn validate_options(options: &TranslateOptions) -> Result<()> {
    let backend = options.backend();
    options.provider.validate()?;
    if !backend.is_llm() {
        if options.call.instructions.is_some() {
            return Err(invalid(
                "translation instructions only apply to the LLM backends",
            ));
        }
        if options.call.response_schema.is_some() {
            return Err(invalid("response schemas only apply to the LLM backends"));
        }
    }
    if options.call.response_schema.is_some() && backend == Backend::OpenAi {
        return Err(invalid(
            "openai JSON mode does not take a response schema; use gemini or anthropic",
        ));
    }
    if options.call.concurrency == Some(0) {
        return Err(invalid("concurrency limit must be at least 1"));
    }
    Ok(())
}

/// Effective, backend-scoped configuration consulted by the dispatch engine.
///
/// Replaced as a whole on override, never merged field by field.
#[derive(Debug, Clone)]
pub struct SettingsRecord {
    pub provider: ProviderOptions,
    /// Effective translation instructions; derived from the record itself
    /// when the caller supplies none
    pub instructions: String,
    pub json_mode: bool,
    pub response_schema: Option<Value>,
    pub concurrency: usize,
    pub delay: Option<Duration>,
    pub delay_mode: DelayMode,
    pub retry: Option<RetryPolicy>,
    pub log_directory: Option<PathBuf>,
    pub(crate) semaphore: Arc<Semaphore>,
}

impl SettingsRecord {
    fn defaults_for(backend: Backend) -> Self {
        let provider = ProviderOptions::default_for(backend);
        let concurrency = backend.default_concurrency(provider.model());
        let mut record = Self {
            provider,
            instructions: String::new(),
            json_mode: false,
            response_schema: None,
            concurrency,
            delay: None,
            delay_mode: DelayMode::default(),
            retry: None,
            log_directory: None,
            semaphore: Arc::new(Semaphore::new(concurrency)),
        };
        if backend.is_llm() {
            record.instructions = derived_default_instructions(&record);
        }
        record
    }

    /// Backend this record configures
    pub fn backend(&self) -> Backend {
        self.provider.backend()
    }

    /// Model name, for the LLM backends
    pub fn model(&self) -> Option<&str> {
        self.provider.model()
    }
}

/// Base instructions used when a call supplies none
pub(crate) const DEFAULT_INSTRUCTIONS: &str = "Please translate the following text into English.";

/// Default translation instructions, derived from the current record.
///
/// Reads the record's model and JSON-mode flag, so it must only run against
/// the record state that the call is actually going to use.
fn derived_default_instructions(record: &SettingsRecord) -> String {
    let base = DEFAULT_INSTRUCTIONS;
    if !record.json_mode {
        return base.to_string();
    }
    match record.backend() {
        // Anthropic JSON mode is implemented with forced tool use
        Backend::Anthropic => format!("{base} Respond only by calling the provided tool."),
        _ => format!("{base} Respond with only a valid JSON object."),
    }
}

/// Registry of the six settings records, seeded with defaults and replaced
/// whole on override
#[derive(Debug)]
pub struct SettingsRegistry {
    records: HashMap<Backend, SettingsRecord>,
}

impl Default for SettingsRegistry {
    fn default() -> Self {
        let records = Backend::ALL
            .iter()
            .map(|&backend| (backend, SettingsRecord::defaults_for(backend)))
            .collect();
        Self { records }
    }
}

impl SettingsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current record for a backend (always present; the registry is seeded)
    pub fn get(&self, backend: Backend) -> &SettingsRecord {
        &self.records[&backend]
    }

    /// Replace the backend's record with one built from these options.
    ///
    /// The semaphore is carried over when the concurrency limit is unchanged
    /// and rebuilt when it changes. After the primary write, the default
    /// instructions are re-derived from the just-written record as a second,
    /// dependent write (they are a function of the new model and JSON-mode
    /// flag, not the previous ones).
    pub fn apply(&mut self, provider: ProviderOptions, call: &CallOptions) {
        let backend = provider.backend();
        let concurrency = call
            .concurrency
            .unwrap_or_else(|| backend.default_concurrency(provider.model()))
            .max(1);
        let semaphore = match self.records.get(&backend) {
            Some(prev) if prev.concurrency == concurrency => Arc::clone(&prev.semaphore),
            _ => Arc::new(Semaphore::new(concurrency)),
        };
        let record = SettingsRecord {
            provider,
            instructions: call.instructions.clone().unwrap_or_default(),
            json_mode: backend.is_llm() && call.response_mode.wants_json(),
            response_schema: call.response_schema.clone(),
            concurrency,
            delay: call.delay,
            delay_mode: call.delay_mode,
            retry: call.retry,
            log_directory: call.log_directory.clone(),
            semaphore,
        };
        self.records.insert(backend, record);

        // Dependent second write: the derivation must see the record state
        // written above.
        if call.instructions.is_none() && backend.is_llm() {
            if let Some(record) = self.records.get_mut(&backend) {
                let derived = derived_default_instructions(record);
                record.instructions = derived;
            }
        }
    }
}
