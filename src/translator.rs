//! The `Translator` facade
//!
//! Owns the HTTP client, the per-backend service clients and the settings
//! registry, and exposes the two entry points everything else funnels
//! through: [`Translator::translate`] (serial) and
//! [`Translator::translate_async`] (concurrent).

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::core::backend::Backend;
use crate::core::cost::{self, CostEstimate};
use crate::core::dispatch::Dispatcher;
use crate::core::errors::{Result, TranslationError};
use crate::core::input::TextInput;
use crate::core::response::{normalize_batch, normalize_single, TranslationOutput};
use crate::core::settings::{validate_options, SettingsRegistry, TranslateOptions};
use crate::providers::anthropic::AnthropicClient;
use crate::providers::azure::AzureClient;
use crate::providers::deepl::DeepLClient;
use crate::providers::gemini::GeminiClient;
use crate::providers::google::GoogleClient;
use crate::providers::openai::OpenAiClient;
use crate::providers::{ProviderClient, ProviderSet};

/// Environment variables read by [`Translator::from_env`]
const ENV_KEYS: [(Backend, &str); 6] = [
    (Backend::DeepL, "DEEPL_API_KEY"),
    (Backend::OpenAi, "OPENAI_API_KEY"),
    (Backend::Gemini, "GEMINI_API_KEY"),
    (Backend::Anthropic, "ANTHROPIC_API_KEY"),
    (Backend::GoogleTranslate, "GOOGLE_TRANSLATE_API_KEY"),
    (Backend::Azure, "AZURE_TRANSLATOR_KEY"),
];

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of a credential probe.
///
/// A key that is missing, rejected or unreachable is reported in `error`
/// with `valid: false`; the probe itself only returns `Err` for failures
/// that say nothing about the key.
#[derive(Debug)]
pub struct CredentialCheck {
    pub valid: bool,
    pub error: Option<TranslationError>,
}

/// One client for six translation services.
///
/// Credentials are registered per backend with [`set_credentials`]; every
/// translation call names its backend through the options it passes, and
/// settings given with `override_previous_settings` (the default) are kept
/// in the registry for later calls to reuse.
///
/// [`set_credentials`]: Translator::set_credentials
pub struct Translator {
    http: reqwest::Client,
    providers: ProviderSet,
    registry: SettingsRegistry,
}

impl std::fmt::Debug for Translator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Translator")
            .field("providers", &self.providers)
            .finish_non_exhaustive()
    }
}

impl Translator {
    /// Build a translator with a connection-pooled HTTP client
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .pool_idle_timeout(Some(Duration::from_secs(30)))
            .pool_max_idle_per_host(10)
            .build()?;
        Ok(Self::with_http_client(http))
    }

    /// Build a translator around an existing HTTP client
    pub fn with_http_client(http: reqwest::Client) -> Self {
        Self {
            http,
            providers: ProviderSet::new(),
            registry: SettingsRegistry::new(),
        }
    }

    /// Build a translator and register credentials for every backend whose
    /// environment variable is set and non-empty
    pub fn from_env() -> Result<Self> {
        let mut translator = Self::new()?;
        for (backend, var) in ENV_KEYS {
            if let Ok(key) = std::env::var(var) {
                if !key.is_empty() {
                    translator.set_credentials(backend, key);
                }
            }
        }
        Ok(translator)
    }

    /// Register an API key for a backend, replacing any earlier one
    pub fn set_credentials(&mut self, backend: Backend, api_key: impl Into<String>) {
        let api_key = api_key.into();
        let client: Arc<dyn ProviderClient> = match backend {
            Backend::DeepL => Arc::new(DeepLClient::new(self.http.clone(), api_key)),
            Backend::OpenAi => Arc::new(OpenAiClient::new(self.http.clone(), api_key)),
            Backend::Gemini => Arc::new(GeminiClient::new(self.http.clone(), api_key)),
            Backend::Anthropic => Arc::new(AnthropicClient::new(self.http.clone(), api_key)),
            Backend::GoogleTranslate => Arc::new(GoogleClient::new(self.http.clone(), api_key)),
            Backend::Azure => Arc::new(AzureClient::new(self.http.clone(), api_key)),
        };
        self.providers.insert(client);
        debug!("credentials registered for {}", backend);
    }

    pub fn has_credentials(&self, backend: Backend) -> bool {
        self.providers.contains(backend)
    }

    /// Probe the stored credentials for a backend with a minimal request.
    ///
    /// Missing credentials and keys the service turns away come back as
    /// `Ok` with `valid: false`; failures unrelated to the key (a parse
    /// bug, a poisoned record) propagate as `Err`.
    pub async fn test_credentials(&self, backend: Backend) -> Result<CredentialCheck> {
        let client = match self.providers.get(backend) {
            Ok(client) => client,
            Err(error) => {
                return Ok(CredentialCheck {
                    valid: false,
                    error: Some(error),
                })
            }
        };
        match client.verify_credentials(self.registry.get(backend)).await {
            Ok(()) => Ok(CredentialCheck {
                valid: true,
                error: None,
            }),
            Err(error) if credential_probe_failure(&error) => Ok(CredentialCheck {
                valid: false,
                error: Some(TranslationError::CredentialError {
                    backend,
                    source: Box::new(error),
                }),
            }),
            Err(error) => Err(error),
        }
    }

    /// Translate a string or a batch of strings, one request at a time.
    ///
    /// Batch elements are sent in input order, sleeping the configured
    /// delay between consecutive requests. The output mirrors the input
    /// shape: a scalar in, a [`TranslationOutput::Single`] out.
    pub async fn translate(
        &mut self,
        text: impl Into<TextInput>,
        options: impl Into<TranslateOptions>,
    ) -> Result<TranslationOutput> {
        self.run(text.into(), options.into(), false).await
    }

    /// Translate a string or a batch of strings with bounded concurrency.
    ///
    /// Batch elements run in parallel under the backend's concurrency
    /// limit; results always come back in input order. A scalar input
    /// takes the same direct path as [`translate`], skipping the limiter
    /// and the delay.
    ///
    /// [`translate`]: Translator::translate
    pub async fn translate_async(
        &mut self,
        text: impl Into<TextInput>,
        options: impl Into<TranslateOptions>,
    ) -> Result<TranslationOutput> {
        self.run(text.into(), options.into(), true).await
    }

    /// Estimate what translating `text` would cost, in USD.
    ///
    /// LLM backends price by input token, the others by character. `model`
    /// falls back to the backend's default; pricing is a static table, so
    /// an unrecognized model is an error rather than a silent zero.
    pub fn calculate_cost(
        &self,
        text: impl Into<TextInput>,
        backend: Backend,
        model: Option<&str>,
        instructions: Option<&str>,
    ) -> Result<CostEstimate> {
        cost::estimate(backend, &text.into(), model, instructions)
    }

    async fn run(
        &mut self,
        input: TextInput,
        options: TranslateOptions,
        concurrent: bool,
    ) -> Result<TranslationOutput> {
        let backend = options.backend();
        let mode = options.call.response_mode;

        if !backend.supports_mode(mode) {
            return Err(TranslationError::InvalidResponseFormat {
                backend,
                mode,
                supported: supported_modes(backend),
            });
        }
        validate_options(&options)?;
        if input.is_units() && !backend.is_llm() {
            return Err(TranslationError::InvalidTextInput {
                message: format!("per-unit instructions are not supported by {backend}"),
            });
        }

        // The credential gate runs after the cheap validations and before the
        // settings write: a call that cannot run must not leave its settings
        // behind, and a bad key must fail before any unit is paid for.
        let check = self.test_credentials(backend).await?;
        if let Some(error) = check.error {
            return Err(error);
        }
        let client = self.providers.get(backend)?;

        let TranslateOptions { provider, call } = options;
        if call.override_previous_settings {
            self.registry.apply(provider, &call);
        }
        let record = self.registry.get(backend);
        let dispatcher = Dispatcher::new(client.as_ref(), record);

        let scalar = input.is_scalar();
        let units = input.into_units();
        debug!(
            "dispatching {} unit(s) to {} ({})",
            units.len(),
            backend,
            if concurrent { "concurrent" } else { "serial" },
        );

        if scalar {
            let unit = units.into_iter().next().ok_or_else(|| {
                TranslationError::InternalError("scalar input yielded no unit".to_string())
            })?;
            let raw = dispatcher.run_single(&unit).await?;
            Ok(TranslationOutput::Single(normalize_single(
                backend, mode, raw,
            )?))
        } else {
            let raws = if concurrent {
                dispatcher.run_concurrent(&units).await?
            } else {
                dispatcher.run_serial(&units).await?
            };
            Ok(TranslationOutput::Batch(normalize_batch(
                backend, mode, raws,
            )?))
        }
    }
}

fn supported_modes(backend: Backend) -> String {
    backend
        .supported_modes()
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Failure families that indicate a problem with the key or the account,
/// as opposed to a failure of the probe machinery itself
fn credential_probe_failure(error: &TranslationError) -> bool {
    matches!(
        error,
        TranslationError::ApiError { .. } | TranslationError::HttpError(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::backend::ResponseMode;
    use crate::core::input::TranslationUnit;
    use crate::core::response::RawResponse;
    use crate::core::settings::{
        AzureOptions, DeepLOptions, GoogleOptions, OpenAiOptions, DEFAULT_INSTRUCTIONS,
    };
    use crate::providers::mock::MockProvider;

    fn mock_translator(mock: MockProvider) -> (Translator, Arc<MockProvider>) {
        let mut translator = Translator::with_http_client(reqwest::Client::new());
        let mock = Arc::new(mock);
        let client = Arc::clone(&mock);
        translator.providers.insert(client);
        (translator, mock)
    }

    #[tokio::test]
    async fn scalar_input_returns_single() {
        let (mut translator, mock) = mock_translator(MockProvider::new(Backend::OpenAi));

        let output = translator.translate("hello", Backend::OpenAi).await.unwrap();

        assert_eq!(output.len(), 1);
        assert_eq!(output.into_text().as_deref(), Some("<TRANSLATED:hello>"));
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn batch_input_returns_batch_in_order() {
        let (mut translator, mock) = mock_translator(MockProvider::new(Backend::DeepL));

        let output = translator
            .translate(vec!["one", "two", "three"], Backend::DeepL)
            .await
            .unwrap();

        assert_eq!(
            output.into_texts(),
            Some(vec![
                "<TRANSLATED:one>".to_string(),
                "<TRANSLATED:two>".to_string(),
                "<TRANSLATED:three>".to_string(),
            ])
        );
        assert_eq!(mock.calls(), 3);
    }

    #[tokio::test]
    async fn concurrent_batch_preserves_input_order() {
        // Alternating latencies make units finish out of order
        let mock = MockProvider::new(Backend::OpenAi).with_latencies(vec![
            Duration::from_millis(40),
            Duration::from_millis(5),
        ]);
        let (mut translator, mock) = mock_translator(mock);

        let texts: Vec<String> = (0..6).map(|i| format!("line {i}")).collect();
        let output = translator
            .translate_async(texts.clone(), Backend::OpenAi)
            .await
            .unwrap();

        let expected: Vec<String> = texts.iter().map(|t| format!("<TRANSLATED:{t}>")).collect();
        assert_eq!(output.into_texts(), Some(expected));
        assert_eq!(mock.calls(), 6);
    }

    #[tokio::test]
    async fn override_replaces_record_and_keep_reuses_it() {
        let (mut translator, _mock) = mock_translator(MockProvider::new(Backend::OpenAi));

        let custom = TranslateOptions::from(OpenAiOptions::new("gpt-4o"))
            .with_instructions("Reply in pirate speak.");
        translator.translate("hello", custom).await.unwrap();
        let record = translator.registry.get(Backend::OpenAi);
        assert_eq!(record.model(), Some("gpt-4o"));
        assert_eq!(record.instructions, "Reply in pirate speak.");

        // A call that keeps previous settings ignores its own options
        let keep = TranslateOptions::from(Backend::OpenAi).keep_previous_settings();
        translator.translate("again", keep).await.unwrap();
        let record = translator.registry.get(Backend::OpenAi);
        assert_eq!(record.model(), Some("gpt-4o"));
        assert_eq!(record.instructions, "Reply in pirate speak.");

        // A plain defaulted call replaces the whole record
        translator.translate("third", Backend::OpenAi).await.unwrap();
        let record = translator.registry.get(Backend::OpenAi);
        assert_eq!(record.model(), Some("gpt-4"));
        assert_eq!(record.instructions, DEFAULT_INSTRUCTIONS);
    }

    #[tokio::test]
    async fn unsupported_mode_is_rejected_before_any_call() {
        let (mut translator, mock) = mock_translator(MockProvider::new(Backend::DeepL));

        let options =
            TranslateOptions::from(DeepLOptions::default()).with_response_mode(ResponseMode::Json);
        let error = translator.translate("hi", options).await.unwrap_err();

        match error {
            TranslationError::InvalidResponseFormat { supported, .. } => {
                assert_eq!(supported, "text, raw");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn missing_credentials_fail_before_settings_write() {
        let mut translator = Translator::with_http_client(reqwest::Client::new());

        let options = TranslateOptions::from(GoogleOptions::default())
            .with_delay(Duration::from_millis(5));
        let error = translator
            .translate_async(vec!["a"], options)
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            TranslationError::CredentialsNotSet {
                backend: Backend::GoogleTranslate
            }
        ));
        // The failed call must not have written its settings
        assert_eq!(translator.registry.get(Backend::GoogleTranslate).delay, None);
    }

    #[tokio::test]
    async fn instructions_rejected_for_machine_backends() {
        let (mut translator, mock) = mock_translator(MockProvider::new(Backend::DeepL));

        let options =
            TranslateOptions::from(DeepLOptions::default()).with_instructions("Be brief.");
        let error = translator.translate("hi", options).await.unwrap_err();

        assert!(matches!(error, TranslationError::InvalidSettings { .. }));
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn unit_input_rejected_for_machine_backends() {
        let (mut translator, mock) = mock_translator(MockProvider::new(Backend::DeepL));

        let unit = TranslationUnit::new("hi").with_instructions("Be brief.");
        let error = translator.translate(unit, Backend::DeepL).await.unwrap_err();

        assert!(matches!(error, TranslationError::InvalidTextInput { .. }));
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn empty_batch_translates_to_empty_batch() {
        let (mut translator, mock) = mock_translator(MockProvider::new(Backend::GoogleTranslate));

        let output = translator
            .translate_async(Vec::<String>::new(), Backend::GoogleTranslate)
            .await
            .unwrap();

        assert_eq!(output.into_texts(), Some(Vec::new()));
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn azure_json_mode_returns_native_object() {
        let (mut translator, _mock) = mock_translator(MockProvider::new(Backend::Azure));

        let options =
            TranslateOptions::from(AzureOptions::default()).with_response_mode(ResponseMode::Json);
        let output = translator.translate("hej", options).await.unwrap();

        match output.into_raw() {
            Some(RawResponse::Azure(value)) => {
                assert_eq!(value["translations"][0]["text"], "<TRANSLATED:hej>");
            }
            other => panic!("expected a native Azure object, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejected_key_fails_the_call_before_any_unit() {
        let mock = MockProvider::new(Backend::OpenAi).with_invalid_credentials();
        let (mut translator, mock) = mock_translator(mock);

        let error = translator.translate("hi", Backend::OpenAi).await.unwrap_err();

        assert!(matches!(error, TranslationError::CredentialError { .. }));
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn collection_for_scalar_is_malformed() {
        let mock = MockProvider::new(Backend::GoogleTranslate).with_collection_response();
        let (mut translator, _mock) = mock_translator(mock);

        let error = translator
            .translate("hi", Backend::GoogleTranslate)
            .await
            .unwrap_err();

        assert!(matches!(error, TranslationError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn credential_probe_classifies_outcomes() {
        let mut translator = Translator::with_http_client(reqwest::Client::new());

        // No credentials registered
        let check = translator.test_credentials(Backend::DeepL).await.unwrap();
        assert!(!check.valid);
        assert!(matches!(
            check.error,
            Some(TranslationError::CredentialsNotSet { .. })
        ));

        // A key the service accepts
        translator
            .providers
            .insert(Arc::new(MockProvider::new(Backend::DeepL)));
        let check = translator.test_credentials(Backend::DeepL).await.unwrap();
        assert!(check.valid);
        assert!(check.error.is_none());

        // A key the service turns away
        translator.providers.insert(Arc::new(
            MockProvider::new(Backend::OpenAi).with_invalid_credentials(),
        ));
        let check = translator.test_credentials(Backend::OpenAi).await.unwrap();
        assert!(!check.valid);
        assert!(matches!(
            check.error,
            Some(TranslationError::CredentialError { .. })
        ));
    }

    #[test]
    fn from_env_installs_present_keys() {
        std::env::set_var("OPENAI_API_KEY", "sk-test");
        std::env::set_var("DEEPL_API_KEY", "dk-test:fx");
        std::env::remove_var("AZURE_TRANSLATOR_KEY");

        let translator = Translator::from_env().unwrap();

        assert!(translator.has_credentials(Backend::OpenAi));
        assert!(translator.has_credentials(Backend::DeepL));
        assert!(!translator.has_credentials(Backend::Azure));
    }

    #[test]
    fn cost_passthrough_counts_characters() {
        let translator = Translator::with_http_client(reqwest::Client::new());

        let estimate = translator
            .calculate_cost("hello", Backend::GoogleTranslate, None, None)
            .unwrap();

        assert_eq!(estimate.unit_count, 5);
        assert_eq!(estimate.model, "google translate");
    }
}
