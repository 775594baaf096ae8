//! Google Cloud Translation v2 client (API-key auth)

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::core::backend::Backend;
use crate::core::errors::{Result, TranslationError};
use crate::core::input::TranslationUnit;
use crate::core::response::{malformed, RawResponse};
use crate::core::settings::{GoogleOptions, ProviderOptions, SettingsRecord};
use crate::providers::{ensure_success, ProviderClient};

const ENDPOINT: &str = "https://translation.googleapis.com/language/translate/v2";

pub struct GoogleClient {
    http: reqwest::Client,
    api_key: String,
}

impl GoogleClient {
    pub fn new(http: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            http,
            api_key: api_key.into(),
        }
    }

    fn options(record: &SettingsRecord) -> Result<&GoogleOptions> {
        match &record.provider {
            ProviderOptions::GoogleTranslate(o) => Ok(o),
            _ => Err(TranslationError::InternalError(
                "settings record does not belong to google translate".to_string(),
            )),
        }
    }

    fn request_body(text: &str, options: &GoogleOptions) -> Value {
        let mut body = json!({
            "q": text,
            "target": options.target_lang,
            "format": options.format.as_param(),
        });
        if let Some(fields) = body.as_object_mut() {
            if let Some(source_lang) = &options.source_lang {
                fields.insert("source".to_string(), json!(source_lang));
            }
        }
        body
    }

    /// Unwrap the v2 envelope down to the single translation object
    fn unwrap_translation(mut envelope: Value) -> Result<Value> {
        envelope
            .get_mut("data")
            .and_then(|data| data.get_mut("translations"))
            .and_then(|translations| translations.get_mut(0))
            .map(Value::take)
            .ok_or_else(|| malformed(Backend::GoogleTranslate, "missing data.translations[0]"))
    }

    async fn call(&self, body: &Value) -> Result<Value> {
        let response = self
            .http
            .post(ENDPOINT)
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()
            .await?;
        let response = ensure_success(Backend::GoogleTranslate, response).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl ProviderClient for GoogleClient {
    fn backend(&self) -> Backend {
        Backend::GoogleTranslate
    }

    async fn translate_unit(
        &self,
        unit: &TranslationUnit,
        record: &SettingsRecord,
    ) -> Result<RawResponse> {
        let options = Self::options(record)?;
        let envelope = self.call(&Self::request_body(&unit.text, options)).await?;
        Ok(RawResponse::GoogleTranslate(Self::unwrap_translation(
            envelope,
        )?))
    }

    async fn verify_credentials(&self, _record: &SettingsRecord) -> Result<()> {
        let probe = json!({"q": "test", "target": "en", "format": "text"});
        self.call(&probe).await?;
        Ok(())
    }
}
