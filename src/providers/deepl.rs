//! DeepL v2 text-translation client

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::core::backend::Backend;
use crate::core::errors::{Result, TranslationError};
use crate::core::input::TranslationUnit;
use crate::core::response::{malformed, DeepLTranslation, RawResponse};
use crate::core::settings::{DeepLOptions, ProviderOptions, SettingsRecord};
use crate::providers::{ensure_success, ProviderClient};

const PAID_ENDPOINT: &str = "https://api.deepl.com";
const FREE_ENDPOINT: &str = "https://api-free.deepl.com";

/// Envelope around the per-request translations array
#[derive(Debug, Deserialize)]
struct TranslateResponse {
    translations: Vec<DeepLTranslation>,
}

pub struct DeepLClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl DeepLClient {
    /// Free-tier keys carry a `:fx` suffix and live on a separate host
    pub fn new(http: reqwest::Client, api_key: impl Into<String>) -> Self {
        let api_key = api_key.into();
        let base_url = if api_key.ends_with(":fx") {
            FREE_ENDPOINT.to_string()
        } else {
            PAID_ENDPOINT.to_string()
        };
        Self {
            http,
            api_key,
            base_url,
        }
    }

    fn auth_header(&self) -> String {
        format!("DeepL-Auth-Key {}", self.api_key)
    }

    fn options(record: &SettingsRecord) -> Result<&DeepLOptions> {
        match &record.provider {
            ProviderOptions::DeepL(o) => Ok(o),
            _ => Err(TranslationError::InternalError(
                "settings record does not belong to deepl".to_string(),
            )),
        }
    }

    fn request_body(text: &str, options: &DeepLOptions) -> Value {
        let mut body = json!({
            "text": [text],
            "target_lang": options.target_lang,
            "split_sentences": options.split_sentences.as_param(),
        });

        if let Some(fields) = body.as_object_mut() {
            if let Some(source_lang) = &options.source_lang {
                fields.insert("source_lang".to_string(), json!(source_lang));
            }
            if let Some(context) = &options.context {
                fields.insert("context".to_string(), json!(context));
            }
            if let Some(preserve_formatting) = options.preserve_formatting {
                fields.insert(
                    "preserve_formatting".to_string(),
                    json!(preserve_formatting),
                );
            }
            if let Some(formality) = options.formality {
                fields.insert("formality".to_string(), json!(formality.as_param()));
            }
            if let Some(glossary_id) = &options.glossary_id {
                fields.insert("glossary_id".to_string(), json!(glossary_id));
            }
            if let Some(tag_handling) = options.tag_handling {
                fields.insert("tag_handling".to_string(), json!(tag_handling.as_param()));
            }
            if let Some(outline_detection) = options.outline_detection {
                fields.insert("outline_detection".to_string(), json!(outline_detection));
            }
            if !options.non_splitting_tags.is_empty() {
                fields.insert(
                    "non_splitting_tags".to_string(),
                    json!(options.non_splitting_tags),
                );
            }
            if !options.splitting_tags.is_empty() {
                fields.insert("splitting_tags".to_string(), json!(options.splitting_tags));
            }
            if !options.ignore_tags.is_empty() {
                fields.insert("ignore_tags".to_string(), json!(options.ignore_tags));
            }
        }
        body
    }
}

#[async_trait]
impl ProviderClient for DeepLClient {
    fn backend(&self) -> Backend {
        Backend::DeepL
    }

    async fn translate_unit(
        &self,
        unit: &TranslationUnit,
        record: &SettingsRecord,
    ) -> Result<RawResponse> {
        let options = Self::options(record)?;
        let body = Self::request_body(&unit.text, options);

        let response = self
            .http
            .post(format!("{}/v2/translate", self.base_url))
            .header("Authorization", self.auth_header())
            .json(&body)
            .send()
            .await?;
        let response = ensure_success(Backend::DeepL, response).await?;

        let parsed: TranslateResponse = response.json().await?;
        let translation = parsed
            .translations
            .into_iter()
            .next()
            .ok_or_else(|| malformed(Backend::DeepL, "empty translations array"))?;
        Ok(RawResponse::DeepL(translation))
    }

    async fn verify_credentials(&self, _record: &SettingsRecord) -> Result<()> {
        let response = self
            .http
            .get(format!("{}/v2/usage", self.base_url))
            .header("Authorization", self.auth_header())
            .send()
            .await?;
        ensure_success(Backend::DeepL, response).await?;
        Ok(())
    }
}
