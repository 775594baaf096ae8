//! OpenAI chat-completions client

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::core::backend::Backend;
use crate::core::errors::{Result, TranslationError};
use crate::core::input::TranslationUnit;
use crate::core::response::{ChatCompletion, RawResponse};
use crate::core::settings::{OpenAiOptions, ProviderOptions, SettingsRecord};
use crate::providers::{ensure_success, ProviderClient};

const API_BASE: &str = "https://api.openai.com";

pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(http: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            http,
            api_key: api_key.into(),
        }
    }

    fn options(record: &SettingsRecord) -> Result<&OpenAiOptions> {
        match &record.provider {
            ProviderOptions::OpenAi(o) => Ok(o),
            _ => Err(TranslationError::InternalError(
                "settings record does not belong to openai".to_string(),
            )),
        }
    }

    fn request_body(unit: &TranslationUnit, record: &SettingsRecord, options: &OpenAiOptions) -> Value {
        // per-unit instructions win over the record's
        let instructions = unit.instructions.as_deref().unwrap_or(&record.instructions);
        let mut body = json!({
            "model": options.model,
            "messages": [
                {"role": "system", "content": instructions},
                {"role": "user", "content": unit.text},
            ],
        });
        if let Some(fields) = body.as_object_mut() {
            if let Some(temperature) = options.temperature {
                fields.insert("temperature".to_string(), json!(temperature));
            }
            if let Some(top_p) = options.top_p {
                fields.insert("top_p".to_string(), json!(top_p));
            }
            if let Some(stop) = &options.stop {
                fields.insert("stop".to_string(), json!(stop));
            }
            if let Some(max_tokens) = options.max_tokens {
                fields.insert("max_tokens".to_string(), json!(max_tokens));
            }
            if let Some(presence_penalty) = options.presence_penalty {
                fields.insert("presence_penalty".to_string(), json!(presence_penalty));
            }
            if let Some(frequency_penalty) = options.frequency_penalty {
                fields.insert("frequency_penalty".to_string(), json!(frequency_penalty));
            }
            if record.json_mode {
                fields.insert("response_format".to_string(), json!({"type": "json_object"}));
            }
        }
        body
    }
}

#[async_trait]
impl ProviderClient for OpenAiClient {
    fn backend(&self) -> Backend {
        Backend::OpenAi
    }

    async fn translate_unit(
        &self,
        unit: &TranslationUnit,
        record: &SettingsRecord,
    ) -> Result<RawResponse> {
        let options = Self::options(record)?;
        let body = Self::request_body(unit, record, options);

        let response = self
            .http
            .post(format!("{API_BASE}/v1/chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let response = ensure_success(Backend::OpenAi, response).await?;

        let completion: ChatCompletion = response.json().await?;
        Ok(RawResponse::OpenAi(completion))
    }

    async fn verify_credentials(&self, _record: &SettingsRecord) -> Result<()> {
        let response = self
            .http
            .get(format!("{API_BASE}/v1/models"))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        ensure_success(Backend::OpenAi, response).await?;
        Ok(())
    }
}
