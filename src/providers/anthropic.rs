//! Anthropic messages client

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::core::backend::Backend;
use crate::core::errors::{Result, TranslationError};
use crate::core::input::TranslationUnit;
use crate::core::response::{AnthropicMessage, RawResponse};
use crate::core::settings::{AnthropicOptions, ProviderOptions, SettingsRecord};
use crate::providers::{ensure_success, ProviderClient};

const API_BASE: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

/// Tool the model is forced to call in JSON mode; its input is the payload
const JSON_TOOL_NAME: &str = "respond_in_json";

pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
}

impl AnthropicClient {
    pub fn new(http: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            http,
            api_key: api_key.into(),
        }
    }

    fn options(record: &SettingsRecord) -> Result<&AnthropicOptions> {
        match &record.provider {
            ProviderOptions::Anthropic(o) => Ok(o),
            _ => Err(TranslationError::InternalError(
                "settings record does not belong to anthropic".to_string(),
            )),
        }
    }

    fn json_tool(schema: Option<&Value>) -> Value {
        let input_schema = schema.cloned().unwrap_or_else(|| json!({"type": "object"}));
        json!({
            "name": JSON_TOOL_NAME,
            "description": "Return the translation as a JSON object.",
            "input_schema": input_schema,
        })
    }

    fn request_body(
        unit: &TranslationUnit,
        record: &SettingsRecord,
        options: &AnthropicOptions,
    ) -> Value {
        let instructions = unit.instructions.as_deref().unwrap_or(&record.instructions);
        let mut body = json!({
            "model": options.model,
            "max_tokens": options.max_tokens,
            "system": instructions,
            "messages": [{"role": "user", "content": unit.text}],
        });
        if let Some(fields) = body.as_object_mut() {
            if let Some(temperature) = options.temperature {
                fields.insert("temperature".to_string(), json!(temperature));
            }
            if let Some(top_p) = options.top_p {
                fields.insert("top_p".to_string(), json!(top_p));
            }
            if let Some(top_k) = options.top_k {
                fields.insert("top_k".to_string(), json!(top_k));
            }
            if let Some(stop_sequences) = &options.stop_sequences {
                fields.insert("stop_sequences".to_string(), json!(stop_sequences));
            }
            if record.json_mode {
                fields.insert(
                    "tools".to_string(),
                    json!([Self::json_tool(record.response_schema.as_ref())]),
                );
                fields.insert(
                    "tool_choice".to_string(),
                    json!({"type": "tool", "name": JSON_TOOL_NAME}),
                );
            }
        }
        body
    }
}

#[async_trait]
impl ProviderClient for AnthropicClient {
    fn backend(&self) -> Backend {
        Backend::Anthropic
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
            .post(format!("{API_BASE}/v1/messages"))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await?;
        let response = ensure_success(Backend::Anthropic, response).await?;

        let message: AnthropicMessage = response.json().await?;
        Ok(RawResponse::Anthropic(message))
    }

    async fn verify_credentials(&self, record: &SettingsRecord) -> Result<()> {
        // one-token message against the configured model; the cheapest call
        // that exercises the key
        let body = json!({
            "model": Self::options(record)?.model,
            "max_tokens": 1,
            "messages": [{"role": "user", "content": "1"}],
        });
        let response = self
            .http
            .post(format!("{API_BASE}/v1/messages"))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await?;
        ensure_success(Backend::Anthropic, response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::backend::ResponseMode;
    use crate::core::settings::{SettingsRegistry, TranslateOptions};
    use assert_json_diff::assert_json_eq;

    fn record(options: TranslateOptions) -> SettingsRecord {
        let mut registry = SettingsRegistry::new();
        let backend = options.backend();
        registry.apply(options.provider, &options.call);
        registry.get(backend).clone()
    }

    #[test]
    fn test_minimal_body() {
        let record = record(TranslateOptions::from(AnthropicOptions::default()));
        let options = AnthropicClient::options(&record).unwrap();
        let body =
            AnthropicClient::request_body(&TranslationUnit::new("hello"), &record, options);
        assert_json_eq!(
            body,
            json!({
                "model": "claude-3-haiku-20240307",
                "max_tokens": 4096,
                "system": "Please translate the following text into English.",
                "messages": [{"role": "user", "content": "hello"}],
            })
        );
    }

    #[test]
    fn test_json_mode_forces_the_tool() {
        let schema = json!({"type": "object", "properties": {"translation": {"type": "string"}}});
        let record = record(
            TranslateOptions::from(AnthropicOptions::default())
                .with_response_mode(ResponseMode::Json)
                .with_response_schema(schema.clone()),
        );
        let options = AnthropicClient::options(&record).unwrap();
        let body = AnthropicClient::request_body(&TranslationUnit::new("hi"), &record, options);

        assert_eq!(body["tool_choice"], json!({"type": "tool", "name": "respond_in_json"}));
        assert_eq!(body["tools"][0]["name"], "respond_in_json");
        assert_eq!(body["tools"][0]["input_schema"], schema);
        let system = body["system"].as_str().unwrap();
        assert!(system.ends_with("Respond only by calling the provided tool."));
    }

    #[test]
    fn test_json_mode_without_schema_uses_open_object() {
        let record = record(
            TranslateOptions::from(AnthropicOptions::default())
                .with_response_mode(ResponseMode::Json),
        );
        let options = AnthropicClient::options(&record).unwrap();
        let body = AnthropicClient::request_body(&TranslationUnit::new("hi"), &record, options);
        assert_eq!(body["tools"][0]["input_schema"], json!({"type": "object"}));
    }
}
