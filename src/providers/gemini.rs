//! Gemini generateContent client

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::core::backend::Backend;
use crate::core::errors::{Result, TranslationError};
use crate::core::input::TranslationUnit;
use crate::core::response::{GeminiResponse, RawResponse};
use crate::core::settings::{GeminiOptions, ProviderOptions, SettingsRecord};
use crate::providers::{ensure_success, ProviderClient};

const API_BASE: &str = "https://generativelanguage.googleapis.com";

/// All filter categories are disabled so translations come back unaltered
fn safety_settings() -> Value {
    json!([
        {"category": "HARM_CATEGORY_HARASSMENT", "threshold": "BLOCK_NONE"},
        {"category": "HARM_CATEGORY_HATE_SPEECH", "threshold": "BLOCK_NONE"},
        {"category": "HARM_CATEGORY_SEXUALLY_EXPLICIT", "threshold": "BLOCK_NONE"},
        {"category": "HARM_CATEGORY_DANGEROUS_CONTENT", "threshold": "BLOCK_NONE"},
    ])
}

/// Only the 1.5 generation takes a dedicated system instruction
fn supports_system_instruction(model: &str) -> bool {
    model.starts_with("gemini-1.5")
}

pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
}

impl GeminiClient {
    pub fn new(http: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            http,
            api_key: api_key.into(),
        }
    }

    fn options(record: &SettingsRecord) -> Result<&GeminiOptions> {
        match &record.provider {
            ProviderOptions::Gemini(o) => Ok(o),
            _ => Err(TranslationError::InternalError(
                "settings record does not belong to gemini".to_string(),
            )),
        }
    }

    fn generation_config(record: &SettingsRecord, options: &GeminiOptions) -> Value {
        let mut config = json!({
            "temperature": options.temperature,
            "topP": options.top_p,
            "topK": options.top_k,
            "candidateCount": options.candidate_count,
        });
        if let Some(fields) = config.as_object_mut() {
            if let Some(stop_sequences) = &options.stop_sequences {
                fields.insert("stopSequences".to_string(), json!(stop_sequences));
            }
            if let Some(max_output_tokens) = options.max_output_tokens {
                fields.insert("maxOutputTokens".to_string(), json!(max_output_tokens));
            }
            if record.json_mode {
                fields.insert("responseMimeType".to_string(), json!("application/json"));
                if let Some(schema) = &record.response_schema {
                    fields.insert("responseSchema".to_string(), schema.clone());
                }
            }
        }
        config
    }

    fn request_body(unit: &TranslationUnit, record: &SettingsRecord, options: &GeminiOptions) -> Value {
        let instructions = unit.instructions.as_deref().unwrap_or(&record.instructions);
        let generation_config = Self::generation_config(record, options);

        // older models have no system-instruction field; the instructions are
        // prepended to the user text instead
        if supports_system_instruction(&options.model) {
            json!({
                "contents": [{"role": "user", "parts": [{"text": unit.text}]}],
                "systemInstruction": {"parts": [{"text": instructions}]},
                "generationConfig": generation_config,
                "safetySettings": safety_settings(),
            })
        } else {
            let combined = format!("{instructions}\n{}", unit.text);
            json!({
                "contents": [{"role": "user", "parts": [{"text": combined}]}],
                "generationConfig": generation_config,
                "safetySettings": safety_settings(),
            })
        }
    }
}

#[async_trait]
impl ProviderClient for GeminiClient {
    fn backend(&self) -> Backend {
        Backend::Gemini
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
            .post(format!(
                "{API_BASE}/v1beta/models/{}:generateContent",
                options.model
            ))
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;
        let response = ensure_success(Backend::Gemini, response).await?;

        let parsed: GeminiResponse = response.json().await?;
        Ok(RawResponse::Gemini(parsed))
    }

    async fn verify_credentials(&self, _record: &SettingsRecord) -> Result<()> {
        let response = self
            .http
            .get(format!("{API_BASE}/v1beta/models"))
            .query(&[("key", self.api_key.as_str()), ("pageSize", "1")])
            .send()
            .await?;
        ensure_success(Backend::Gemini, response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::backend::ResponseMode;
    use crate::core::settings::{SettingsRegistry, TranslateOptions};

    fn record(options: TranslateOptions) -> SettingsRecord {
        let mut registry = SettingsRegistry::new();
        let backend = options.backend();
        registry.apply(options.provider, &options.call);
        registry.get(backend).clone()
    }

    #[test]
    fn test_instructions_prepended_for_older_models() {
        let record = record(TranslateOptions::from(GeminiOptions::default()));
        let options = GeminiClient::options(&record).unwrap();
        let body = GeminiClient::request_body(&TranslationUnit::new("hello"), &record, options);

        let text = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert_eq!(
            text,
            "Please translate the following text into English.\nhello"
        );
        assert!(body.get("systemInstruction").is_none());

        let config = &body["generationConfig"];
        assert_eq!(config["topK"], 40);
        assert_eq!(config["candidateCount"], 1);
        assert!((config["temperature"].as_f64().unwrap() - 0.5).abs() < 1e-6);
        assert!((config["topP"].as_f64().unwrap() - 0.9).abs() < 1e-6);
        assert_eq!(body["safetySettings"].as_array().unwrap().len(), 4);
        for setting in body["safetySettings"].as_array().unwrap() {
            assert_eq!(setting["threshold"], "BLOCK_NONE");
        }
    }

    #[test]
    fn test_system_instruction_for_one_five_models() {
        let record = record(TranslateOptions::from(GeminiOptions::new(
            "gemini-1.5-pro-latest",
        )));
        let options = GeminiClient::options(&record).unwrap();
        let body = GeminiClient::request_body(&TranslationUnit::new("hello"), &record, options);

        assert_eq!(body["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(
            body["systemInstruction"]["parts"][0]["text"],
            "Please translate the following text into English."
        );
    }

    #[test]
    fn test_json_mode_sets_mime_type_and_schema() {
        let schema = json!({"type": "object", "properties": {"translation": {"type": "string"}}});
        let record = record(
            TranslateOptions::from(GeminiOptions::default())
                .with_response_mode(ResponseMode::Json)
                .with_response_schema(schema.clone()),
        );
        let options = GeminiClient::options(&record).unwrap();
        let body = GeminiClient::request_body(&TranslationUnit::new("hi"), &record, options);

        let config = &body["generationConfig"];
        assert_eq!(config["responseMimeType"], "application/json");
        assert_eq!(config["responseSchema"], schema);
    }
}
