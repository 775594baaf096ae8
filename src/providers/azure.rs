//! Azure Translator client

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::core::backend::Backend;
use crate::core::errors::{Result, TranslationError};
use crate::core::input::TranslationUnit;
use crate::core::response::{malformed, RawResponse};
use crate::core::settings::{AzureOptions, ProviderOptions, SettingsRecord};
use crate::providers::{ensure_success, ProviderClient};

pub struct AzureClient {
    http: reqwest::Client,
    api_key: String,
}

impl AzureClient {
    pub fn new(http: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            http,
            api_key: api_key.into(),
        }
    }

    fn options(record: &SettingsRecord) -> Result<&AzureOptions> {
        match &record.provider {
            ProviderOptions::Azure(o) => Ok(o),
            _ => Err(TranslationError::InternalError(
                "settings record does not belong to azure".to_string(),
            )),
        }
    }

    fn query_params(options: &AzureOptions) -> Vec<(&'static str, &str)> {
        let mut params = vec![
            ("api-version", options.api_version.as_str()),
            ("to", options.target_lang.as_str()),
        ];
        if let Some(source_lang) = &options.source_lang {
            params.push(("from", source_lang.as_str()));
        }
        params
    }

    /// The service answers one result object per input text; a single-text
    /// request unwraps to that object
    fn unwrap_element(mut envelope: Value) -> Result<Value> {
        envelope
            .get_mut(0)
            .map(Value::take)
            .ok_or_else(|| malformed(Backend::Azure, "expected a non-empty response array"))
    }

    async fn call(&self, options: &AzureOptions, text: &str) -> Result<Value> {
        let url = format!("{}/translate", options.endpoint.trim_end_matches('/'));
        let response = self
            .http
            .post(url)
            .query(&Self::query_params(options))
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .header("Ocp-Apim-Subscription-Region", &options.region)
            .json(&json!([{"Text": text}]))
            .send()
            .await?;
        let response = ensure_success(Backend::Azure, response).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl ProviderClient for AzureClient {
    fn backend(&self) -> Backend {
        Backend::Azure
    }

    async fn translate_unit(
        &self,
        unit: &TranslationUnit,
        record: &SettingsRecord,
    ) -> Result<RawResponse> {
        let options = Self::options(record)?;
        let envelope = self.call(options, &unit.text).await?;
        Ok(RawResponse::Azure(Self::unwrap_element(envelope)?))
    }

    async fn verify_credentials(&self, record: &SettingsRecord) -> Result<()> {
        // region-scoped keys only verify against their own endpoint and region
        self.call(Self::options(record)?, "test").await?;
        Ok(())
    }
}
