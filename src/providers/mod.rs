//! Backend service clients
//!
//! One client per supported service, all behind the [`ProviderClient`] trait
//! so the dispatch layer can drive any backend through the same call shape.

pub mod anthropic;
pub mod azure;
pub mod deepl;
pub mod gemini;
pub mod google;
pub mod openai;

#[cfg(test)]
pub(crate) mod mock;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::backend::Backend;
use crate::core::errors::{Result, TranslationError};
use crate::core::input::TranslationUnit;
use crate::core::response::RawResponse;
use crate::core::settings::SettingsRecord;

/// A configured client for one backend service.
///
/// `translate_unit` is the innermost network call: retry, pacing and
/// concurrency all wrap around it from the outside.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Backend this client talks to
    fn backend(&self) -> Backend;

    /// Translate one unit under the given settings record
    async fn translate_unit(
        &self,
        unit: &TranslationUnit,
        record: &SettingsRecord,
    ) -> Result<RawResponse>;

    /// Cheap round trip that proves the stored credentials are accepted.
    /// Probes that depend on configured values (endpoint, region, model)
    /// read them from the record.
    async fn verify_credentials(&self, record: &SettingsRecord) -> Result<()>;
}

/// Clients keyed by backend. Presence of a client means credentials have
/// been set for that backend.
#[derive(Default)]
pub struct ProviderSet {
    clients: HashMap<Backend, Arc<dyn ProviderClient>>,
}

impl ProviderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client, replacing any earlier one for the same backend
    pub fn insert(&mut self, client: Arc<dyn ProviderClient>) {
        self.clients.insert(client.backend(), client);
    }

    /// Look up the client for a backend, failing if none was configured
    pub fn get(&self, backend: Backend) -> Result<Arc<dyn ProviderClient>> {
        self.clients
            .get(&backend)
            .cloned()
            .ok_or(TranslationError::CredentialsNotSet { backend })
    }

    pub fn contains(&self, backend: Backend) -> bool {
        self.clients.contains_key(&backend)
    }
}

impl std::fmt::Debug for ProviderSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut backends: Vec<Backend> = self.clients.keys().copied().collect();
        backends.sort_by_key(|b| b.to_string());
        f.debug_struct("ProviderSet")
            .field("configured", &backends)
            .finish()
    }
}

/// Map a non-success HTTP status to an `ApiError` carrying the response body
pub(crate) async fn ensure_success(
    backend: Backend,
    response: reqwest::Response,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(TranslationError::ApiError {
        backend,
        status: status.as_u16(),
        message,
    })
}
