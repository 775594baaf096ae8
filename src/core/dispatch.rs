//! Dispatch engine: serial and bounded-concurrent batch execution
//!
//! Wraps retry, pacing and per-unit logging around the provider's innermost
//! call. Validation and settings writes happen before dispatch; nothing here
//! mutates shared state.

use std::sync::Arc;
use std::time::Instant;

use futures::future::try_join_all;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::debug;

use crate::core::errors::{Result, TranslationError};
use crate::core::input::TranslationUnit;
use crate::core::logs;
use crate::core::response::RawResponse;
use crate::core::settings::{DelayMode, SettingsRecord};
use crate::providers::ProviderClient;

/// Executes a prepared batch against one backend under its settings record
pub(crate) struct Dispatcher<'a> {
    client: &'a dyn ProviderClient,
    record: &'a SettingsRecord,
}

impl<'a> Dispatcher<'a> {
    pub(crate) fn new(client: &'a dyn ProviderClient, record: &'a SettingsRecord) -> Self {
        Self { client, record }
    }

    /// Scalar path: one unit, no semaphore, no delay
    pub(crate) async fn run_single(&self, unit: &TranslationUnit) -> Result<RawResponse> {
        self.call_unit(unit).await
    }

    /// Serial path: units in input order, sleeping the configured delay
    /// between consecutive units
    pub(crate) async fn run_serial(&self, units: &[TranslationUnit]) -> Result<Vec<RawResponse>> {
        let mut results = Vec::with_capacity(units.len());
        for (index, unit) in units.iter().enumerate() {
            if index > 0 {
                if let Some(delay) = self.record.delay {
                    sleep(delay).await;
                }
            }
            results.push(self.call_unit(unit).await?);
        }
        Ok(results)
    }

    /// Concurrent path: one future per unit, bounded by the backend's
    /// semaphore, results index-correlated with the input.
    ///
    /// All unit futures are polled within the caller's task; dropping the
    /// returned future cancels every in-flight unit. The first failure fails
    /// the whole batch.
    pub(crate) async fn run_concurrent(
        &self,
        units: &[TranslationUnit],
    ) -> Result<Vec<RawResponse>> {
        let pacer: Mutex<Option<Instant>> = Mutex::new(None);
        let futures = units.iter().map(|unit| {
            let semaphore = Arc::clone(&self.record.semaphore);
            let pacer = &pacer;
            async move {
                let _permit = semaphore.acquire().await.map_err(|_| {
                    TranslationError::InternalError("semaphore closed".to_string())
                })?;
                match (self.record.delay_mode, self.record.delay) {
                    (DelayMode::PerRequest, Some(delay)) => {
                        sleep(delay).await;
                        self.call_unit(unit).await
                    }
                    (DelayMode::BetweenCompletions, Some(delay)) => {
                        // the lock is held across the request, so a unit
                        // starts only after the delay has elapsed since the
                        // previous completion
                        let mut last_done = pacer.lock().await;
                        if let Some(done_at) = *last_done {
                            let since = done_at.elapsed();
                            if since < delay {
                                sleep(delay - since).await;
                            }
                        }
                        let result = self.call_unit(unit).await;
                        *last_done = Some(Instant::now());
                        result
                    }
                    (_, None) => self.call_unit(unit).await,
                }
            }
        });
        try_join_all(futures).await
    }

    /// Retry policy around the provider call, then the optional per-unit
    /// log entry. Without a policy the provider is called exactly once.
    async fn call_unit(&self, unit: &TranslationUnit) -> Result<RawResponse> {
        let result = match self.record.retry {
            Some(policy) => {
                policy
                    .run(|| self.client.translate_unit(unit, self.record))
                    .await
            }
            None => self.client.translate_unit(unit, self.record).await,
        };
        if let Err(e) = &result {
            debug!(backend = %self.record.backend(), error = %e, "unit failed");
        }
        if let Some(directory) = &self.record.log_directory {
            let status = match &result {
                Ok(_) => "ok".to_string(),
                Err(e) => format!("error: {e}"),
            };
            logs::append_entry(directory, self.record.backend(), &status, &unit.text).await;
        }
        result
    }
}
