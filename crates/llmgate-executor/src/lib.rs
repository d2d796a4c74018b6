//! Wraps a single adapter+credential+HTTP attempt with a retry policy:
//! bounded exponential backoff with jitter, rotating to a fresh credential
//! on auth/rate-limit failures and retrying the same one on transient or
//! server errors.

use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use llmgate_adapter::{Adapter, ProviderConfig};
use llmgate_credential::{AcquireError, CredentialStore, FailureKind};
use llmgate_transport::{Transport, TransportError};
use llmgate_types::{ErrorKind, GatewayError, LLMRequest, LLMResponse};

#[derive(Debug, Clone, Copy)]
pub struct ExecutorConfig {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    /// Symmetric jitter fraction applied to the computed backoff, e.g. 0.25
    /// for ±25%.
    pub jitter: f32,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            jitter: 0.25,
        }
    }
}

/// How an error classifies for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Classification {
    RetrySameCredential,
    RetryNewCredential,
    Fatal,
}

fn classify(kind: ErrorKind) -> Classification {
    match kind {
        ErrorKind::TransientNetwork | ErrorKind::ServerError => Classification::RetrySameCredential,
        ErrorKind::RateLimited | ErrorKind::AuthError => Classification::RetryNewCredential,
        _ => Classification::Fatal,
    }
}

pub struct RequestExecutor {
    transport: Transport,
    config: ExecutorConfig,
}

impl RequestExecutor {
    pub fn new(transport: Transport, config: ExecutorConfig) -> Self {
        Self { transport, config }
    }

    pub async fn execute(
        &self,
        adapter: &dyn Adapter,
        credential_store: &CredentialStore,
        provider_cfg: &ProviderConfig,
        model: &str,
        request: &LLMRequest,
        cancel: &CancellationToken,
    ) -> Result<LLMResponse, GatewayError> {
        let mut last_error: Option<GatewayError> = None;

        for attempt_no in 1..=self.config.max_attempts {
            if cancel.is_cancelled() {
                return Err(canceled(model, attempt_no));
            }

            let credential = match credential_store.acquire(true).await {
                Ok(cred) => cred,
                Err(AcquireError::NoCredentialsAvailable) => {
                    return Err(GatewayError::new(
                        ErrorKind::NoCredentialsAvailable,
                        format!("no active credentials for provider '{}'", credential_store.provider()),
                    )
                    .with_model(model)
                    .with_attempt_count(attempt_no));
                }
            };

            let http_request = match adapter.build_request(request, &credential, provider_cfg, model) {
                Ok(req) => req,
                Err(err) => return Err(err.with_model(model).with_attempt_count(attempt_no)),
            };

            let sent = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(canceled(model, attempt_no)),
                result = self.transport.send(http_request) => result,
            };

            let http_response = match sent {
                Ok(resp) => resp,
                Err(transport_err) => {
                    let gateway_err = transport_error_to_gateway(transport_err, model);
                    credential_store
                        .report_failure(credential.id, FailureKind::Transient)
                        .await;
                    debug!(attempt = attempt_no, "transport error, will retry if attempts remain");
                    last_error = Some(gateway_err);
                    if self.sleep_before_retry(attempt_no, cancel).await.is_err() {
                        return Err(canceled(model, attempt_no));
                    }
                    continue;
                }
            };

            match adapter.parse_response(&http_response, provider_cfg) {
                Ok(response) => {
                    credential_store.report_success(credential.id).await;
                    return Ok(response);
                }
                Err(err) => {
                    match classify(err.kind) {
                        Classification::Fatal => {
                            return Err(err.with_model(model).with_attempt_count(attempt_no));
                        }
                        Classification::RetrySameCredential => {
                            credential_store
                                .report_failure(credential.id, FailureKind::Transient)
                                .await;
                        }
                        Classification::RetryNewCredential => {
                            let failure_kind = if err.kind == ErrorKind::AuthError {
                                FailureKind::AuthError
                            } else {
                                FailureKind::RateLimit
                            };
                            credential_store.report_failure(credential.id, failure_kind).await;
                        }
                    }
                    warn!(attempt = attempt_no, kind = ?err.kind, "request failed, retrying");
                    last_error = Some(err);
                    if self.sleep_before_retry(attempt_no, cancel).await.is_err() {
                        return Err(canceled(model, attempt_no));
                    }
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| GatewayError::new(ErrorKind::ServerError, "exhausted retries"))
            .with_model(model)
            .with_attempt_count(self.config.max_attempts))
    }

    /// Same retry policy as `execute`, applied to the embeddings operation.
    pub async fn execute_embed(
        &self,
        adapter: &dyn Adapter,
        credential_store: &CredentialStore,
        provider_cfg: &ProviderConfig,
        model: &str,
        texts: &[String],
        task_type: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Vec<f32>>, GatewayError> {
        let mut last_error: Option<GatewayError> = None;

        for attempt_no in 1..=self.config.max_attempts {
            if cancel.is_cancelled() {
                return Err(canceled(model, attempt_no));
            }

            let credential = match credential_store.acquire(true).await {
                Ok(cred) => cred,
                Err(AcquireError::NoCredentialsAvailable) => {
                    return Err(GatewayError::new(
                        ErrorKind::NoCredentialsAvailable,
                        format!("no active credentials for provider '{}'", credential_store.provider()),
                    )
                    .with_model(model)
                    .with_attempt_count(attempt_no));
                }
            };

            let http_request =
                match adapter.build_embed_request(texts, &credential, provider_cfg, model, task_type) {
                    Ok(req) => req,
                    Err(err) => return Err(err.with_model(model).with_attempt_count(attempt_no)),
                };

            let sent = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(canceled(model, attempt_no)),
                result = self.transport.send(http_request) => result,
            };

            let http_response = match sent {
                Ok(resp) => resp,
                Err(transport_err) => {
                    let gateway_err = transport_error_to_gateway(transport_err, model);
                    credential_store
                        .report_failure(credential.id, FailureKind::Transient)
                        .await;
                    last_error = Some(gateway_err);
                    if self.sleep_before_retry(attempt_no, cancel).await.is_err() {
                        return Err(canceled(model, attempt_no));
                    }
                    continue;
                }
            };

            match adapter.parse_embed_response(&http_response) {
                Ok(vectors) => {
                    credential_store.report_success(credential.id).await;
                    return Ok(vectors);
                }
                Err(err) => {
                    match classify(err.kind) {
                        Classification::Fatal => {
                            return Err(err.with_model(model).with_attempt_count(attempt_no));
                        }
                        Classification::RetrySameCredential => {
                            credential_store
                                .report_failure(credential.id, FailureKind::Transient)
                                .await;
                        }
                        Classification::RetryNewCredential => {
                            let failure_kind = if err.kind == ErrorKind::AuthError {
                                FailureKind::AuthError
                            } else {
                                FailureKind::RateLimit
                            };
                            credential_store.report_failure(credential.id, failure_kind).await;
                        }
                    }
                    last_error = Some(err);
                    if self.sleep_before_retry(attempt_no, cancel).await.is_err() {
                        return Err(canceled(model, attempt_no));
                    }
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| GatewayError::new(ErrorKind::ServerError, "exhausted retries"))
            .with_model(model)
            .with_attempt_count(self.config.max_attempts))
    }

    /// Sleeps out the backoff delay for `attempt_no`, racing it against
    /// `cancel` so a canceled call doesn't wait out a multi-second backoff
    /// before noticing. `Err(())` means the caller was canceled mid-sleep.
    async fn sleep_before_retry(&self, attempt_no: u32, cancel: &CancellationToken) -> Result<(), ()> {
        if attempt_no >= self.config.max_attempts {
            return Ok(());
        }
        let delay = self.backoff_delay(attempt_no);
        if delay.is_zero() {
            return Ok(());
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(()),
            _ = sleep(delay) => Ok(()),
        }
    }

    /// `min(base·2^(n-1), max) · (1±jitter)`.
    fn backoff_delay(&self, attempt_no: u32) -> Duration {
        let step = attempt_no.saturating_sub(1).min(16);
        let exp = self.config.base_backoff.saturating_mul(1u32.checked_shl(step).unwrap_or(u32::MAX));
        let capped = exp.min(self.config.max_backoff);
        let jitter_factor = 1.0 + (rand::random::<f32>() * 2.0 - 1.0) * self.config.jitter;
        capped.mul_f32(jitter_factor.max(0.0))
    }
}

fn transport_error_to_gateway(err: TransportError, model: &str) -> GatewayError {
    GatewayError::new(ErrorKind::TransientNetwork, err.message.clone())
        .with_model(model)
        .with_source(err)
}

fn canceled(model: &str, attempt_no: u32) -> GatewayError {
    GatewayError::new(ErrorKind::Canceled, "operation canceled")
        .with_model(model)
        .with_attempt_count(attempt_no)
}
