use serde::Serialize;

/// Stable error kinds, shared across every crate so callers can match on a
/// flat taxonomy instead of provider-specific error shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ConfigError,
    NoCredentialsAvailable,
    AuthError,
    RateLimited,
    TransientNetwork,
    ServerError,
    BadRequest,
    ContentFiltered,
    UnsupportedFeature,
    ToolExecutionFailed,
    ToolLoopExhausted,
    ParseError,
    ModelNotFound,
    Canceled,
}

impl ErrorKind {
    /// Whether the Request Executor should keep retrying this kind by itself
    /// before giving up and propagating it to the caller.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::TransientNetwork
                | ErrorKind::ServerError
                | ErrorKind::RateLimited
                | ErrorKind::AuthError
        )
    }
}

/// The library's single error type. Every raised error exposes `{kind,
/// provider?, model?, attempt_count?, underlying message, retryable}`.
#[derive(Debug, thiserror::Error)]
#[error("{kind:?}: {message}{}", attempt_suffix(*attempt_count))]
pub struct GatewayError {
    pub kind: ErrorKind,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub attempt_count: Option<u32>,
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

fn attempt_suffix(attempt_count: Option<u32>) -> String {
    match attempt_count {
        Some(n) => format!(" (after {n} attempt(s))"),
        None => String::new(),
    }
}

impl GatewayError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            provider: None,
            model: None,
            attempt_count: None,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_attempt_count(mut self, attempt_count: u32) -> Self {
        self.attempt_count = Some(attempt_count);
        self
    }

    pub fn with_source(
        mut self,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Whether the Request Executor would retry an error of this kind.
    pub fn retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}
