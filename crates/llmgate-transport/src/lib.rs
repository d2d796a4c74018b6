//! Thin HTTP transport over which adapters send provider requests, built on
//! plain `reqwest` since this library has no need for TLS-fingerprint
//! impersonation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::Mutex;

pub type Headers = Vec<(String, String)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Headers,
    pub body: Option<Bytes>,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Present whenever the provider's own rate-limit response names a
    /// cooldown (exponential-on-failure default; an
    /// explicit `Retry-After` overrides it when the adapter asks for it).
    pub fn retry_after(&self) -> Option<Duration> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("retry-after"))
            .and_then(|(_, v)| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }
}

/// Transport-level failure kind, used by the executor to classify retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    Connect,
    Dns,
    Tls,
    Other,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("transport error ({kind:?}): {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub proxy: Option<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(60),
            proxy: None,
        }
    }
}

/// A `reqwest`-backed transport. Clients are cached by proxy setting, since
/// building one is expensive and most deployments never change it.
#[derive(Clone)]
pub struct Transport {
    config: TransportConfig,
    clients: Arc<Mutex<HashMap<Option<String>, reqwest::Client>>>,
}

impl Transport {
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            clients: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    async fn client(&self) -> Result<reqwest::Client, TransportError> {
        let mut guard = self.clients.lock().await;
        if let Some(client) = guard.get(&self.config.proxy) {
            return Ok(client.clone());
        }
        let client = build_client(&self.config).map_err(|e| TransportError {
            kind: TransportErrorKind::Other,
            message: e.to_string(),
        })?;
        guard.insert(self.config.proxy.clone(), client.clone());
        Ok(client)
    }

    pub async fn send(&self, req: HttpRequest) -> Result<HttpResponse, TransportError> {
        let client = self.client().await?;
        let method = match req.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
        };
        let mut builder = client.request(method, &req.url);
        for (k, v) in &req.headers {
            builder = builder.header(k, v);
        }
        if let Some(body) = req.body {
            builder = builder.body(body);
        }

        let resp = builder.send().await.map_err(map_reqwest_error)?;
        let status = resp.status().as_u16();
        let headers = headers_from_reqwest(resp.headers());
        let body = resp.bytes().await.map_err(map_reqwest_error)?;
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn build_client(config: &TransportConfig) -> Result<reqwest::Client, reqwest::Error> {
    let mut builder = reqwest::Client::builder()
        .connect_timeout(config.connect_timeout)
        .timeout(config.request_timeout);
    if let Some(proxy) = &config.proxy {
        builder = builder.proxy(reqwest::Proxy::all(proxy)?);
    }
    builder.build()
}

fn headers_from_reqwest(map: &reqwest::header::HeaderMap) -> Headers {
    map.iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
        .collect()
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    TransportError {
        kind: classify_reqwest_error(&err),
        message: err.to_string(),
    }
}

fn classify_reqwest_error(err: &reqwest::Error) -> TransportErrorKind {
    if err.is_timeout() {
        return TransportErrorKind::Timeout;
    }
    if err.is_connect() {
        let message = err.to_string().to_ascii_lowercase();
        if message.contains("dns") || message.contains("resolve") {
            return TransportErrorKind::Dns;
        }
        if message.contains("tls") || message.contains("ssl") {
            return TransportErrorKind::Tls;
        }
        return TransportErrorKind::Connect;
    }
    TransportErrorKind::Other
}
