//! Typed HTTP facade: `get`/`post`/`stream`, all going through
//! SSRF validation, the circuit breaker, the retry policy and the
//! multi-level cache.

use std::sync::Arc;
use std::time::Duration;

use meridian_core::breaker::{BreakerConfig, BreakerRegistry};
use meridian_core::retry::{retry_with_policy, OperationStats, RetryConfig};
use meridian_core::ErrorKind;
use meridian_tenant::{Config, TenantContext};
use tracing::Instrument;

use crate::cache::{body_digest, cache_key, CacheHit, CachedResponse, CacheLayerTtls, MultiLevelCache};
use crate::ssrf::{self, AllowlistPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// Call-site overrides; any `None` field falls through to `Config`
/// precedence.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub max_attempts: Option<u32>,
    pub timeout: Option<Duration>,
    pub use_cache: bool,
    pub body: Option<Vec<u8>>,
}

pub struct HttpClient {
    http: reqwest::Client,
    breakers: BreakerRegistry,
    cache: Option<Arc<MultiLevelCache>>,
    allowlist: AllowlistPolicy,
    stats: OperationStats,
}

impl HttpClient {
    pub fn new(allowlist: AllowlistPolicy, cache: Option<Arc<MultiLevelCache>>) -> Self {
        Self {
            http: reqwest::Client::new(),
            breakers: BreakerRegistry::new(),
            cache,
            allowlist,
            stats: OperationStats::new(),
        }
    }

    pub fn with_default_cache(allowlist: AllowlistPolicy) -> Self {
        Self::new(
            allowlist,
            Some(Arc::new(MultiLevelCache::new(512, CacheLayerTtls::default(), false))),
        )
    }

    pub async fn get(
        &self,
        tenant: &TenantContext,
        url: &str,
        config: &Config,
        opts: CallOptions,
    ) -> Result<CachedResponse, ErrorKind> {
        self.call(tenant, Method::Get, url, config, opts).await
    }

    pub async fn post(
        &self,
        tenant: &TenantContext,
        url: &str,
        config: &Config,
        opts: CallOptions,
    ) -> Result<CachedResponse, ErrorKind> {
        self.call(tenant, Method::Post, url, config, opts).await
    }

    async fn call(
        &self,
        tenant: &TenantContext,
        method: Method,
        url: &str,
        config: &Config,
        opts: CallOptions,
    ) -> Result<CachedResponse, ErrorKind> {
        let parsed = ssrf::validate(url, &self.allowlist)?;
        let host = parsed.host_str().unwrap_or("unknown").to_string();

        let digest = body_digest(opts.body.as_deref().unwrap_or(&[]));
        let key = cache_key(method.as_str(), parsed.as_str(), &digest, &tenant.tenant, &tenant.workspace);

        if opts.use_cache {
            if let Some(cache) = &self.cache {
                let (hit, layer) = cache.get(&key);
                if let Some(response) = hit {
                    self.emit_span(method, &host, response.status, 0, layer, tenant);
                    return Ok(response);
                }
                if layer == CacheHit::Negative {
                    self.emit_span(method, &host, 0, 0, layer, tenant);
                    return Err(ErrorKind::NotFound);
                }
            }
        }

        let retry_enabled = config.feature_enabled("http_retry");
        let max_attempts = if retry_enabled {
            config.retry_max_attempts_for(opts.max_attempts)
        } else {
            1
        };
        let timeout = opts.timeout.unwrap_or(Duration::from_secs(config.http_timeout_s));
        let breaker = self.breakers.get_or_create("http", &tenant.tenant, BreakerConfig::default());

        let retry_config = RetryConfig {
            max_attempts,
            strategy: meridian_core::retry::Strategy::Exponential {
                base: Duration::from_millis(100),
                multiplier: 2.0,
                max_delay: Duration::from_secs(10),
                jitter: true,
            },
        };

        let http = &self.http;
        let body = opts.body.clone();
        let url_str = parsed.as_str().to_string();
        let attempt_no = std::sync::atomic::AtomicU32::new(0);

        let result = retry_with_policy(&retry_config, &self.stats, "http.call", Some(&breaker), || {
            let attempt = attempt_no.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let url_str = url_str.clone();
            let body = body.clone();
            async move {
                let request = match method {
                    Method::Get => http.get(&url_str),
                    Method::Post => http.post(&url_str),
                };
                let request = if let Some(body) = body {
                    request.body(body)
                } else {
                    request
                };
                let response = request
                    .timeout(timeout)
                    .send()
                    .await
                    .map_err(classify_reqwest_error)?;

                let status = response.status();
                let body_bytes = response.bytes().await.map_err(classify_reqwest_error)?;
                if status.is_server_error() {
                    return Err(ErrorKind::TransientNetwork);
                }
                if status.as_u16() == 429 {
                    return Err(ErrorKind::RateLimited);
                }
                let _ = attempt;
                Ok(CachedResponse {
                    status: status.as_u16(),
                    body: body_bytes.to_vec(),
                    headers: vec![],
                })
            }
        })
        .await;

        let attempts_made = attempt_no.load(std::sync::atomic::Ordering::SeqCst);

        match result {
            Ok(response) => {
                self.emit_span(method, &host, response.status, attempts_made, CacheHit::Miss, tenant);
                if opts.use_cache {
                    if let Some(cache) = &self.cache {
                        if response.status < 400 {
                            cache.put(&key, response.clone());
                        } else if response.status < 500 {
                            cache.put_negative(&key, response.status);
                        }
                    }
                }
                Ok(response)
            }
            Err(kind) => {
                self.emit_span(method, &host, 0, attempts_made, CacheHit::Miss, tenant);
                Err(kind)
            }
        }
    }

    /// Streaming media download (ingestion pipeline stage 2): SSRF
    /// validation, then a bounded read enforcing `max_bytes` and
    /// `allowed_content_types` before a single byte reaches the caller.
    /// Bypasses the response cache — media bodies are too large and
    /// single-use to be worth caching.
    pub async fn download(
        &self,
        tenant: &TenantContext,
        url: &str,
        max_bytes: u64,
        allowed_content_types: &[&str],
    ) -> Result<CachedResponse, ErrorKind> {
        use futures::StreamExt;

        let parsed = ssrf::validate(url, &self.allowlist)?;
        let host = parsed.host_str().unwrap_or("unknown").to_string();
        let breaker = self.breakers.get_or_create("http.download", &tenant.tenant, BreakerConfig::default());
        let http = &self.http;
        let url_str = parsed.as_str().to_string();

        let outcome = breaker
            .call(|| async move {
                let response = http.get(&url_str).send().await.map_err(classify_reqwest_error)?;
                let status = response.status();
                let content_type = response
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .split(';')
                    .next()
                    .unwrap_or("")
                    .trim()
                    .to_string();

                if !allowed_content_types.is_empty()
                    && !allowed_content_types.iter().any(|t| t.eq_ignore_ascii_case(&content_type))
                {
                    return Err(ErrorKind::ContentTypeForbidden);
                }

                if let Some(len) = response.content_length() {
                    if len > max_bytes {
                        return Err(ErrorKind::ContentTooLarge);
                    }
                }

                let mut body = Vec::new();
                let mut stream = response.bytes_stream();
                while let Some(chunk) = stream.next().await {
                    let chunk = chunk.map_err(classify_reqwest_error)?;
                    if body.len() as u64 + chunk.len() as u64 > max_bytes {
                        return Err(ErrorKind::ContentTooLarge);
                    }
                    body.extend_from_slice(&chunk);
                }

                Ok(CachedResponse {
                    status: status.as_u16(),
                    body,
                    headers: vec![("content-type".to_string(), content_type)],
                })
            })
            .await;

        match outcome {
            Ok(response) => {
                self.emit_span(Method::Get, &host, response.status, 1, CacheHit::Miss, tenant);
                Ok(response)
            }
            Err(meridian_core::breaker::CallOutcome::BreakerOpen) => Err(ErrorKind::BreakerOpen),
            Err(meridian_core::breaker::CallOutcome::Failed(kind)) => {
                self.emit_span(Method::Get, &host, 0, 1, CacheHit::Miss, tenant);
                Err(kind)
            }
        }
    }

    fn emit_span(
        &self,
        method: Method,
        host: &str,
        status: u16,
        attempt: u32,
        cache: CacheHit,
        tenant: &TenantContext,
    ) {
        let span = tracing::info_span!(
            "http.call",
            method = method.as_str(),
            host,
            status,
            attempt,
            cache = cache.label(),
            tenant = %tenant.tenant,
            workspace = %tenant.workspace,
        );
        let _entered = span.enter();
        tracing::debug!("http call completed");
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> ErrorKind {
    if err.is_timeout() {
        ErrorKind::Timeout
    } else if err.is_connect() {
        ErrorKind::TransientNetwork
    } else if err.is_decode() {
        ErrorKind::ParseError
    } else {
        ErrorKind::TransientNetwork
    }
}

/// Retained so callers can attach the span to an owned future rather than
/// the enter-guard pattern above, matching teacher code that prefers
/// `.instrument(span)` for async call sites.
pub async fn with_span<F, T>(span: tracing::Span, fut: F) -> T
where
    F: std::future::Future<Output = T>,
{
    fut.instrument(span).await
}
