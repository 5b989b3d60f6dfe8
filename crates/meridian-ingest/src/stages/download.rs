//! Stage 2: media download through the dispatch wrapper —
//! SSRF-validated host, size cap, content-type check, all enforced by
//! [`meridian_http::HttpClient::download`] before a byte reaches here.

use meridian_core::StepResult;
use meridian_http::HttpClient;
use meridian_tenant::TenantContext;

pub const DEFAULT_MAX_MEDIA_BYTES: u64 = 500 * 1024 * 1024;
pub const DEFAULT_ALLOWED_CONTENT_TYPES: &[&str] =
    &["video/mp4", "audio/mpeg", "audio/mp4", "audio/webm", "video/webm", "text/plain"];

pub async fn download_media(
    http: &HttpClient,
    tenant: &TenantContext,
    url: &str,
    max_bytes: u64,
    allowed_content_types: &[&str],
) -> StepResult<Vec<u8>> {
    match http.download(tenant, url, max_bytes, allowed_content_types).await {
        Ok(response) => StepResult::ok(response.body),
        Err(kind) => StepResult::fail(kind, "media download failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_http::AllowlistPolicy;

    #[tokio::test]
    async fn rejects_disallowed_host_before_any_network_call() {
        let http = HttpClient::new(AllowlistPolicy::default(), None);
        let tenant = TenantContext::new("t1", "w1");
        let result = download_media(&http, &tenant, "http://127.0.0.1/video.mp4", DEFAULT_MAX_MEDIA_BYTES, DEFAULT_ALLOWED_CONTENT_TYPES)
            .await;
        assert!(result.is_fail());
    }
}
