//! Response assembly
//!
//! Converts a finished request context into status, headers and body. This
//! is the only place pipeline errors become HTTP status codes. Successful
//! responses carry long-lived cache headers; 404s can serve a configured
//! placeholder image so broken links still render something.

use bytes::Bytes;
use chrono::{Duration, Utc};

use crate::codec::format::OutputFormat;
use crate::config::Config;
use crate::context::RequestContext;
use crate::error::PipelineError;

/// Fixed Last-Modified value: transformed output for a given URL never
/// changes, so revalidation always succeeds.
const LAST_MODIFIED: &str = "Wed, 01 Jan 2014 00:00:00 GMT";

#[derive(Debug)]
pub struct ImageResponse {
    pub status: u16,
    pub content_type: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

fn http_date(from_now_seconds: u64) -> String {
    let expires = Utc::now() + Duration::seconds(from_now_seconds as i64);
    expires.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn cache_headers(expiry_seconds: u64) -> Vec<(String, String)> {
    vec![
        (
            "Cache-Control".to_string(),
            format!("public, max-age={}", expiry_seconds),
        ),
        ("Expires".to_string(), http_date(expiry_seconds)),
        ("Last-Modified".to_string(), LAST_MODIFIED.to_string()),
        ("Vary".to_string(), "Accept-Encoding".to_string()),
    ]
}

/// Build the outbound response for a finished context.
pub async fn build(ctx: &RequestContext, config: &Config) -> ImageResponse {
    if let Some(error) = ctx.error() {
        return error_response(ctx.request_id(), error, config).await;
    }

    if let Some(metadata) = ctx.metadata() {
        let body = match serde_json::to_vec(metadata) {
            Ok(body) => body,
            Err(e) => {
                let error = PipelineError::codec(format!("metadata serialization: {}", e));
                return error_response(ctx.request_id(), &error, config).await;
            }
        };
        return ImageResponse {
            status: 200,
            content_type: "application/json".to_string(),
            headers: cache_headers(config.images.json_expiry_seconds),
            body: Bytes::from(body),
        };
    }

    match ctx.content() {
        Some(content) => {
            let content_type = ctx
                .output_format()
                .unwrap_or(OutputFormat::Jpeg)
                .content_type()
                .to_string();
            ImageResponse {
                status: 200,
                content_type,
                headers: cache_headers(ctx.expiry_seconds()),
                body: content.clone(),
            }
        }
        None => {
            // A context with neither content nor error should not happen;
            // treat it as an internal failure rather than an empty 200.
            let error = PipelineError::codec("empty context");
            error_response(ctx.request_id(), &error, config).await
        }
    }
}

async fn error_response(
    request_id: &str,
    error: &PipelineError,
    config: &Config,
) -> ImageResponse {
    let status = error.status_code();
    tracing::warn!(
        request_id = %request_id,
        status = status,
        kind = error.kind(),
        "request failed: {}",
        error
    );

    if status == 404 {
        if let Some(path) = &config.images.fallback_404 {
            if let Ok(bytes) = tokio::fs::read(path).await {
                if let Some(format) = crate::codec::format::ImageFormat::detect(&bytes) {
                    // Short-lived so a later upload replaces the placeholder
                    return ImageResponse {
                        status: 404,
                        content_type: format.content_type().to_string(),
                        headers: cache_headers(config.images.expiry_seconds_short),
                        body: Bytes::from(bytes),
                    };
                }
            }
            tracing::warn!(path = %path.display(), "fallback 404 image unreadable");
        }
    }

    ImageResponse {
        status,
        content_type: "text/plain".to_string(),
        headers: vec![("Cache-Control".to_string(), "no-cache".to_string())],
        body: Bytes::from(error.to_string()),
    }
}
