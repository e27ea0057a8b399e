// Response assembly: status mapping, cache headers, fallback bodies

use bytes::Bytes;
use rstest::rstest;
use suzume::config::Config;
use suzume::context::RequestContext;
use suzume::error::PipelineError;
use suzume::response::{build, ImageResponse};

fn config() -> Config {
    Config::from_yaml_with_env("sources:\n  default: local\n").unwrap()
}

fn png_bytes() -> Bytes {
    let img = image::RgbaImage::new(3, 3);
    let mut buffer = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut buffer, image::ImageFormat::Png)
        .unwrap();
    Bytes::from(buffer.into_inner())
}

fn header<'a>(response: &'a ImageResponse, name: &str) -> Option<&'a str> {
    response
        .headers
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

#[rstest]
#[case(PipelineError::InvalidSource { source: "ftp".into() }, 400)]
#[case(PipelineError::Forbidden { source: "s3".into() }, 403)]
#[case(PipelineError::NotFound, 404)]
#[case(PipelineError::upstream("timeout"), 502)]
#[case(PipelineError::UnsupportedFormat { format: "tiff".into() }, 415)]
#[case(PipelineError::codec("boom"), 500)]
#[case(PipelineError::InvalidContentType { content_type: "text/html".into() }, 502)]
#[tokio::test]
async fn error_kinds_map_to_status(#[case] error: PipelineError, #[case] status: u16) {
    let config = config();
    let mut ctx = RequestContext::new("/a.png", &config);
    ctx.fail(error);

    let response = build(&ctx, &config).await;
    assert_eq!(response.status, status);
    assert_eq!(header(&response, "Cache-Control"), Some("no-cache"));
}

#[tokio::test]
async fn success_response_shape() {
    let config = config();
    let mut ctx = RequestContext::new("/a.png", &config);
    ctx.set_content(png_bytes());

    let response = build(&ctx, &config).await;
    assert_eq!(response.status, 200);
    assert_eq!(response.content_type, "image/png");
    assert!(!response.body.is_empty());
    assert_eq!(
        header(&response, "Cache-Control"),
        Some("public, max-age=2592000")
    );
    assert!(header(&response, "Expires").is_some());
    assert!(header(&response, "Last-Modified").is_some());
    assert_eq!(header(&response, "Vary"), Some("Accept-Encoding"));
}

#[tokio::test]
async fn format_override_sets_content_type() {
    let config = config();
    let mut ctx = RequestContext::new("/h10/a.png.webp", &config);
    ctx.set_content(png_bytes());

    let response = build(&ctx, &config).await;
    assert_eq!(response.content_type, "image/webp");
}

#[tokio::test]
async fn json_metadata_uses_json_expiry() {
    let config = config();
    let mut ctx = RequestContext::new("/a.png.json", &config);
    ctx.set_content(png_bytes());
    ctx.set_metadata(suzume::codec::ImageMetadata {
        width: 3,
        height: 3,
        format: suzume::codec::format::ImageFormat::Png,
    });

    let response = build(&ctx, &config).await;
    assert_eq!(response.content_type, "application/json");
    assert_eq!(
        header(&response, "Cache-Control"),
        Some("public, max-age=86400")
    );

    let parsed: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(parsed["width"], 3);
    assert_eq!(parsed["height"], 3);
    assert_eq!(parsed["format"], "png");
}

#[tokio::test]
async fn fallback_image_serves_on_404_with_short_expiry() {
    let dir = tempfile::tempdir().unwrap();
    let fallback = dir.path().join("missing.png");
    std::fs::write(&fallback, png_bytes()).unwrap();

    let yaml = format!(
        "images:\n  fallback_404: \"{}\"\nsources:\n  default: local\n",
        fallback.display()
    );
    let config = Config::from_yaml_with_env(&yaml).unwrap();

    let mut ctx = RequestContext::new("/a.png", &config);
    ctx.fail(PipelineError::NotFound);

    let response = build(&ctx, &config).await;
    assert_eq!(response.status, 404);
    assert_eq!(response.content_type, "image/png");
    assert_eq!(
        header(&response, "Cache-Control"),
        Some("public, max-age=600")
    );
}

#[tokio::test]
async fn unreadable_fallback_degrades_to_plain_404() {
    let yaml = "images:\n  fallback_404: \"/nonexistent/missing.png\"\nsources:\n  default: local\n";
    let config = Config::from_yaml_with_env(yaml).unwrap();

    let mut ctx = RequestContext::new("/a.png", &config);
    ctx.fail(PipelineError::NotFound);

    let response = build(&ctx, &config).await;
    assert_eq!(response.status, 404);
    assert_eq!(response.content_type, "text/plain");
}

#[tokio::test]
async fn non_404_errors_never_use_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let fallback = dir.path().join("missing.png");
    std::fs::write(&fallback, png_bytes()).unwrap();

    let yaml = format!(
        "images:\n  fallback_404: \"{}\"\nsources:\n  default: local\n",
        fallback.display()
    );
    let config = Config::from_yaml_with_env(&yaml).unwrap();

    let mut ctx = RequestContext::new("/a.png", &config);
    ctx.fail(PipelineError::upstream("down"));

    let response = build(&ctx, &config).await;
    assert_eq!(response.status, 502);
    assert_eq!(response.content_type, "text/plain");
}
