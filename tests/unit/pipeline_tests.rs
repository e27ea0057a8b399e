// End-to-end pipeline runs against a filesystem-backed source

use std::sync::Arc;

use suzume::codec::format::ImageFormat;
use suzume::codec::{ImageCodec, RasterCodec};
use suzume::config::Config;
use suzume::context::RequestContext;
use suzume::filters::FilterRegistry;
use suzume::pipeline::Pipeline;
use suzume::sources::SourceRegistry;

struct Harness {
    config: Config,
    pipeline: Pipeline,
    _dir: tempfile::TempDir,
}

fn write_png(dir: &std::path::Path, name: &str, width: u32, height: u32) {
    let img = image::RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([(x * 17 % 256) as u8, (y * 31 % 256) as u8, 128, 255])
    });
    let mut buffer = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut buffer, image::ImageFormat::Png)
        .unwrap();
    std::fs::write(dir.join(name), buffer.into_inner()).unwrap();
}

fn harness(extra_yaml: &str) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    write_png(dir.path(), "photo.png", 80, 40);
    std::fs::write(dir.path().join("notes.txt"), b"not an image").unwrap();

    let yaml = format!(
        "sources:\n  default: local\n  local:\n    root: \"{}\"\n{}",
        dir.path().display(),
        extra_yaml
    );
    let config = Config::from_yaml_with_env(&yaml).unwrap();
    let sources = Arc::new(SourceRegistry::from_config(&config).unwrap());
    let pipeline = Pipeline::new(
        sources,
        Arc::new(FilterRegistry::builtin()),
        Arc::new(RasterCodec),
    );

    Harness {
        config,
        pipeline,
        _dir: dir,
    }
}

async fn run(h: &Harness, path: &str) -> RequestContext {
    let ctx = RequestContext::new(path, &h.config);
    h.pipeline.run(ctx).await
}

fn dims(ctx: &RequestContext) -> (u32, u32) {
    let meta = RasterCodec.identify(ctx.content().unwrap()).unwrap();
    (meta.width, meta.height)
}

#[tokio::test]
async fn resize_produces_requested_height() {
    let h = harness("");
    let ctx = run(&h, "/h20/photo.png").await;
    assert!(!ctx.is_error(), "error: {:?}", ctx.error());
    assert_eq!(dims(&ctx), (40, 20));
}

#[tokio::test]
async fn square_crops_to_exact_size() {
    let h = harness("");
    let ctx = run(&h, "/s30/photo.png").await;
    assert!(!ctx.is_error());
    assert_eq!(dims(&ctx), (30, 30));
}

#[tokio::test]
async fn crop_honors_both_dimensions() {
    let h = harness("");
    let ctx = run(&h, "/h30-w60-gne/photo.png").await;
    assert!(!ctx.is_error());
    assert_eq!(dims(&ctx), (60, 30));
}

#[tokio::test]
async fn pad_fills_to_canvas() {
    let h = harness("");
    let ctx = run(&h, "/h100-w100-cpad-b336699/photo.png").await;
    assert!(!ctx.is_error());
    assert_eq!(dims(&ctx), (100, 100));
}

#[tokio::test]
async fn original_request_keeps_dimensions() {
    let h = harness("");
    let ctx = run(&h, "/photo.png").await;
    assert!(!ctx.is_error());
    assert_eq!(dims(&ctx), (80, 40));
}

#[tokio::test]
async fn max_dimension_bounds_original() {
    let h = harness("images:\n  max_dimension: 32\n");
    let ctx = run(&h, "/photo.png").await;
    assert!(!ctx.is_error());
    assert_eq!(dims(&ctx), (32, 16));
}

#[tokio::test]
async fn webp_override_changes_output_encoding() {
    let h = harness("");
    let ctx = run(&h, "/h20/photo.png.webp").await;
    assert!(!ctx.is_error());
    let out = ctx.content().unwrap();
    assert_eq!(&out[0..4], b"RIFF");
}

#[tokio::test]
async fn json_request_returns_metadata() {
    let h = harness("");
    let ctx = run(&h, "/photo.png.json").await;
    assert!(!ctx.is_error());
    let meta = ctx.metadata().unwrap();
    assert_eq!((meta.width, meta.height), (80, 40));
    assert_eq!(meta.format, ImageFormat::Png);
}

#[tokio::test]
async fn missing_file_maps_to_404() {
    let h = harness("");
    let ctx = run(&h, "/h20/missing.png").await;
    assert_eq!(ctx.error().map(|e| e.status_code()), Some(404));
}

#[tokio::test]
async fn non_image_content_maps_to_415() {
    let h = harness("");
    let ctx = run(&h, "/h20/notes.txt").await;
    assert_eq!(ctx.error().map(|e| e.status_code()), Some(415));
}

#[tokio::test]
async fn excluded_source_maps_to_403() {
    let h = harness("  excluded:\n    - youtube\n");
    let ctx = run(&h, "/h20-eyoutube/abc123.jpg").await;
    assert_eq!(ctx.error().map(|e| e.status_code()), Some(403));
}

#[tokio::test]
async fn unknown_source_maps_to_400() {
    let h = harness("");
    let ctx = run(&h, "/h20-edropbox/photo.png").await;
    assert_eq!(ctx.error().map(|e| e.status_code()), Some(400));
}

#[tokio::test]
async fn traversal_attempt_maps_to_404() {
    let h = harness("");
    let ctx = run(&h, "/h20/%2e%2e/photo.png").await;
    assert_eq!(ctx.error().map(|e| e.status_code()), Some(404));
}

#[tokio::test]
async fn filter_applies_after_resize() {
    let h = harness("");
    let ctx = run(&h, "/h20-fgreyscale/photo.png").await;
    assert!(!ctx.is_error());
    assert_eq!(dims(&ctx), (40, 20));
    let img = image::load_from_memory(ctx.content().unwrap())
        .unwrap()
        .to_rgba8();
    let px = img.get_pixel(5, 5);
    assert_eq!(px[0], px[1]);
    assert_eq!(px[1], px[2]);
}
