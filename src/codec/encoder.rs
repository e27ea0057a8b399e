//! Per-format encoders
//!
//! Trait-based encoder system so the optimize stage can re-encode to any
//! recognized output format at a requested quality. JPEG and PNG go through
//! the `image` crate; WebP uses the `webp` crate for lossy, quality-aware
//! output (the `image` crate only writes lossless WebP).

use super::format::OutputFormat;
use crate::error::PipelineError;

/// Encoded output plus its format metadata.
#[derive(Debug)]
pub struct EncodedImage {
    pub data: Vec<u8>,
    pub format: OutputFormat,
    pub content_type: &'static str,
}

impl EncodedImage {
    pub fn new(data: Vec<u8>, format: OutputFormat) -> Self {
        Self {
            data,
            content_type: format.content_type(),
            format,
        }
    }
}

/// Encodes raw RGBA pixel data to one output format.
pub trait FormatEncoder: Send + Sync {
    /// Encode RGBA pixels (4 bytes per pixel, row-major).
    fn encode(
        &self,
        data: &[u8],
        width: u32,
        height: u32,
        quality: u8,
    ) -> Result<EncodedImage, PipelineError>;

    /// False when the format drops the alpha channel on encode; the caller
    /// flattens translucent pixels first.
    fn supports_transparency(&self) -> bool;
}

pub struct JpegFormatEncoder;

impl FormatEncoder for JpegFormatEncoder {
    fn encode(
        &self,
        data: &[u8],
        width: u32,
        height: u32,
        quality: u8,
    ) -> Result<EncodedImage, PipelineError> {
        use image::codecs::jpeg::JpegEncoder;
        use image::ImageEncoder as _;
        use std::io::Cursor;

        // JPEG has no alpha channel
        let rgb = rgba_to_rgb(data);

        let mut output = Cursor::new(Vec::new());
        let encoder = JpegEncoder::new_with_quality(&mut output, quality.clamp(1, 100));
        encoder
            .write_image(&rgb, width, height, image::ColorType::Rgb8)
            .map_err(|e| PipelineError::codec(format!("jpeg encode: {}", e)))?;

        Ok(EncodedImage::new(output.into_inner(), OutputFormat::Jpeg))
    }

    fn supports_transparency(&self) -> bool {
        false
    }
}

pub struct PngFormatEncoder;

impl FormatEncoder for PngFormatEncoder {
    fn encode(
        &self,
        data: &[u8],
        width: u32,
        height: u32,
        _quality: u8,
    ) -> Result<EncodedImage, PipelineError> {
        use image::codecs::png::PngEncoder;
        use image::ImageEncoder as _;
        use std::io::Cursor;

        let mut output = Cursor::new(Vec::new());
        let encoder = PngEncoder::new(&mut output);
        encoder
            .write_image(data, width, height, image::ColorType::Rgba8)
            .map_err(|e| PipelineError::codec(format!("png encode: {}", e)))?;

        Ok(EncodedImage::new(output.into_inner(), OutputFormat::Png))
    }

    fn supports_transparency(&self) -> bool {
        true
    }
}

pub struct WebPFormatEncoder;

impl FormatEncoder for WebPFormatEncoder {
    fn encode(
        &self,
        data: &[u8],
        width: u32,
        height: u32,
        quality: u8,
    ) -> Result<EncodedImage, PipelineError> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(PipelineError::codec(format!(
                "webp encode: pixel buffer is {} bytes, expected {}",
                data.len(),
                expected
            )));
        }

        let encoder = webp::Encoder::from_rgba(data, width, height);
        let encoded = encoder.encode(quality.clamp(1, 100) as f32);

        Ok(EncodedImage::new(encoded.to_vec(), OutputFormat::WebP))
    }

    fn supports_transparency(&self) -> bool {
        true
    }
}

/// Pick the encoder for an output format.
pub fn encoder_for(format: OutputFormat) -> Box<dyn FormatEncoder> {
    match format {
        OutputFormat::Jpeg => Box::new(JpegFormatEncoder),
        OutputFormat::Png => Box::new(PngFormatEncoder),
        OutputFormat::WebP => Box::new(WebPFormatEncoder),
    }
}

/// Composite RGBA pixels onto black so translucency survives encoders that
/// drop the alpha channel.
pub(crate) fn flatten_alpha(rgba: &mut [u8]) {
    for chunk in rgba.chunks_exact_mut(4) {
        let alpha = chunk[3] as u16;
        if alpha == 255 {
            continue;
        }
        for channel in &mut chunk[..3] {
            *channel = ((*channel as u16 * alpha) / 255) as u8;
        }
    }
}

/// Drop the alpha channel from RGBA pixel data.
fn rgba_to_rgb(rgba: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(rgba.len() / 4 * 3);
    for chunk in rgba.chunks_exact(4) {
        rgb.extend_from_slice(&chunk[..3]);
    }
    rgb
}
