//! Image codec capability
//!
//! The pipeline never touches pixels directly; it talks to an [`ImageCodec`]
//! that can identify metadata, apply a geometry plan, run a filter, and
//! re-encode at a quality setting. The production implementation decodes
//! with the `image` crate and resizes with `fast_image_resize` (Lanczos3).
//!
//! Stage-to-stage intermediates are lossless PNG so quality is only applied
//! once, by the optimize stage.

pub mod encoder;
pub mod format;

use std::io::Cursor;
use std::num::NonZeroU32;

use fast_image_resize::{FilterType, Image as FirImage, PixelType, ResizeAlg, Resizer};
use image::io::Reader as ImageReader;
use image::{imageops, DynamicImage, RgbaImage};
use serde::Serialize;

use encoder::FormatEncoder;

use crate::error::PipelineError;
use crate::filters::ImageFilter;
use crate::geometry::GeometryPlan;
use format::{ImageFormat, OutputFormat};

/// Metadata extracted from image bytes without transforming them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
}

/// Pixel-level operations the pipeline delegates to.
pub trait ImageCodec: Send + Sync {
    /// Extract dimensions and detected format.
    fn identify(&self, data: &[u8]) -> Result<ImageMetadata, PipelineError>;

    /// Apply resize/crop/pad geometry, returning a lossless intermediate.
    fn transform(&self, data: &[u8], plan: &GeometryPlan) -> Result<Vec<u8>, PipelineError>;

    /// Run a post-process filter, returning a lossless intermediate.
    fn apply_filter(
        &self,
        data: &[u8],
        filter: &dyn ImageFilter,
    ) -> Result<Vec<u8>, PipelineError>;

    /// Re-encode to the output format at the given quality.
    fn encode(
        &self,
        data: &[u8],
        format: OutputFormat,
        quality: u8,
    ) -> Result<Vec<u8>, PipelineError>;
}

/// Production codec on `image` + `fast_image_resize`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RasterCodec;

impl RasterCodec {
    fn decode(&self, data: &[u8]) -> Result<DynamicImage, PipelineError> {
        // Reject formats outside the recognized input set before decoding
        if ImageFormat::detect(data).is_none() {
            let format = image::guess_format(data)
                .map(|f| format!("{:?}", f).to_lowercase())
                .unwrap_or_else(|_| "unknown".to_string());
            return Err(PipelineError::UnsupportedFormat { format });
        }

        ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|e| PipelineError::codec(format!("format detection: {}", e)))?
            .decode()
            .map_err(|e| PipelineError::codec(format!("decode: {}", e)))
    }

    fn encode_intermediate(&self, image: &DynamicImage) -> Result<Vec<u8>, PipelineError> {
        let rgba = image.to_rgba8();
        let encoded = encoder::PngFormatEncoder.encode(
            rgba.as_raw(),
            image.width(),
            image.height(),
            100,
        )?;
        Ok(encoded.data)
    }

    fn resize(
        &self,
        image: &DynamicImage,
        width: u32,
        height: u32,
    ) -> Result<DynamicImage, PipelineError> {
        let src_w = NonZeroU32::new(image.width())
            .ok_or_else(|| PipelineError::codec("source width is 0"))?;
        let src_h = NonZeroU32::new(image.height())
            .ok_or_else(|| PipelineError::codec("source height is 0"))?;
        let dst_w =
            NonZeroU32::new(width).ok_or_else(|| PipelineError::codec("target width is 0"))?;
        let dst_h =
            NonZeroU32::new(height).ok_or_else(|| PipelineError::codec("target height is 0"))?;

        let src = FirImage::from_vec_u8(
            src_w,
            src_h,
            image.to_rgba8().into_raw(),
            PixelType::U8x4,
        )
        .map_err(|e| PipelineError::codec(format!("resize source buffer: {:?}", e)))?;

        let mut dst = FirImage::new(dst_w, dst_h, PixelType::U8x4);
        let mut resizer = Resizer::new(ResizeAlg::Convolution(FilterType::Lanczos3));
        resizer
            .resize(&src.view(), &mut dst.view_mut())
            .map_err(|e| PipelineError::codec(format!("resize: {:?}", e)))?;

        let resized = RgbaImage::from_raw(width, height, dst.into_vec())
            .ok_or_else(|| PipelineError::codec("resize output buffer"))?;
        Ok(DynamicImage::ImageRgba8(resized))
    }
}

impl ImageCodec for RasterCodec {
    fn identify(&self, data: &[u8]) -> Result<ImageMetadata, PipelineError> {
        let format = ImageFormat::detect(data).ok_or_else(|| {
            let format = image::guess_format(data)
                .map(|f| format!("{:?}", f).to_lowercase())
                .unwrap_or_else(|_| "unknown".to_string());
            PipelineError::UnsupportedFormat { format }
        })?;

        let (width, height) = ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|e| PipelineError::codec(format!("format detection: {}", e)))?
            .into_dimensions()
            .map_err(|e| PipelineError::codec(format!("identify: {}", e)))?;

        Ok(ImageMetadata {
            width,
            height,
            format,
        })
    }

    fn transform(&self, data: &[u8], plan: &GeometryPlan) -> Result<Vec<u8>, PipelineError> {
        let decoded = self.decode(data)?;

        let mut working = if plan.resize.width != decoded.width()
            || plan.resize.height != decoded.height()
        {
            self.resize(&decoded, plan.resize.width, plan.resize.height)?
        } else {
            decoded
        };

        if let Some(crop) = plan.crop {
            working = working.crop_imm(crop.x, crop.y, crop.width, crop.height);
        }

        if let Some(pad) = plan.pad {
            // Unspecified color renders transparent; JPEG output flattens it
            // to black when the alpha channel is dropped.
            let fill = match pad.color {
                Some([r, g, b]) => image::Rgba([r, g, b, 255]),
                None => image::Rgba([0, 0, 0, 0]),
            };
            let mut canvas =
                RgbaImage::from_pixel(pad.size.width, pad.size.height, fill);
            imageops::overlay(
                &mut canvas,
                &working.to_rgba8(),
                pad.origin.x as i64,
                pad.origin.y as i64,
            );
            working = DynamicImage::ImageRgba8(canvas);
        }

        self.encode_intermediate(&working)
    }

    fn apply_filter(
        &self,
        data: &[u8],
        filter: &dyn ImageFilter,
    ) -> Result<Vec<u8>, PipelineError> {
        let decoded = self.decode(data)?;
        let filtered = filter.apply(decoded);
        self.encode_intermediate(&filtered)
    }

    fn encode(
        &self,
        data: &[u8],
        format: OutputFormat,
        quality: u8,
    ) -> Result<Vec<u8>, PipelineError> {
        let decoded = self.decode(data)?;
        let mut rgba = decoded.to_rgba8();
        let format_encoder = encoder::encoder_for(format);
        if !format_encoder.supports_transparency() {
            encoder::flatten_alpha(&mut rgba);
        }
        let encoded = format_encoder.encode(
            rgba.as_raw(),
            decoded.width(),
            decoded.height(),
            quality,
        )?;
        Ok(encoded.data)
    }
}
