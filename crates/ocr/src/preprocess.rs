use image::{imageops, DynamicImage, GrayImage, ImageBuffer, Luma};
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;

use crate::config::{ConfigError, PreprocessConfig, ThresholdPolicy};

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Failed to load image: {0}")]
    Load(#[from] image::ImageError),
    #[error("Failed to encode processed image: {0}")]
    Encode(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A binarized, OCR-ready rendition of a source image.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    /// PNG-encoded single-channel image handed to the OCR backend.
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl PreparedImage {
    /// Size of the binarized pixel buffer (one byte per pixel), in KB.
    pub fn buffer_kb(&self) -> f64 {
        f64::from(self.width) * f64::from(self.height) / 1024.0
    }
}

/// Load an image file, binarize it per `config`, and return PNG bytes ready for OCR.
pub fn prepare_for_ocr(
    path: &Path,
    config: &PreprocessConfig,
) -> Result<PreparedImage, PreprocessError> {
    let img = image::open(path)?;
    binarize(img, config)
}

/// Process raw image bytes (JPEG / PNG / WEBP / …) already in memory.
pub fn prepare_for_ocr_from_bytes(
    data: &[u8],
    config: &PreprocessConfig,
) -> Result<PreparedImage, PreprocessError> {
    let img = image::load_from_memory(data)?;
    binarize(img, config)
}

fn binarize(img: DynamicImage, config: &PreprocessConfig) -> Result<PreparedImage, PreprocessError> {
    config.validate()?;

    // Up-scale before thresholding; small ID photos OCR poorly at native size.
    let img = if (config.scale_factor - 1.0).abs() > f32::EPSILON {
        let w = ((img.width() as f32 * config.scale_factor).round().max(1.0)) as u32;
        let h = ((img.height() as f32 * config.scale_factor).round().max(1.0)) as u32;
        img.resize_exact(w, h, imageops::FilterType::CatmullRom)
    } else {
        img
    };

    let gray: GrayImage = img.to_luma8();

    let binary = match config.threshold {
        ThresholdPolicy::Fixed { value } => fixed_threshold(&gray, value),
        ThresholdPolicy::Adaptive { block_size, offset } => {
            adaptive_threshold(&gray, block_size, offset)
        }
    };

    let (width, height) = binary.dimensions();
    let png = encode_as_png(binary)?;
    Ok(PreparedImage { png, width, height })
}

/// Global cutoff: pixels at or above `value` become white, the rest black.
fn fixed_threshold(gray: &GrayImage, value: u8) -> GrayImage {
    ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
        if gray.get_pixel(x, y)[0] >= value {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

/// Per-pixel cutoff: a Gaussian-weighted neighborhood mean minus `offset`.
fn adaptive_threshold(gray: &GrayImage, block_size: u32, offset: i32) -> GrayImage {
    // Sigma chosen so the Gaussian support roughly spans the block window.
    let sigma = 0.3 * ((block_size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let local_mean = imageops::blur(gray, sigma);
    ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
        let px = i32::from(gray.get_pixel(x, y)[0]);
        let cutoff = i32::from(local_mean.get_pixel(x, y)[0]) - offset;
        if px >= cutoff {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

fn encode_as_png(img: GrayImage) -> Result<Vec<u8>, PreprocessError> {
    let mut buf = Vec::new();
    DynamicImage::ImageLuma8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| PreprocessError::Encode(e.to_string()))?;
    Ok(buf)
}
