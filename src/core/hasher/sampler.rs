//! Grayscale sampling for the hash algorithms.
//!
//! Decodes an image, stretches it to exactly W x H with fast_image_resize
//! (SIMD bilinear convolution on RGB8, aspect ratio is not preserved) and
//! converts each resampled pixel to luminance `0.299R + 0.587G + 0.114B`.

use super::fast_decode::FastDecoder;
use crate::error::HashError;
use fast_image_resize::{images::Image, FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use image::DynamicImage;

/// Row-major matrix of luminance samples
#[derive(Debug, Clone, PartialEq)]
pub struct GrayMatrix {
    width: usize,
    height: usize,
    values: Vec<f64>,
}

impl GrayMatrix {
    /// Wrap row-major values, checking they fill `width * height`
    pub fn new(width: usize, height: usize, values: Vec<f64>) -> Result<Self, HashError> {
        if values.len() != width * height {
            return Err(HashError::InvalidDimensions {
                width: width as u32,
                height: height as u32,
            });
        }
        Ok(Self {
            width,
            height,
            values,
        })
    }

    /// Build a matrix from a function of `(x, y)`
    pub fn from_fn<F>(width: usize, height: usize, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> f64,
    {
        let mut values = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                values.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            values,
        }
    }

    /// Convert packed RGB8 pixels to luminance
    fn from_rgb(width: usize, height: usize, pixels: &[u8]) -> Self {
        let values = pixels
            .chunks_exact(3)
            .map(|p| luminance(p[0], p[1], p[2]))
            .collect();
        Self {
            width,
            height,
            values,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Sample at column `x`, row `y`
    pub fn get(&self, x: usize, y: usize) -> f64 {
        self.values[y * self.width + x]
    }

    /// One row of samples
    pub fn row(&self, y: usize) -> &[f64] {
        &self.values[y * self.width..(y + 1) * self.width]
    }

    /// All samples in row-major order
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Copy of the region starting at `(x0, y0)`
    pub fn region(&self, x0: usize, y0: usize, width: usize, height: usize) -> GrayMatrix {
        GrayMatrix::from_fn(width, height, |x, y| self.get(x0 + x, y0 + y))
    }
}

/// ITU-R BT.601 luma weights
pub fn luminance(r: u8, g: u8, b: u8) -> f64 {
    0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b)
}

/// Produces fixed-size luminance matrices from images
pub struct PixelSampler {
    resizer: Resizer,
}

impl PixelSampler {
    pub fn new() -> Self {
        Self {
            resizer: Resizer::new(),
        }
    }

    /// Decode raw bytes and sample them at `width` x `height`
    pub fn sample(
        &mut self,
        bytes: &[u8],
        width: u32,
        height: u32,
    ) -> Result<GrayMatrix, HashError> {
        let image = FastDecoder::decode(bytes)?;
        self.sample_image(&image, width, height)
    }

    /// Sample an already-decoded image at `width` x `height`
    pub fn sample_image(
        &mut self,
        image: &DynamicImage,
        width: u32,
        height: u32,
    ) -> Result<GrayMatrix, HashError> {
        if width == 0 || height == 0 {
            return Err(HashError::InvalidDimensions { width, height });
        }

        let rgb = image.to_rgb8();
        let (src_width, src_height) = rgb.dimensions();

        if src_width == 0 || src_height == 0 {
            return Err(HashError::DecodeError {
                reason: "image has no pixels".to_string(),
            });
        }

        let pixels = if (src_width, src_height) == (width, height) {
            rgb.into_raw()
        } else {
            let src_image =
                Image::from_vec_u8(src_width, src_height, rgb.into_raw(), PixelType::U8x3)
                    .map_err(|e| HashError::DecodeError {
                        reason: format!("Failed to create source image: {}", e),
                    })?;

            let mut dst_image = Image::new(width, height, PixelType::U8x3);

            let options =
                ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear));

            self.resizer
                .resize(&src_image, &mut dst_image, &options)
                .map_err(|e| HashError::DecodeError {
                    reason: format!("Resize failed: {}", e),
                })?;

            dst_image.into_vec()
        };

        Ok(GrayMatrix::from_rgb(
            width as usize,
            height as usize,
            &pixels,
        ))
    }
}

impl Default for PixelSampler {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience function for one-off sampling of raw bytes
pub fn sample(bytes: &[u8], width: u32, height: u32) -> Result<GrayMatrix, HashError> {
    PixelSampler::new().sample(bytes, width, height)
}
