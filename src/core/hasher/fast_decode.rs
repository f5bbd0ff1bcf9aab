//! Fast image decoding from raw bytes.
//!
//! Uses zune-jpeg for JPEG data (1.5-2x faster than image crate),
//! falls back to the image crate for everything else.

use crate::error::HashError;
use image::{DynamicImage, ImageBuffer, ImageFormat, Luma, Rgb, Rgba};
use zune_core::colorspace::ColorSpace;
use zune_core::options::DecoderOptions;
use zune_jpeg::JpegDecoder;

/// Fast image decoder that picks a decoder from the content signature
pub struct FastDecoder;

impl FastDecoder {
    /// Decode raw image bytes.
    ///
    /// The format is sniffed from the magic bytes, never from a file name,
    /// so an upload with a misleading extension still decodes correctly.
    pub fn decode(bytes: &[u8]) -> Result<DynamicImage, HashError> {
        match image::guess_format(bytes) {
            Ok(ImageFormat::Jpeg) => {
                Self::decode_jpeg(bytes).or_else(|_| Self::decode_fallback(bytes))
            }
            Ok(_) => Self::decode_fallback(bytes),
            Err(e) => Err(HashError::DecodeError {
                reason: format!("unrecognised raster format: {}", e),
            }),
        }
    }

    /// Fast JPEG decoding using zune-jpeg
    fn decode_jpeg(bytes: &[u8]) -> Result<DynamicImage, HashError> {
        let options = DecoderOptions::new_fast().jpeg_set_out_colorspace(ColorSpace::RGB);
        let mut decoder = JpegDecoder::new_with_options(bytes, options);

        let pixels = decoder.decode().map_err(|e| HashError::DecodeError {
            reason: format!("zune-jpeg decode failed: {:?}", e),
        })?;

        let info = decoder.info().ok_or_else(|| HashError::DecodeError {
            reason: "JPEG header carried no image info".to_string(),
        })?;

        let width = info.width as u32;
        let height = info.height as u32;
        let out_colorspace = decoder.get_output_colorspace().unwrap_or(ColorSpace::RGB);

        let image = match out_colorspace {
            ColorSpace::RGB => {
                let buffer: ImageBuffer<Rgb<u8>, Vec<u8>> =
                    ImageBuffer::from_raw(width, height, pixels).ok_or_else(|| {
                        HashError::DecodeError {
                            reason: "Failed to create RGB buffer".to_string(),
                        }
                    })?;
                DynamicImage::ImageRgb8(buffer)
            }
            ColorSpace::RGBA => {
                let buffer: ImageBuffer<Rgba<u8>, Vec<u8>> =
                    ImageBuffer::from_raw(width, height, pixels).ok_or_else(|| {
                        HashError::DecodeError {
                            reason: "Failed to create RGBA buffer".to_string(),
                        }
                    })?;
                DynamicImage::ImageRgba8(buffer)
            }
            ColorSpace::Luma => {
                let buffer: ImageBuffer<Luma<u8>, Vec<u8>> =
                    ImageBuffer::from_raw(width, height, pixels).ok_or_else(|| {
                        HashError::DecodeError {
                            reason: "Failed to create Luma buffer".to_string(),
                        }
                    })?;
                DynamicImage::ImageLuma8(buffer)
            }
            _ => return Self::decode_fallback(bytes),
        };

        Ok(image)
    }

    fn decode_fallback(bytes: &[u8]) -> Result<DynamicImage, HashError> {
        image::load_from_memory(bytes).map_err(|e| HashError::DecodeError {
            reason: e.to_string(),
        })
    }
}
