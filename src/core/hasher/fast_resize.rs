//! Downsampling to the fingerprint grid.
//!
//! fast_image_resize picks AVX2/NEON kernels when available. Bilinear
//! convolution is deterministic, so a photo always lands on the same grid.

use crate::error::DecodeError;
use fast_image_resize::{images::Image, FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use image::{DynamicImage, GrayImage};

fn resample_error(e: impl std::fmt::Display) -> DecodeError {
    DecodeError::Resample {
        reason: e.to_string(),
    }
}

/// Luminance of `image` sampled onto a `side` × `side` grid
pub fn grayscale_grid(image: &DynamicImage, side: u32) -> Result<GrayImage, DecodeError> {
    let gray = image.to_luma8();
    if gray.width() == 0 || gray.height() == 0 {
        return Err(DecodeError::EmptyImage);
    }

    let src = Image::from_vec_u8(gray.width(), gray.height(), gray.into_raw(), PixelType::U8)
        .map_err(resample_error)?;
    let mut dst = Image::new(side, side, PixelType::U8);
    let options =
        ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear));

    Resizer::new()
        .resize(&src, &mut dst, &options)
        .map_err(resample_error)?;

    GrayImage::from_raw(side, side, dst.into_vec())
        .ok_or_else(|| resample_error("grid buffer has the wrong length"))
}
