//! Strip assembly: join ordered input slices into one continuous bitmap.
//!
//! This is the first step in the pipeline: slices in, [`Strip`] out.
//! Slices whose width differs from the first slice are stretched
//! horizontally (never cropped) so every row of the strip has the same
//! width, and each slice keeps its original height.

use image::imageops::{self, FilterType};

use crate::types::{OPAQUE_BLACK, PipelineError, RgbaImage, Slice, Strip};

/// Resampling filter used whenever the pipeline resizes pixels.
pub const RESIZE_FILTER: FilterType = FilterType::CatmullRom;

/// Join slices vertically in index order.
///
/// The strip is pre-filled with opaque black so that any rows not
/// covered by a slice (composite rounding at the edges) stay black.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `slices` is empty or the
/// first slice has zero width. Returns [`PipelineError::StripTooTall`]
/// if the summed height does not fit in a raster.
pub fn assemble(slices: &[Slice]) -> Result<Strip, PipelineError> {
    let mut ordered: Vec<&Slice> = slices.iter().collect();
    ordered.sort_by_key(|s| s.index);

    let Some(first) = ordered.first() else {
        return Err(PipelineError::EmptyInput);
    };
    let width = first.image.width();
    if width == 0 {
        return Err(PipelineError::EmptyInput);
    }

    let total: u64 = ordered.iter().map(|s| u64::from(s.height())).sum();
    let height = u32::try_from(total).map_err(|_| PipelineError::StripTooTall(total))?;

    let mut image = RgbaImage::from_pixel(width, height, OPAQUE_BLACK);
    let mut slice_heights = Vec::with_capacity(ordered.len());
    let mut offset: i64 = 0;

    for slice in ordered {
        let slice_height = slice.height();
        slice_heights.push(slice_height);
        if slice_height == 0 {
            continue;
        }

        if slice.image.width() == width {
            imageops::replace(&mut image, &slice.image, 0, offset);
        } else {
            tracing::debug!(
                index = slice.index,
                from = slice.image.width(),
                to = width,
                "stretching slice to strip width"
            );
            let stretched = imageops::resize(&slice.image, width, slice_height, RESIZE_FILTER);
            imageops::replace(&mut image, &stretched, 0, offset);
        }
        offset += i64::from(slice_height);
    }

    Ok(Strip {
        image,
        slice_heights,
    })
}
