//! Reassembly and re-slicing: stitch processed segments back into one
//! strip and cut it to the input's original slice geometry.

use image::imageops;

use crate::assemble::RESIZE_FILTER;
use crate::types::{OPAQUE_BLACK, PipelineError, RgbaImage};

/// Stack segment images vertically, in order.
///
/// Segments narrower or wider than the first are stretched to its width
/// so the result has a uniform width.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `segments` is empty, and
/// [`PipelineError::StripTooTall`] if the total height overflows.
pub fn reassemble<'a, I>(segments: I) -> Result<RgbaImage, PipelineError>
where
    I: IntoIterator<Item = &'a RgbaImage>,
{
    let segments: Vec<&RgbaImage> = segments.into_iter().collect();
    let Some(first) = segments.first() else {
        return Err(PipelineError::EmptyInput);
    };
    let width = first.width();
    let total: u64 = segments.iter().map(|s| u64::from(s.height())).sum();
    let height = u32::try_from(total).map_err(|_| PipelineError::StripTooTall(total))?;

    let mut strip = RgbaImage::from_pixel(width, height, OPAQUE_BLACK);
    let mut offset: i64 = 0;
    for segment in segments {
        if segment.width() == width {
            imageops::replace(&mut strip, segment, 0, offset);
        } else {
            let stretched = imageops::resize(segment, width, segment.height(), RESIZE_FILTER);
            imageops::replace(&mut strip, &stretched, 0, offset);
        }
        offset += i64::from(segment.height());
    }
    Ok(strip)
}

/// Cut `strip` into slices of exactly `heights` rows each.
///
/// Walks a running vertical offset. When fewer rows remain than the next
/// slice needs, the extraction is padded with opaque black at the bottom,
/// so every slice has its recorded height. Each slice is then resized to
/// `output_width` × `output_height` where those are set and differ.
#[must_use = "returns the output slices"]
pub fn reslice(
    strip: &RgbaImage,
    heights: &[u32],
    output_width: Option<u32>,
    output_height: Option<u32>,
) -> Vec<RgbaImage> {
    let width = strip.width();
    let mut offset = 0u32;
    let mut slices = Vec::with_capacity(heights.len());

    for &height in heights {
        let available = strip.height().saturating_sub(offset).min(height);
        let mut slice = if available == height {
            imageops::crop_imm(strip, 0, offset, width, height).to_image()
        } else {
            tracing::debug!(offset, height, available, "padding short output slice");
            let mut padded = RgbaImage::from_pixel(width, height, OPAQUE_BLACK);
            if available > 0 {
                let part = imageops::crop_imm(strip, 0, offset, width, available).to_image();
                imageops::replace(&mut padded, &part, 0, 0);
            }
            padded
        };
        offset = offset.saturating_add(height);

        let target = (
            output_width.unwrap_or(width),
            output_height.unwrap_or(height),
        );
        if slice.dimensions() != target && target.0 > 0 && target.1 > 0 {
            slice = imageops::resize(&slice, target.0, target.1, RESIZE_FILTER);
        }
        slices.push(slice);
    }

    slices
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use image::Rgba;

    fn rows(width: u32, height: u32, base: u8) -> RgbaImage {
        RgbaImage::from_fn(width, height, |_, y| Rgba([base.wrapping_add(y as u8), 0, 0, 255]))
    }

    #[test]
    fn reassemble_stacks_in_order() {
        let a = rows(4, 3, 0);
        let b = rows(4, 2, 100);
        let strip = reassemble([&a, &b]).unwrap();
        assert_eq!(strip.dimensions(), (4, 5));
        assert_eq!(strip.get_pixel(0, 2).0[0], 2);
        assert_eq!(strip.get_pixel(0, 3).0[0], 100);
    }

    #[test]
    fn reassemble_empty_is_error() {
        assert!(matches!(
            reassemble(std::iter::empty::<&RgbaImage>()),
            Err(PipelineError::EmptyInput)
        ));
    }

    #[test]
    fn reslice_follows_recorded_heights() {
        let strip = rows(5, 30, 0);
        let slices = reslice(&strip, &[10, 15, 5], None, None);
        let heights: Vec<u32> = slices.iter().map(RgbaImage::height).collect();
        assert_eq!(heights, vec![10, 15, 5]);
        assert_eq!(slices[1].get_pixel(0, 0).0[0], 10);
        assert_eq!(slices[2].get_pixel(0, 4).0[0], 29);
    }

    #[test]
    fn short_strip_pads_last_slice_with_black() {
        let strip = rows(5, 25, 1);
        let slices = reslice(&strip, &[10, 20], None, None);
        assert_eq!(slices[1].height(), 20);
        assert_eq!(slices[1].get_pixel(0, 0).0[0], 11);
        assert_eq!(*slices[1].get_pixel(0, 19), OPAQUE_BLACK);
    }

    #[test]
    fn fully_missing_slice_is_all_black() {
        let strip = rows(2, 4, 0);
        let slices = reslice(&strip, &[4, 3], None, None);
        assert!(slices[1].pixels().all(|p| *p == OPAQUE_BLACK));
    }

    #[test]
    fn output_size_is_applied() {
        let strip = rows(8, 20, 0);
        let slices = reslice(&strip, &[10, 10], Some(4), None);
        assert!(slices.iter().all(|s| s.dimensions() == (4, 10)));
        let slices = reslice(&strip, &[10, 10], Some(4), Some(6));
        assert!(slices.iter().all(|s| s.dimensions() == (4, 6)));
    }
}
