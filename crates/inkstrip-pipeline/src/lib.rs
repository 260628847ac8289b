//! inkstrip-pipeline: pure strip segmentation pipeline (sans-IO).
//!
//! Prepares a long vertical strip for per-segment colorization and puts
//! it back together afterwards:
//!
//! assemble -> detect splits -> segment -> (classify, fit canvas) ->
//! *external colorizer* -> restore black -> reassemble -> re-slice.
//!
//! This crate has **no I/O dependencies** and no suspension points. It
//! operates on in-memory rasters; the colorizer call, retries, and file
//! handling live in `inkstrip-run` and `inkstrip-io`.

pub mod assemble;
pub mod canvas;
pub mod classify;
pub mod pixel;
pub mod reslice;
pub mod restore;
pub mod segment;
pub mod split;
pub mod types;

pub use classify::{ContentKind, SkipReason};
pub use restore::{RestorationMask, RestoreScratch, RestoreStats};
pub use types::{
    Canvas, CanvasFit, ClassifierConfig, Dimensions, OPAQUE_BLACK, PipelineError, RestoreConfig,
    RgbaImage, Segment, Slice, Span, SplitCandidate, Strip, StripConfig,
};

/// Everything produced before the colorizer is involved.
#[derive(Debug, Clone)]
pub struct Prepared {
    /// Dimensions of the assembled strip.
    pub dimensions: Dimensions,
    /// Heights of the input slices, in index order.
    pub slice_heights: Vec<u32>,
    /// Safe bands found in the strip.
    pub candidates: Vec<SplitCandidate>,
    /// Segments covering the strip top to bottom.
    pub segments: Vec<Segment>,
}

/// Per-segment decision made before any external call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentPlan {
    /// Nothing to colorize; pass the segment through unchanged.
    Skip(SkipReason),
    /// Send the segment to the colorizer on this canvas.
    Colorize(CanvasFit),
}

/// Assemble slices, detect split points, and cut the strip.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` fails validation,
/// and propagates assembly errors (e.g. [`PipelineError::EmptyInput`]).
pub fn prepare(slices: &[Slice], config: &StripConfig) -> Result<Prepared, PipelineError> {
    config.validate()?;

    let strip = assemble::assemble(slices)?;
    let candidates = split::detect_splits(
        &strip.image,
        config.dark_threshold,
        config.edge_tolerance,
        config.min_gap_height,
    );
    let spans = segment::plan_segments(&candidates, strip.height(), config.min_segment_height);
    let segments = segment::extract_segments(&strip.image, &spans);

    Ok(Prepared {
        dimensions: Dimensions::of(&strip.image),
        slice_heights: strip.slice_heights,
        candidates,
        segments,
    })
}

/// Decide whether a segment is skipped or which canvas it goes to.
///
/// # Errors
///
/// Propagates [`canvas::choose_fit`] errors.
pub fn plan_segment(segment: &Segment, config: &StripConfig) -> Result<SegmentPlan, PipelineError> {
    let kind = classify::classify(&segment.image, config.dark_threshold, &config.classifier);
    if let Some(reason) = kind.skip_reason() {
        return Ok(SegmentPlan::Skip(reason));
    }
    let fit = canvas::choose_fit(
        Dimensions::of(&segment.image),
        &config.canvases,
        config.upscale_penalty,
    )?;
    Ok(SegmentPlan::Colorize(fit))
}

/// Map a colorized canvas back onto its segment and restore black.
///
/// # Errors
///
/// Returns [`PipelineError::DimensionMismatch`] if `fit` does not
/// describe `original`.
pub fn finish_segment(
    original: &RgbaImage,
    colorized_canvas: &RgbaImage,
    fit: &CanvasFit,
    config: &StripConfig,
) -> Result<(RgbaImage, RestoreStats), PipelineError> {
    finish_segment_with(
        &mut RestoreScratch::new(),
        original,
        colorized_canvas,
        fit,
        config,
    )
}

/// [`finish_segment`] reusing `scratch` for the restoration buffers.
///
/// # Errors
///
/// Returns [`PipelineError::DimensionMismatch`] if `fit` does not
/// describe `original`.
pub fn finish_segment_with(
    scratch: &mut RestoreScratch,
    original: &RgbaImage,
    colorized_canvas: &RgbaImage,
    fit: &CanvasFit,
    config: &StripConfig,
) -> Result<(RgbaImage, RestoreStats), PipelineError> {
    let mut colorized = canvas::from_canvas(colorized_canvas, fit);
    let stats = restore::restore_black_with(scratch, original, &mut colorized, &config.restore)?;
    Ok((colorized, stats))
}

/// Reassemble processed segments and cut output slices.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `segments` is empty.
pub fn finish<'a, I>(
    segments: I,
    slice_heights: &[u32],
    config: &StripConfig,
) -> Result<Vec<RgbaImage>, PipelineError>
where
    I: IntoIterator<Item = &'a RgbaImage>,
{
    let strip = reslice::reassemble(segments)?;
    Ok(reslice::reslice(
        &strip,
        slice_heights,
        config.output_width,
        config.output_height,
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use image::Rgba;

    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
    const ART: Rgba<u8> = Rgba([210, 170, 120, 255]);

    /// Slice whose rows in `dark` are black and the rest artwork.
    fn slice(index: u64, height: u32, dark: std::ops::Range<u32>) -> Slice {
        Slice::new(
            index,
            RgbaImage::from_fn(64, height, |_, y| if dark.contains(&y) { BLACK } else { ART }),
        )
    }

    fn scenario_config() -> StripConfig {
        StripConfig {
            dark_threshold: 20,
            min_gap_height: 30,
            min_segment_height: 50,
            ..StripConfig::default()
        }
    }

    #[test]
    fn divider_across_slice_boundary_yields_one_split() {
        // A 40-row divider straddles the boundary between slices 0 and 1.
        let slices = vec![
            slice(0, 120, 100..120),
            slice(1, 120, 0..20),
            slice(2, 120, 0..0),
        ];
        let prepared = prepare(&slices, &scenario_config()).unwrap();

        assert_eq!(prepared.candidates.len(), 1);
        let band = prepared.candidates[0];
        assert_eq!((band.start_row, band.end_row, band.band_height), (100, 139, 40));
        assert_eq!(band.midpoint, 119);

        assert_eq!(prepared.segments.len(), 2);
        assert_eq!(prepared.segments[1].start_row(), 119);
        let total: u32 = prepared.segments.iter().map(Segment::height).sum();
        assert_eq!(total, 360);
        assert_eq!(prepared.slice_heights, vec![120, 120, 120]);
    }

    #[test]
    fn prepare_rejects_invalid_config() {
        let config = StripConfig {
            min_gap_height: 0,
            ..StripConfig::default()
        };
        assert!(matches!(
            prepare(&[slice(0, 10, 0..0)], &config),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn blank_segment_is_skipped() {
        let segment = Segment {
            span: Span {
                start_row: 0,
                height: 40,
            },
            image: RgbaImage::from_pixel(64, 40, BLACK),
        };
        assert_eq!(
            plan_segment(&segment, &StripConfig::default()).unwrap(),
            SegmentPlan::Skip(SkipReason::Blank)
        );
    }

    #[test]
    fn artwork_segment_gets_canvas() {
        let segment = Segment {
            span: Span {
                start_row: 0,
                height: 1200,
            },
            image: RgbaImage::from_pixel(600, 1200, ART),
        };
        let plan = plan_segment(&segment, &StripConfig::default()).unwrap();
        assert!(matches!(plan, SegmentPlan::Colorize(fit) if fit.canvas == Canvas::PORTRAIT));
    }

    #[test]
    fn passthrough_round_trip_conserves_rows() {
        let slices = vec![
            slice(4, 300, 250..300),
            slice(5, 280, 0..40),
            slice(6, 310, 150..190),
        ];
        let config = scenario_config();
        let prepared = prepare(&slices, &config).unwrap();
        let images: Vec<&RgbaImage> = prepared.segments.iter().map(|s| &s.image).collect();
        let output = finish(images, &prepared.slice_heights, &config).unwrap();

        assert_eq!(output.len(), 3);
        let heights: Vec<u32> = output.iter().map(RgbaImage::height).collect();
        assert_eq!(heights, vec![300, 280, 310]);
        assert_eq!(output[1].as_raw(), slices[1].image.as_raw());
    }

    #[test]
    fn finish_segment_restores_divider_through_canvas() {
        let original = RgbaImage::from_fn(200, 400, |_, y| if y < 100 { BLACK } else { ART });
        let fit = canvas::choose_fit(Dimensions::of(&original), &StripConfig::DEFAULT_CANVASES, 1.0)
            .unwrap();
        let mut sent = canvas::to_canvas(&original, &fit).unwrap();
        // The colorizer tints everything.
        for p in sent.pixels_mut() {
            p.0[2] = p.0[2].saturating_add(60);
        }
        let (restored, stats) =
            finish_segment(&original, &sent, &fit, &StripConfig::default()).unwrap();
        assert_eq!(restored.dimensions(), (200, 400));
        assert_eq!(*restored.get_pixel(100, 40), OPAQUE_BLACK);
        assert!(stats.repainted > 0);
        assert_ne!(*restored.get_pixel(100, 300), OPAQUE_BLACK);
    }

    #[test]
    fn shared_scratch_across_segments_matches_per_segment_buffers() {
        let tall = RgbaImage::from_fn(200, 400, |_, y| if y < 100 { BLACK } else { ART });
        let wide = RgbaImage::from_fn(300, 120, |x, _| if x >= 240 { BLACK } else { ART });
        let config = StripConfig::default();
        let mut scratch = RestoreScratch::new();
        for original in [&tall, &wide] {
            let fit = canvas::choose_fit(Dimensions::of(original), &config.canvases, 1.0).unwrap();
            let sent = canvas::to_canvas(original, &fit).unwrap();
            let fresh = finish_segment(original, &sent, &fit, &config).unwrap();
            let shared = finish_segment_with(&mut scratch, original, &sent, &fit, &config).unwrap();
            assert_eq!(shared.1, fresh.1);
            assert_eq!(shared.0.as_raw(), fresh.0.as_raw());
        }
    }
}
