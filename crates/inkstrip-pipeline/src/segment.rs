//! Segmentation: cut the strip at chosen rows and merge undersized
//! pieces into their neighbors.
//!
//! Every strip row belongs to exactly one span before and after
//! merging, so `sum(span.height) == strip height` always holds.

use image::imageops;

use crate::types::{RgbaImage, Segment, Span, SplitCandidate};

/// Turn cut rows into contiguous spans covering `0..total_height`.
///
/// Cuts are sorted and deduplicated; cuts at row `0` or at/after
/// `total_height` are ignored since they would produce empty spans.
#[must_use = "returns the spans between cut rows"]
pub fn spans_from_cuts(cuts: &[u32], total_height: u32) -> Vec<Span> {
    let mut boundaries: Vec<u32> = cuts
        .iter()
        .copied()
        .filter(|&c| c > 0 && c < total_height)
        .collect();
    boundaries.sort_unstable();
    boundaries.dedup();
    boundaries.insert(0, 0);
    boundaries.push(total_height);

    boundaries
        .windows(2)
        .filter(|w| w[1] > w[0])
        .map(|w| Span {
            start_row: w[0],
            height: w[1] - w[0],
        })
        .collect()
}

/// Merge spans shorter than `min_height`.
///
/// An undersized span is folded into its follower (the follower's start
/// moves up). A trailing undersized span has no follower, so it extends
/// its predecessor downward instead. A lone span is kept whatever its
/// height.
#[must_use = "returns the merged spans"]
pub fn merge_small(spans: &[Span], min_height: u32) -> Vec<Span> {
    let mut merged: Vec<Span> = Vec::with_capacity(spans.len());
    // Start row carried forward from undersized spans awaiting a follower.
    let mut carry: Option<u32> = None;

    for span in spans {
        let start_row = carry.take().unwrap_or(span.start_row);
        let current = Span {
            start_row,
            height: span.end_row() - start_row,
        };
        if current.height < min_height {
            carry = Some(current.start_row);
        } else {
            merged.push(current);
        }
    }

    if let Some(start_row) = carry {
        let end_row = spans.last().map_or(start_row, |s| s.end_row());
        match merged.last_mut() {
            Some(previous) => previous.height = end_row - previous.start_row,
            None => merged.push(Span {
                start_row,
                height: end_row - start_row,
            }),
        }
    }

    merged
}

/// Compute the final segment spans for a strip of `total_height` rows.
#[must_use = "returns the segment spans"]
pub fn plan_segments(
    candidates: &[SplitCandidate],
    total_height: u32,
    min_segment_height: u32,
) -> Vec<Span> {
    let cuts: Vec<u32> = candidates.iter().map(|c| c.midpoint).collect();
    let spans = spans_from_cuts(&cuts, total_height);
    let merged = merge_small(&spans, min_segment_height);
    tracing::debug!(
        cuts = cuts.len(),
        before_merge = spans.len(),
        after_merge = merged.len(),
        "segment plan built"
    );
    merged
}

/// Copy each span's rows out of the strip into an owned segment.
#[must_use = "returns the extracted segments"]
pub fn extract_segments(strip: &RgbaImage, spans: &[Span]) -> Vec<Segment> {
    spans
        .iter()
        .map(|&span| Segment {
            span,
            image: imageops::crop_imm(strip, 0, span.start_row, strip.width(), span.height)
                .to_image(),
        })
        .collect()
}
