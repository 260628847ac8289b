//! Per-segment debug dumps.
//!
//! Writes `segment_NNN_original.png`, `segment_NNN_canvas.png` (when a
//! canvas was sent) and `segment_NNN_restored.png` (when the segment was
//! colorized) into a debug directory.

use std::path::{Path, PathBuf};

use inkstrip_pipeline::RgbaImage;
use inkstrip_run::{Disposition, SegmentEvent, SegmentObserver};

use crate::error::IoError;
use crate::slices::save_image;

/// [`SegmentObserver`] that saves intermediate images.
///
/// Write failures are logged and counted; they never abort a run.
#[derive(Debug)]
pub struct DebugDump {
    dir: PathBuf,
    written: Vec<PathBuf>,
    failures: usize,
}

impl DebugDump {
    /// Create `dir` and dump into it.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::Io`] if `dir` cannot be created.
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self, IoError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| IoError::io(&dir, e))?;
        Ok(Self {
            dir,
            written: Vec::new(),
            failures: 0,
        })
    }

    /// Directory being written.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Files written so far.
    #[must_use]
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    /// Files that could not be written.
    #[must_use]
    pub const fn failures(&self) -> usize {
        self.failures
    }

    fn dump(&mut self, index: usize, stage: &str, image: &RgbaImage) {
        let path = self.dir.join(format!("segment_{index:03}_{stage}.png"));
        match save_image(&path, image) {
            Ok(()) => self.written.push(path),
            Err(err) => {
                tracing::warn!(segment = index, stage, error = %err, "debug dump failed");
                self.failures += 1;
            }
        }
    }
}

impl SegmentObserver for DebugDump {
    fn on_segment(&mut self, event: SegmentEvent<'_>) {
        self.dump(event.index, "original", event.original);
        if let Some(canvas) = event.canvas {
            self.dump(event.index, "canvas", canvas);
        }
        if event.disposition == Disposition::Colorized {
            self.dump(event.index, "restored", event.output);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn dumps_stages_per_disposition() {
        let tmp = tempfile::tempdir().unwrap();
        let mut dump = DebugDump::create(tmp.path().join("debug")).unwrap();
        let img = RgbaImage::from_pixel(4, 4, image::Rgba([9, 9, 9, 255]));

        dump.on_segment(SegmentEvent {
            index: 0,
            original: &img,
            canvas: None,
            output: &img,
            disposition: Disposition::SkippedBlank,
        });
        dump.on_segment(SegmentEvent {
            index: 1,
            original: &img,
            canvas: Some(&img),
            output: &img,
            disposition: Disposition::Colorized,
        });

        let names: Vec<String> = dump
            .written()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec![
                "segment_000_original.png",
                "segment_001_original.png",
                "segment_001_canvas.png",
                "segment_001_restored.png",
            ]
        );
        assert!(dump.dir().join("segment_001_canvas.png").is_file());
        assert_eq!(dump.failures(), 0);
    }
}
