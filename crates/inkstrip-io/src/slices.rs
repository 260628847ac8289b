//! Reading input slices from a directory and writing output slices.

use std::path::{Path, PathBuf};

use image::DynamicImage;
use inkstrip_pipeline::{RgbaImage, Slice};

use crate::error::IoError;
use crate::naming::{OutputNaming, SliceName};

/// Input slices plus the naming their outputs will use.
#[derive(Debug)]
pub struct SliceSet {
    /// Decoded slices, sorted by index.
    pub slices: Vec<Slice>,
    /// Parsed names, in the same order.
    pub names: Vec<SliceName>,
    /// Source paths, in the same order.
    pub paths: Vec<PathBuf>,
}

impl SliceSet {
    /// Output naming for `count` slices.
    #[must_use]
    pub fn output_naming(&self, count: usize) -> Option<OutputNaming> {
        OutputNaming::for_inputs(&self.names, count)
    }
}

/// List indexed slice files in `dir`, sorted by index.
///
/// Files that are not images, or whose names carry no index, are
/// skipped.
///
/// # Errors
///
/// Returns [`IoError::Io`] if the directory cannot be read,
/// [`IoError::FileName`] if two files share an index, and
/// [`IoError::NoSlices`] if nothing qualifies.
pub fn scan_slices(dir: &Path) -> Result<Vec<(SliceName, PathBuf)>, IoError> {
    let entries = std::fs::read_dir(dir).map_err(|e| IoError::io(dir, e))?;
    let mut found = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| IoError::io(dir, e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            tracing::warn!(path = %path.display(), "skipping non-UTF-8 file name");
            continue;
        };
        match SliceName::parse(file_name) {
            Some(name) => found.push((name, path)),
            None => tracing::debug!(file = file_name, "not an indexed slice, skipping"),
        }
    }

    found.sort_by_key(|(name, _)| name.index);
    if let Some(pair) = found.windows(2).find(|w| w[0].0.index == w[1].0.index) {
        return Err(IoError::FileName(format!(
            "{} and {} share index {}",
            pair[0].1.display(),
            pair[1].1.display(),
            pair[0].0.index
        )));
    }
    if found.is_empty() {
        return Err(IoError::NoSlices {
            dir: dir.to_path_buf(),
        });
    }
    Ok(found)
}

/// Load and decode every indexed slice in `dir`.
///
/// # Errors
///
/// Propagates [`scan_slices`] errors and returns
/// [`IoError::ImageDecode`] for unreadable images.
pub fn load_slices(dir: &Path) -> Result<SliceSet, IoError> {
    let found = scan_slices(dir)?;
    let mut set = SliceSet {
        slices: Vec::with_capacity(found.len()),
        names: Vec::with_capacity(found.len()),
        paths: Vec::with_capacity(found.len()),
    };
    for (name, path) in found {
        let image = image::open(&path)
            .map_err(|source| IoError::ImageDecode {
                path: path.clone(),
                source,
            })?
            .into_rgba8();
        tracing::debug!(
            file = %path.display(),
            index = name.index,
            width = image.width(),
            height = image.height(),
            "slice loaded"
        );
        set.slices.push(Slice::new(name.index, image));
        set.names.push(name);
        set.paths.push(path);
    }
    tracing::info!(dir = %dir.display(), slices = set.slices.len(), "input slices loaded");
    Ok(set)
}

/// Encode `image` to `path`, picking the format from the extension.
///
/// JPEG has no alpha channel, so JPEG targets are written as RGB.
///
/// # Errors
///
/// Returns [`IoError::ImageEncode`] on encoder or write failure.
pub fn save_image(path: &Path, image: &RgbaImage) -> Result<(), IoError> {
    let is_jpeg = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"));
    let result = if is_jpeg {
        DynamicImage::ImageRgba8(image.clone()).into_rgb8().save(path)
    } else {
        image.save(path)
    };
    result.map_err(|source| IoError::ImageEncode {
        path: path.to_path_buf(),
        source,
    })
}

/// Write `images` into `dir` using `naming`, creating `dir` if needed.
///
/// # Errors
///
/// Returns [`IoError::Io`] if `dir` cannot be created and
/// [`IoError::ImageEncode`] if a slice cannot be written.
pub fn write_slices<'a, I>(dir: &Path, naming: &OutputNaming, images: I) -> Result<Vec<PathBuf>, IoError>
where
    I: IntoIterator<Item = &'a RgbaImage>,
{
    std::fs::create_dir_all(dir).map_err(|e| IoError::io(dir, e))?;
    let mut written = Vec::new();
    for (position, image) in images.into_iter().enumerate() {
        let path = dir.join(naming.file_name(position));
        save_image(&path, image)?;
        written.push(path);
    }
    tracing::info!(dir = %dir.display(), slices = written.len(), "output slices written");
    Ok(written)
}
