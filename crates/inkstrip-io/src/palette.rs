//! Persisting the learned-color accumulator between runs.

use std::path::Path;

use inkstrip_run::ColorMemory;

use crate::error::IoError;

/// Load learned colors from `path`, or start empty if it does not exist.
///
/// # Errors
///
/// Returns [`IoError::Io`] if the file exists but cannot be read and
/// [`IoError::Palette`] if it is not valid JSON.
pub fn load_memory(path: &Path) -> Result<ColorMemory, IoError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no learned colors yet");
            return Ok(ColorMemory::default());
        }
        Err(e) => return Err(IoError::io(path, e)),
    };
    let memory: ColorMemory = serde_json::from_str(&text).map_err(|source| IoError::Palette {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %path.display(), colors = memory.colors().len(), "learned colors loaded");
    Ok(memory)
}

/// Write learned colors to `path` as pretty JSON.
///
/// # Errors
///
/// Returns [`IoError::Palette`] on serialization failure and
/// [`IoError::Io`] on write failure.
pub fn save_memory(path: &Path, memory: &ColorMemory) -> Result<(), IoError> {
    let json = serde_json::to_string_pretty(memory).map_err(|source| IoError::Palette {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, json).map_err(|e| IoError::io(path, e))
}
