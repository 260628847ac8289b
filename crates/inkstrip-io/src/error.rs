use std::path::PathBuf;

/// Errors raised at the filesystem and network boundary.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// The input directory holds no indexed slice images.
    #[error("no slice images found in {}", dir.display())]
    NoSlices {
        /// Directory that was scanned.
        dir: PathBuf,
    },

    /// A required credential was not supplied.
    #[error("missing credential: {0}")]
    MissingCredential(&'static str),

    /// An input image could not be decoded.
    #[error("failed to decode {}: {source}", path.display())]
    ImageDecode {
        /// File being read.
        path: PathBuf,
        /// Decoder error.
        #[source]
        source: image::ImageError,
    },

    /// An output image could not be encoded.
    #[error("failed to encode {}: {source}", path.display())]
    ImageEncode {
        /// File being written.
        path: PathBuf,
        /// Encoder error.
        #[source]
        source: image::ImageError,
    },

    /// A filesystem operation failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// Path involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Slice file names are unusable (duplicate index, non-UTF-8, ...).
    #[error("bad slice file name: {0}")]
    FileName(String),

    /// The learned-color file is not valid JSON.
    #[error("invalid learned-color file {}: {source}", path.display())]
    Palette {
        /// File being read or written.
        path: PathBuf,
        /// Parse or serialization error.
        #[source]
        source: serde_json::Error,
    },

    /// The HTTP client could not be built.
    #[error("HTTP client setup failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl IoError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
