//! Error types for the three.js exporter.

use thiserror::Error;

/// Result type alias using ExportError.
pub type Result<T> = std::result::Result<T, ExportError>;

/// Main error type for scene export operations.
#[derive(Error, Debug)]
pub enum ExportError {
    /// Failed to parse a scene description.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failed to read or re-encode an image.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error while reading input or writing output.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A container was reached again while it was still being encoded.
    #[error("Circular reference detected")]
    CyclicReference,

    /// An opaque value reached the encoder and could not be reduced.
    #[error("Value of type `{0}` is not encodable")]
    Unencodable(String),

    /// A face whose vertex count is not a non-zero multiple of three.
    #[error("Unsupported polygon with {0} vertices (faces must be triangulated)")]
    UnsupportedPolygon(usize),

    /// Vertices of one geometry disagree on which attributes they carry.
    #[error("Inconsistent vertex attributes: {0}")]
    InconsistentAttributes(String),

    /// The scene description refers to an entity it does not define.
    #[error("Unknown {kind} `{name}`")]
    MissingReference { kind: &'static str, name: String },

    /// The entity cannot be expressed in the output format.
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl ExportError {
    pub(crate) fn missing(kind: &'static str, name: impl Into<String>) -> Self {
        ExportError::MissingReference {
            kind,
            name: name.into(),
        }
    }
}
