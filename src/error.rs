//! Error type for PDF shrinking operations

use thiserror::Error;

/// Result type alias using [`ShrinkError`]
pub type Result<T> = std::result::Result<T, ShrinkError>;

/// Error type for PDF shrinking operations
#[derive(Error, Debug)]
pub enum ShrinkError {
    /// Input cannot be opened or parsed as PDF
    #[error("Can't read input: {0}")]
    InputUnreadable(String),

    /// Destination cannot be created or written
    #[error("Can't write to output: {0}")]
    OutputUnwritable(String),

    #[error("Compression quality must be between 0 and 1, got {0}")]
    QualityOutOfRange(f32),

    /// Pixels of an image XObject could not be decoded
    #[error("Failed to decode image {name}: {reason}")]
    ImageDecodeFailed { name: String, reason: String },

    /// The encoder rejected the pixels
    #[error("Failed to encode image {name}: {reason}")]
    ImageEncodeFailed { name: String, reason: String },

    #[error("Canceled by user.")]
    UserCanceled,

    /// Object resolution error from the PDF layer
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// A resource entry has a type the walker can't traverse
    #[error("Malformed resources: {0}")]
    MalformedResources(String),

    #[error("Failed to save PDF: {0}")]
    SaveFailed(String),
}

impl ShrinkError {
    pub(crate) fn decode(name: impl Into<String>, reason: impl ToString) -> Self {
        ShrinkError::ImageDecodeFailed {
            name: name.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn encode(name: impl Into<String>, reason: impl ToString) -> Self {
        ShrinkError::ImageEncodeFailed {
            name: name.into(),
            reason: reason.to_string(),
        }
    }
}
