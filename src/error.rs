//! Error handling and custom error types
//!
//! Provides unified error handling across the upload pipeline using thiserror.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unsupported image format: {filename}")]
    UnsupportedFormat { filename: String },

    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: usize, max: usize },

    #[error("Image decode error: {0}")]
    ImageDecode(#[source] image::ImageError),

    #[error("Image encode error ({size_class}): {source}")]
    ImageEncode {
        size_class: String,
        #[source]
        source: image::ImageError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invariant violated: {0}")]
    Invariant(String),
}

impl Error {
    /// Whether the uploader can fix this by choosing a different file.
    pub fn is_user_correctable(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedFormat { .. } | Error::FileTooLarge { .. }
        )
    }

    /// Message safe to show to the person who uploaded the file.
    ///
    /// Server-side faults collapse into one generic message so no paths or
    /// codec internals leak into a form response.
    pub fn user_message(&self) -> String {
        match self {
            Error::UnsupportedFormat { .. } => "Unsupported file format".to_string(),
            Error::FileTooLarge { max, .. } => format!(
                "File is larger than the allowed size of {} MB",
                max / (1024 * 1024)
            ),
            Error::ImageDecode(_) => "The file could not be read as an image".to_string(),
            Error::ImageEncode { .. }
            | Error::Io(_)
            | Error::Config(_)
            | Error::Invariant(_) => {
                "Something went wrong while processing the image".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
