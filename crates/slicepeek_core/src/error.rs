use thiserror::Error;

#[derive(Debug, Error)]
pub enum ThumbnailError {
    #[error("File not found")]
    FileNotFound,

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid container: {0}")]
    InvalidContainer(String),

    #[error("Corrupted file: {0}")]
    CorruptedFile(String),

    #[error("No embedded thumbnail found")]
    ThumbnailNotFound,

    #[error("Decompression failed: {0}")]
    DecompressionFailed(String),

    #[error("Image creation failed: {0}")]
    ImageCreationFailed(String),
}

pub type Result<T> = std::result::Result<T, ThumbnailError>;
