use thiserror::Error;

#[derive(Error, Debug)]
pub enum NightfallError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid FITS file: {0}")]
    InvalidFits(String),

    #[error("FITS error: {0}")]
    Fits(#[from] fitsio::compat::errors::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Image format error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("No images to process")]
    EmptySequence,

    #[error("Image has no pixel data")]
    MissingData,

    #[error("Attribute '{0}' not found")]
    AttributeNotFound(String),

    #[error("Attribute '{name}' is not a {expected}")]
    AttributeType { name: String, expected: &'static str },

    #[error("'{0}' is a reserved image attribute")]
    ReservedAttribute(String),

    #[error("Metadata '{0}' missing or not usable")]
    MissingMetadata(String),

    #[error("No {0} images found")]
    NoCalibrationImages(String),

    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Stack blocks [{0}] require a stack image")]
    MissingStackImage(String),

    #[error(
        "Data blocks [{0}] cannot be used in a parallel sequence, consider passing them as data blocks"
    )]
    DataBlockInParallel(String),

    #[error("Unknown block type: {0}")]
    UnknownBlock(String),

    #[error("Invalid parameter '{param}' for block {block}: {reason}")]
    InvalidParameter {
        block: String,
        param: String,
        reason: String,
    },

    #[error("No block named '{0}'")]
    NoSuchBlock(String),

    #[error("Block {block} failed: {message}")]
    Block { block: String, message: String },

    #[error("Worker pool error: {0}")]
    WorkerPool(String),
}

pub type Result<T> = std::result::Result<T, NightfallError>;
