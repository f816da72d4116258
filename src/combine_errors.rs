use thiserror::Error;

use crate::constants::PixelIndex;

#[derive(Error, Debug)]
pub enum CombineError {
    #[error("Input file not found: {0}")]
    MissingInput(String),

    #[error("Schema mismatch in {path}: {reason}")]
    SchemaMismatch { path: String, reason: String },

    #[error("Exposure {0} has no detections inside the pixel footprint")]
    NoOverlap(String),

    #[error("No objects left to write: {0}")]
    EmptyResult(String),

    #[error("Detection {0} was already folded into an object")]
    DuplicateDetection(String),

    #[error("Unknown photometric band for filter: {0}")]
    UnknownBand(String),

    #[error("Invalid combine parameter: {0}")]
    InvalidCombineParameter(String),

    #[error("Pixel {pix} is out of range for nside {nside}")]
    InvalidPixel { pix: PixelIndex, nside: u64 },

    #[error("Invalid observation date: {0}")]
    InvalidDate(String),

    #[error("Unable to perform file operation: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parquet error: {0}")]
    ParquetError(#[from] parquet::errors::ParquetError),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
}

impl CombineError {
    /// True for the errors that only cost one exposure or chip, never the whole pixel.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CombineError::MissingInput(_)
                | CombineError::SchemaMismatch { .. }
                | CombineError::NoOverlap(_)
                | CombineError::DuplicateDetection(_)
                | CombineError::UnknownBand(_)
                | CombineError::InvalidDate(_)
        )
    }
}

impl PartialEq for CombineError {
    fn eq(&self, other: &Self) -> bool {
        use CombineError::*;
        match (self, other) {
            (MissingInput(a), MissingInput(b)) => a == b,
            (
                SchemaMismatch {
                    path: pa,
                    reason: ra,
                },
                SchemaMismatch {
                    path: pb,
                    reason: rb,
                },
            ) => pa == pb && ra == rb,
            (NoOverlap(a), NoOverlap(b)) => a == b,
            (EmptyResult(a), EmptyResult(b)) => a == b,
            (DuplicateDetection(a), DuplicateDetection(b)) => a == b,
            (UnknownBand(a), UnknownBand(b)) => a == b,
            (InvalidCombineParameter(a), InvalidCombineParameter(b)) => a == b,
            (
                InvalidPixel {
                    pix: pa,
                    nside: na,
                },
                InvalidPixel {
                    pix: pb,
                    nside: nb,
                },
            ) => pa == pb && na == nb,
            (InvalidDate(a), InvalidDate(b)) => a == b,

            // Wrapped library errors are not comparable: same variant is enough
            (IoError(_), IoError(_)) => true,
            (ParquetError(_), ParquetError(_)) => true,
            (CsvError(_), CsvError(_)) => true,

            _ => false,
        }
    }
}
