use std::path::PathBuf;

use thiserror::Error;

use crate::crop::CroppingBox;

pub type XpResult<T> = Result<T, Error>;

/// Reasons an analysis of a file, or of a whole batch of files, could not complete.
#[derive(Error, Debug)]
pub enum Error {
    /// The file could not be opened, is not a decodable image or video, or held no frames.
    #[error("Failed to decode {}: {reason}", path.display())]
    Decode { path: PathBuf, reason: String },

    /// A cropping box does not lie inside the frame it was applied to.
    #[error("Cropping box {cropping_box} does not fit in a {width}x{height} frame")]
    InvalidRegion {
        cropping_box: CroppingBox,
        width: u32,
        height: u32,
    },

    /// The minimum-of-histogram method could not find a valley between two peaks.
    #[error("Unable to determine a threshold: {0}")]
    Threshold(String),

    /// Nothing was left in the mask after thresholding and closing.
    #[error("No region found in the thresholded frame")]
    NoRegionFound,

    #[error("No .{ext} files found in {}", dir.display())]
    NoInputFiles { dir: PathBuf, ext: String },

    #[error("Invalid file or directory: {}", .0.display())]
    InvalidPath(PathBuf),

    #[error("No cropping box was selected for experiment {0}")]
    MissingRoi(String),

    #[error("Failed to read cropping boxes from {}: {reason}", path.display())]
    RoiTable { path: PathBuf, reason: String },

    #[error(transparent)]
    ResultStore(#[from] ResultStoreError),

    /// A file of a fail-fast batch failed, aborting the batch.
    #[error("Processing {} failed: {source}", path.display())]
    Batch {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },
}

/// Errors while persisting or reloading a result set.
#[derive(Error, Debug)]
pub enum ResultStoreError {
    #[error("Error accessing result file {}: {src}", path.display())]
    StoreFileIo { src: std::io::Error, path: PathBuf },

    #[error("Failed to serialize results to {}: {src}", path.display())]
    Serialization { src: String, path: PathBuf },

    #[error("Failed to deserialize results from {}: {src}", path.display())]
    Deserialization { src: String, path: PathBuf },
}

impl Error {
    pub(crate) fn decode(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Decode {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
