use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::*;

/// Various causes of failure for ffmpeg/ffprobe functions.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum FfmpegError {
    /// Ffmpeg/Ffprobe command was not found. Make sure Ffmpeg is installed and can be found on the command line.
    #[error("ffmpeg/ffprobe file not found. Make sure ffmpeg/ffprobe are installed and visible on the command line")]
    FfmpegNotFound,

    /// Io error occurred while executing Ffmpeg/Ffprobe command
    #[error("Ffmpeg IO error: {0}")]
    Io(String),

    /// Ffmpeg/Ffprobe returned a nonzero exit code. The string holds the first few hundred
    /// characters of whatever was printed to stderr.
    #[error("Internal Ffmpeg Failure: {0}")]
    FfmpegInternal(String),

    /// Failed to interpret Ffmpeg/Ffprobe output as a utf8-string.
    #[error("utf8 parsing/conversion failure")]
    Utf8Conversion,

    /// Ffprobe reported a zero width or height for the first video stream (or found no
    /// video stream at all).
    #[error("Ffprobe reported no usable video resolution")]
    InvalidResolution,

    /// The frame stream ended partway through a frame. Holds the number of whole frames
    /// read before it.
    #[error("Ffmpeg output ended partway through frame {0}")]
    TruncatedFrame(u32),

    /// The frame stream was still running when its deadline passed.
    #[error("Ffmpeg did not finish before its deadline")]
    TimedOut,

    /// Failed to obtain video information.
    #[error("Failed to get video properties: {0}")]
    Info(#[from] VideoInfoError),
}
