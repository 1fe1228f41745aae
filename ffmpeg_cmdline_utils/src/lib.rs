#![allow(clippy::let_and_return)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::dbg_macro)]

//! Read every frame of a video file as an 8-bit grayscale [`image::GrayImage`] by running
//! `ffmpeg` on the command line and reading raw luma frames from its stdout.
//!
//! `ffmpeg` and `ffprobe` must be callable from the command line. Use
//! [`ffmpeg_and_ffprobe_are_callable`] to check this before decoding anything.
//!
//! ```no_run
//! use ffmpeg_cmdline_utils::GrayFrameReader;
//!
//! let frames = GrayFrameReader::new("clip.avi").spawn()?;
//! for frame in frames {
//!     assert!(frame.width() > 0);
//! }
//! # Ok::<(), ffmpeg_cmdline_utils::FfmpegError>(())
//! ```

mod ffmpeg_error_kind;
mod ffmpeg_ops;
mod ffmpeg_stats;

pub use ffmpeg_error_kind::FfmpegError;
pub use ffmpeg_ops::{ffmpeg_and_ffprobe_are_callable, GrayFrameReader, GrayFrames};
pub use ffmpeg_stats::{VideoInfo, VideoInfoError};
