#![allow(clippy::let_and_return)]
#![allow(clippy::len_without_is_empty)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::dbg_macro)]

//! # Overview
//! xptools extracts measurements from recordings of two kinds of laboratory experiment:
//! * the height of an advancing ice front, frame by frame, in a set of videos;
//! * the area and shape of every bubble in a set of still images.
//!
//! # How it works
//! Both analyses run the same chain of stages:
//! 1. Decode a file into grayscale frames ([`FrameSource`], [`MediaDecoder`]).
//! 2. Crop every frame to a rectangle chosen once per experiment ([`CroppingBox`], [`RoiSelector`]).
//! 3. Estimate one binarization threshold per clip ([`ThresholdMethod`], [`FrameSampling`]).
//! 4. Segment each frame into regions. The front keeps only the largest bright region
//!    ([`largest_region`]); bubbles are split apart with a distance-transform watershed
//!    ([`segment_bubbles`]).
//! 5. Project regions into flat records ([`FrontRecord`], [`BubbleRecord`]) and gather them
//!    into a [`ResultSet`], which can be saved to and reloaded from disk.
//!
//! ```no_run
//! use xptools::{discover_inputs, FrontPipeline, FullFrame, MediaDecoder, resolve_cropping_boxes};
//!
//! let files = discover_inputs("experiments/", "avi", false)?;
//! let boxes = resolve_cropping_boxes(&files, &MediaDecoder, &FullFrame)?;
//! let report = FrontPipeline::default().process_batch(&files, &MediaDecoder, &boxes)?;
//! println!("{}", report.summary());
//! # Ok::<(), xptools::Error>(())
//! ```
//!
//! # Prerequisites
//! Videos are decoded by calling Ffmpeg from the command line. You must make Ffmpeg and
//! Ffprobe available on the command line. Still images are decoded in-process.

pub(crate) mod definitions;
mod crop;
mod discovery;
mod error;
mod frame_source;
mod measurement;
mod pipeline;
mod result_store;
mod roi;
mod segmentation;
mod threshold;

pub use crop::{crop, crop_all, CroppingBox};
pub use definitions::{
    BUBBLE_IMAGE_EXTENSION, DEFAULT_SCALE_PX_PER_MM, FRONT_VIDEO_EXTENSION,
    PROCESSED_DATA_FILE_NAME,
};
pub use discovery::{discover_inputs, experiment_name};
pub use error::{Error, ResultStoreError, XpResult};
pub use frame_source::{FrameSource, MediaDecoder};
pub use measurement::{BubbleRecord, FrontRecord};
pub use pipeline::{
    batch::{resolve_cropping_boxes, BatchReport, CroppingBoxes, FailurePolicy, FileFailure},
    bubbles::BubblePipeline,
    front::FrontPipeline,
};
pub use result_store::{result_store_path, ResultSet};
pub use roi::{FullFrame, RoiSelector, RoiTable};
pub use segmentation::{
    binarize, close,
    largest_region::largest_region,
    label_components, region_props,
    watershed::{segment_bubbles, watershed_labels},
    Footprint, RegionProps,
};
pub use threshold::{clip_threshold, minimum_threshold, FrameSampling, ThresholdMethod};

pub use imageproc::region_labelling::Connectivity;
