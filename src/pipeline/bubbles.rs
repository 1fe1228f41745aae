use std::path::{Path, PathBuf};

use image::GrayImage;

use super::batch::{gather, BatchReport, CroppingBoxes, FailurePolicy};
use crate::{
    crop, definitions::DEFAULT_SCALE_PX_PER_MM, experiment_name, segment_bubbles, BubbleRecord,
    Error, FrameSource, ResultSet, XpResult,
};

/// Measures every bubble of a set of still images.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BubblePipeline {
    /// Pixels per millimetre. Must be positive.
    pub scale: f64,
    pub failure_policy: FailurePolicy,
}

impl Default for BubblePipeline {
    fn default() -> Self {
        Self {
            scale: DEFAULT_SCALE_PX_PER_MM,
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl BubblePipeline {
    pub fn new(scale: f64) -> Self {
        Self {
            scale,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// One record per bubble of an already cropped image.
    pub fn process_image(&self, frame_index: u32, frame: &GrayImage) -> ResultSet<BubbleRecord> {
        segment_bubbles(frame)
            .iter()
            .map(|region| BubbleRecord::from_region(frame_index, region, self.scale))
            .collect()
    }

    /// Process the images one after another. Each image's records carry its position in
    /// `files` as their frame index.
    pub fn process_batch<S>(
        &self,
        files: &[PathBuf],
        source: &S,
        boxes: &CroppingBoxes,
    ) -> XpResult<BatchReport<BubbleRecord>>
    where
        S: FrameSource + ?Sized,
    {
        let outcomes = files.iter().zip(0u32..).map(|(path, frame_index)| {
            let outcome = self.process_file(path, frame_index, source, boxes);
            (path.clone(), outcome)
        });

        let report = gather(outcomes, self.failure_policy)?;
        log::info!(target: "bubbles", "{}", report.summary());
        Ok(report)
    }

    fn process_file<S>(
        &self,
        path: &Path,
        frame_index: u32,
        source: &S,
        boxes: &CroppingBoxes,
    ) -> XpResult<ResultSet<BubbleRecord>>
    where
        S: FrameSource + ?Sized,
    {
        let exp_name = experiment_name(path);
        let cropping_box = *boxes
            .get(&exp_name)
            .ok_or_else(|| Error::MissingRoi(exp_name.clone()))?;

        let frames = source.frames(path)?;
        let frame = frames
            .first()
            .ok_or_else(|| Error::decode(path, "file contains no frames"))?;

        let records = self.process_image(frame_index, &crop(frame, cropping_box)?);
        log::debug!(target: "bubbles", "{exp_name}: {} bubbles", records.len());
        Ok(records)
    }
}
