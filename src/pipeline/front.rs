use std::path::{Path, PathBuf};

use image::GrayImage;
use rayon::prelude::*;

use super::batch::{gather, worker_count, BatchReport, CroppingBoxes, FailurePolicy};
use crate::{
    clip_threshold, crop_all, experiment_name, largest_region, CroppingBox, Error, FrameSampling,
    FrameSource, FrontRecord, ResultSet, ThresholdMethod, XpResult,
};

/// Tracks the ice front through every frame of a set of videos.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrontPipeline {
    /// Which frame of a clip the clip's threshold is estimated from.
    pub threshold_sampling: FrameSampling,
    pub failure_policy: FailurePolicy,
}

impl FrontPipeline {
    #[must_use]
    pub fn with_threshold_sampling(mut self, sampling: FrameSampling) -> Self {
        self.threshold_sampling = sampling;
        self
    }

    #[must_use]
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// One record per frame of a single clip: crop every frame, estimate one
    /// minimum-of-histogram threshold for the clip, and measure the largest region of each
    /// frame.
    pub fn process_clip(
        &self,
        path: &Path,
        frames: &[GrayImage],
        cropping_box: CroppingBox,
    ) -> XpResult<ResultSet<FrontRecord>> {
        let exp_name = experiment_name(path);
        let cropped = crop_all(frames, cropping_box)?;
        let threshold = clip_threshold(&cropped, self.threshold_sampling, ThresholdMethod::Minimum)?;

        log::debug!(target: "front", "{exp_name}: {} frames, threshold {threshold}", cropped.len());

        cropped
            .iter()
            .zip(0u32..)
            .map(|(frame, frame_index)| -> XpResult<FrontRecord> {
                let region = largest_region(frame, threshold)?;
                Ok(FrontRecord::from_region(
                    &exp_name,
                    frame_index,
                    &region,
                    frame.height(),
                ))
            })
            .collect()
    }

    /// Process every file on a pool of worker threads.
    ///
    /// Records are concatenated in the order of `files` once every worker has finished, so
    /// the output does not depend on which clip finishes first.
    pub fn process_batch<S>(
        &self,
        files: &[PathBuf],
        source: &S,
        boxes: &CroppingBoxes,
    ) -> XpResult<BatchReport<FrontRecord>>
    where
        S: FrameSource + ?Sized,
    {
        let run = || {
            files
                .par_iter()
                .map(|path| (path.clone(), self.process_file(path, source, boxes)))
                .collect::<Vec<_>>()
        };

        let outcomes = match rayon::ThreadPoolBuilder::new()
            .num_threads(worker_count())
            .build()
        {
            Ok(pool) => pool.install(run),
            Err(e) => {
                log::warn!(target: "front", "Using the global thread pool: {e}");
                run()
            }
        };

        let report = gather(outcomes, self.failure_policy)?;
        log::info!(target: "front", "{}", report.summary());
        Ok(report)
    }

    fn process_file<S>(
        &self,
        path: &Path,
        source: &S,
        boxes: &CroppingBoxes,
    ) -> XpResult<ResultSet<FrontRecord>>
    where
        S: FrameSource + ?Sized,
    {
        let exp_name = experiment_name(path);
        let cropping_box = *boxes
            .get(&exp_name)
            .ok_or_else(|| Error::MissingRoi(exp_name.clone()))?;

        let frames = source.frames(path)?;
        self.process_clip(path, &frames, cropping_box)
    }
}
