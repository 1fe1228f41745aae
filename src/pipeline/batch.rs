use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use crate::{
    definitions::{RESERVED_CORES, ROI_FRAME_FROM_END},
    experiment_name, CroppingBox, Error, FrameSource, ResultSet, RoiSelector, XpResult,
};

/// The cropping box of every experiment of a batch, keyed by experiment name.
pub type CroppingBoxes = HashMap<String, CroppingBox>;

/// What a batch does when one of its files cannot be processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FailurePolicy {
    /// The first failing file (in input order) fails the whole batch.
    #[default]
    FailFast,
    /// Failing files are reported and skipped; the records of the others are kept.
    BestEffort,
}

/// A file that was skipped by a best-effort batch, and why.
#[derive(Debug)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: Error,
}

/// Outcome of processing a list of files.
#[derive(Debug)]
pub struct BatchReport<R> {
    /// Records of every successful file, in input order.
    pub results: ResultSet<R>,
    pub succeeded: Vec<PathBuf>,
    pub failed: Vec<FileFailure>,
}

impl<R> BatchReport<R> {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} files succeeded, {} failed, {} records",
            self.succeeded.len(),
            self.failed.len(),
            self.results.len()
        )
    }
}

/// Fold per-file outcomes, already in input order, into a report.
pub(crate) fn gather<R>(
    outcomes: impl IntoIterator<Item = (PathBuf, XpResult<ResultSet<R>>)>,
    policy: FailurePolicy,
) -> XpResult<BatchReport<R>> {
    let mut sets = vec![];
    let mut succeeded = vec![];
    let mut failed = vec![];

    for (path, outcome) in outcomes {
        match (outcome, policy) {
            (Ok(set), _) => {
                succeeded.push(path);
                sets.push(set);
            }
            (Err(error), FailurePolicy::FailFast) => {
                return Err(Error::Batch {
                    path,
                    source: Box::new(error),
                })
            }
            (Err(error), FailurePolicy::BestEffort) => {
                log::warn!(target: "batch", "Skipping {}: {error}", path.display());
                failed.push(FileFailure { path, error });
            }
        }
    }

    Ok(BatchReport {
        results: ResultSet::concat(sets),
        succeeded,
        failed,
    })
}

/// Number of worker threads for a parallel batch: every core but `RESERVED_CORES`, and at
/// least one.
pub(crate) fn worker_count() -> usize {
    rayon::current_num_threads()
        .saturating_sub(RESERVED_CORES)
        .max(1)
}

/// Choose the cropping box of every file before any numeric processing starts.
///
/// The selector is shown the frame `ROI_FRAME_FROM_END` frames before the end of each clip
/// (the first frame of shorter clips, or the image itself for stills).
pub fn resolve_cropping_boxes<S, T>(
    files: &[PathBuf],
    source: &S,
    selector: &T,
) -> XpResult<CroppingBoxes>
where
    S: FrameSource + ?Sized,
    T: RoiSelector + ?Sized,
{
    let mut boxes = CroppingBoxes::new();
    for path in files {
        let cropping_box = select_for_file(path, source, selector).map_err(|e| Error::Batch {
            path: path.clone(),
            source: Box::new(e),
        })?;
        boxes.insert(experiment_name(path), cropping_box);
    }
    Ok(boxes)
}

fn select_for_file<S, T>(path: &Path, source: &S, selector: &T) -> XpResult<CroppingBox>
where
    S: FrameSource + ?Sized,
    T: RoiSelector + ?Sized,
{
    let exp_name = experiment_name(path);
    let frames = source.frames(path)?;
    let reference = frames
        .get(frames.len().saturating_sub(ROI_FRAME_FROM_END))
        .ok_or_else(|| Error::decode(path, "file contains no frames"))?;

    let cropping_box = selector.select(&exp_name, reference)?;
    log::debug!(target: "roi", "{exp_name}: cropping box {cropping_box}");
    Ok(cropping_box)
}
