use image::GrayImage;

use crate::{definitions::MAX_HISTOGRAM_SMOOTHING_ROUNDS, Error, XpResult};

/// Algorithms to pick the global cut between background and foreground intensities.
/// Pixels strictly above the returned level are foreground.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThresholdMethod {
    /// Lowest point of the histogram valley between its two peaks. Fails on images whose
    /// histogram is not bimodal.
    Minimum,
    /// Otsu's inter-class variance maximization. Always produces a level.
    Otsu,
}

impl ThresholdMethod {
    pub fn estimate(self, frame: &GrayImage) -> XpResult<u8> {
        match self {
            Self::Minimum => minimum_threshold(frame),
            Self::Otsu => Ok(imageproc::contrast::otsu_level(frame)),
        }
    }
}

/// Which frame of a clip stands in for the whole clip when estimating its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrameSampling {
    /// The frame at index `len / 2`.
    #[default]
    Median,
    /// A fixed frame index, clamped to the last frame.
    Index(usize),
}

impl FrameSampling {
    pub fn pick<'a>(&self, frames: &'a [GrayImage]) -> Option<&'a GrayImage> {
        let idx = match *self {
            Self::Median => frames.len() / 2,
            Self::Index(idx) => idx.min(frames.len().checked_sub(1)?),
        };
        frames.get(idx)
    }
}

/// One threshold for a whole clip, estimated on the frame chosen by `sampling`.
///
/// Only a single frame is examined. Comparing the thresholds of several frames would be
/// more robust but is not done.
pub fn clip_threshold(
    frames: &[GrayImage],
    sampling: FrameSampling,
    method: ThresholdMethod,
) -> XpResult<u8> {
    let frame = sampling
        .pick(frames)
        .ok_or_else(|| Error::Threshold("clip has no frames".to_string()))?;
    method.estimate(frame)
}

/// Minimum-of-histogram threshold.
///
/// The histogram spans the image's own intensity range, one bin per level. It is smoothed
/// with a 3-wide mean filter until fewer than three local maxima remain; exactly two must
/// be left, and the threshold is the first lowest bin between them.
pub fn minimum_threshold(frame: &GrayImage) -> XpResult<u8> {
    let (lowest_level, counts) = intensity_histogram(frame)
        .ok_or_else(|| Error::Threshold("image has no pixels".to_string()))?;

    let mut smoothed = counts.iter().map(|&c| c as f32).collect::<Vec<_>>();
    let mut maxima = vec![];
    let mut converged = false;
    for _round in 0..MAX_HISTOGRAM_SMOOTHING_ROUNDS {
        smoothed = mean_filter_3(&smoothed);
        maxima = local_maxima(&smoothed);
        if maxima.len() < 3 {
            converged = true;
            break;
        }
    }

    let (first_peak, second_peak) = match maxima.as_slice() {
        _ if !converged => {
            return Err(Error::Threshold(
                "maximum number of histogram smoothing rounds reached".to_string(),
            ))
        }
        &[first, second] => (first, second),
        other => {
            return Err(Error::Threshold(format!(
                "unable to find two maxima in histogram (found {})",
                other.len()
            )))
        }
    };

    let valley = smoothed[first_peak..=second_peak]
        .iter()
        .enumerate()
        .fold((0, f32::INFINITY), |(best_idx, best), (idx, &val)| {
            if val < best {
                (idx, val)
            } else {
                (best_idx, best)
            }
        })
        .0;

    let level = usize::from(lowest_level) + first_peak + valley;
    u8::try_from(level).map_err(|_| Error::Threshold(format!("level {level} out of range")))
}

/// The lowest intensity present in `frame`, and the pixel counts of every level from it up
/// to the highest intensity present.
fn intensity_histogram(frame: &GrayImage) -> Option<(u8, Vec<u32>)> {
    let hist = imageproc::stats::histogram(frame);
    let counts = hist.channels.first()?;

    let lowest = counts.iter().position(|&c| c > 0)?;
    let highest = counts.iter().rposition(|&c| c > 0)?;

    Some((lowest as u8, counts[lowest..=highest].to_vec()))
}

// 3-wide running mean; the edge samples are reflected.
fn mean_filter_3(values: &[f32]) -> Vec<f32> {
    let last = values.len().saturating_sub(1);
    (0..values.len())
        .map(|i| {
            let left = f64::from(values[i.saturating_sub(1)]);
            let right = f64::from(values[(i + 1).min(last)]);
            ((left + f64::from(values[i]) + right) / 3.0) as f32
        })
        .collect()
}

// A maximum is recorded where a rising (or flat) run first falls, so plateaus count once.
// The final bin can never be recorded.
fn local_maxima(values: &[f32]) -> Vec<usize> {
    let mut maxima = vec![];
    let mut rising = true;
    for (i, pair) in values.windows(2).enumerate() {
        if rising {
            if pair[1] < pair[0] {
                rising = false;
                maxima.push(i);
            }
        } else if pair[1] > pair[0] {
            rising = true;
        }
    }
    maxima
}

#[cfg(test)]
mod test {
    use image::Luma;

    use super::*;

    // Offsets whose level counts form a single-peaked hump: 1, 2, 3, 4, 3, 2, 1.
    const HUMP: [u8; 16] = [0, 1, 1, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 5, 5, 6];

    fn bimodal(width: u32, height: u32, dark: u8, bright: u8) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            let hump = HUMP[((y * width + x) as usize) % HUMP.len()];
            if x < width / 2 {
                Luma([dark + hump])
            } else {
                Luma([bright + hump])
            }
        })
    }

    #[test]
    fn test_minimum_threshold_falls_between_modes() {
        let img = bimodal(32, 32, 40, 180);
        let thresh = minimum_threshold(&img).unwrap();

        assert!(thresh >= 46, "threshold {thresh} inside dark mode");
        assert!(thresh < 180, "threshold {thresh} inside bright mode");
    }

    #[test]
    fn test_minimum_threshold_is_deterministic() {
        let img = bimodal(30, 24, 20, 200);
        let first = ThresholdMethod::Minimum.estimate(&img).unwrap();
        for _ in 0..5 {
            assert_eq!(ThresholdMethod::Minimum.estimate(&img).unwrap(), first);
        }
    }

    #[test]
    fn test_minimum_threshold_rejects_unimodal() {
        let flat = GrayImage::from_pixel(10, 10, Luma([77]));
        assert!(matches!(minimum_threshold(&flat), Err(Error::Threshold(_))));

        let hump = GrayImage::from_fn(16, 16, |x, y| {
            Luma([100 + HUMP[((y * 16 + x) as usize) % HUMP.len()]])
        });
        assert!(matches!(minimum_threshold(&hump), Err(Error::Threshold(_))));
    }

    #[test]
    fn test_otsu_separates_two_levels() {
        let img = GrayImage::from_fn(10, 10, |x, _y| if x < 4 { Luma([10]) } else { Luma([220]) });
        let thresh = ThresholdMethod::Otsu.estimate(&img).unwrap();

        assert!((10..220).contains(&thresh));
    }

    #[test]
    fn test_local_maxima_plateau_counts_once() {
        let values = [0.0, 1.0, 3.0, 3.0, 3.0, 1.0, 0.0, 2.0, 5.0, 4.0];
        assert_eq!(local_maxima(&values), vec![4, 8]);
    }

    #[test]
    fn test_local_maxima_ignores_rising_tail() {
        let values = [5.0, 1.0, 2.0, 3.0];
        assert_eq!(local_maxima(&values), vec![0]);
    }

    #[test]
    fn test_mean_filter_reflects_edges() {
        let act = mean_filter_3(&[3.0, 0.0, 0.0, 6.0]);
        assert_eq!(act, vec![2.0, 1.0, 2.0, 4.0]);
    }

    #[test]
    fn test_frame_sampling() {
        let frames = (0..5u8)
            .map(|i| GrayImage::from_pixel(1, 1, Luma([i])))
            .collect::<Vec<_>>();

        let pick = |sampling: FrameSampling| sampling.pick(&frames).map(|f| f.get_pixel(0, 0)[0]);
        assert_eq!(pick(FrameSampling::Median), Some(2));
        assert_eq!(pick(FrameSampling::Index(1)), Some(1));
        assert_eq!(pick(FrameSampling::Index(99)), Some(4));

        assert!(FrameSampling::Median.pick(&[]).is_none());
        assert!(FrameSampling::Index(0).pick(&[]).is_none());
    }
}
