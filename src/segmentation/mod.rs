//! Turning a grayscale frame into labelled regions, and summarizing each region.

pub mod largest_region;
pub mod watershed;

use std::collections::HashMap;

use image::{GrayImage, Luma};
use imageproc::{
    contrast::ThresholdType,
    definitions::Image,
    distance_transform::Norm,
    region_labelling::{connected_components, Connectivity},
};

use crate::CroppingBox;

/// Structuring element of a morphological closing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Footprint {
    /// 3x3 square: the 8 surrounding pixels.
    Square3,
    /// 3x3 cross: the 4 edge-adjacent pixels.
    Cross3,
}

impl Footprint {
    fn norm(self) -> Norm {
        match self {
            Self::Square3 => Norm::LInf,
            Self::Cross3 => Norm::L1,
        }
    }
}

/// Summary of one connected region of a label image.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionProps {
    /// 1-based, in order of the region's first pixel in a row-major scan.
    pub label: u32,
    /// Pixel count.
    pub area: u64,
    /// Bounding box, maxima exclusive.
    pub bbox: CroppingBox,
    /// Eccentricity of the ellipse with the same second central moments. 0 is a circle,
    /// values approach 1 as the region elongates.
    pub eccentricity: f64,
}

impl RegionProps {
    pub fn bbox_area(&self) -> u64 {
        self.bbox.area()
    }
}

/// Foreground (255) where `pixel > threshold`, background (0) elsewhere.
pub fn binarize(frame: &GrayImage, threshold: u8) -> GrayImage {
    imageproc::contrast::threshold(frame, threshold, ThresholdType::Binary)
}

/// Morphological closing of a binary mask: dilation followed by erosion.
pub fn close(mask: &GrayImage, footprint: Footprint) -> GrayImage {
    imageproc::morphology::close(mask, footprint.norm(), 1)
}

/// Label the connected foreground components of `mask`. Background is 0.
pub fn label_components(mask: &GrayImage, connectivity: Connectivity) -> Image<Luma<u32>> {
    connected_components(mask, connectivity, Luma([0]))
}

#[derive(Debug)]
struct MomentAcc {
    area: u64,
    min_row: u32,
    min_col: u32,
    max_row: u32,
    max_col: u32,
    sum_r: f64,
    sum_c: f64,
    sum_rr: f64,
    sum_cc: f64,
    sum_rc: f64,
}

impl MomentAcc {
    fn new(row: u32, col: u32) -> Self {
        Self {
            area: 0,
            min_row: row,
            min_col: col,
            max_row: row,
            max_col: col,
            sum_r: 0.0,
            sum_c: 0.0,
            sum_rr: 0.0,
            sum_cc: 0.0,
            sum_rc: 0.0,
        }
    }

    fn add(&mut self, row: u32, col: u32) {
        self.area += 1;
        self.min_row = self.min_row.min(row);
        self.min_col = self.min_col.min(col);
        self.max_row = self.max_row.max(row);
        self.max_col = self.max_col.max(col);

        let (r, c) = (f64::from(row), f64::from(col));
        self.sum_r += r;
        self.sum_c += c;
        self.sum_rr += r * r;
        self.sum_cc += c * c;
        self.sum_rc += r * c;
    }

    fn eccentricity(&self) -> f64 {
        let n = self.area as f64;
        let (mean_r, mean_c) = (self.sum_r / n, self.sum_c / n);
        let mu_rr = self.sum_rr / n - mean_r * mean_r;
        let mu_cc = self.sum_cc / n - mean_c * mean_c;
        let mu_rc = self.sum_rc / n - mean_r * mean_c;

        let half_trace = (mu_rr + mu_cc) / 2.0;
        let spread = (((mu_rr - mu_cc) / 2.0).powi(2) + mu_rc * mu_rc).sqrt();
        let major = half_trace + spread;
        let minor = (half_trace - spread).max(0.0);

        if major <= f64::EPSILON {
            return 0.0;
        }
        (1.0 - minor / major).clamp(0.0, 1.0).sqrt()
    }

    fn into_props(self, label: u32) -> RegionProps {
        RegionProps {
            label,
            area: self.area,
            bbox: CroppingBox::new(self.min_row, self.min_col, self.max_row + 1, self.max_col + 1),
            eccentricity: self.eccentricity(),
        }
    }
}

/// Properties of every nonzero label of `labels`, ordered (and renumbered from 1) by the
/// position of each region's first pixel in a row-major scan.
pub fn region_props(labels: &Image<Luma<u32>>) -> Vec<RegionProps> {
    let mut slot_of_label: HashMap<u32, usize> = HashMap::new();
    let mut accs: Vec<MomentAcc> = vec![];

    for (col, row, &Luma([label])) in labels.enumerate_pixels() {
        if label == 0 {
            continue;
        }
        let slot = *slot_of_label.entry(label).or_insert_with(|| {
            accs.push(MomentAcc::new(row, col));
            accs.len() - 1
        });
        accs[slot].add(row, col);
    }

    accs.into_iter()
        .zip(1..)
        .map(|(acc, label)| acc.into_props(label))
        .collect()
}
