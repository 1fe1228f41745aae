use std::{collections::HashMap, path::Path};

use image::GrayImage;

use crate::{CroppingBox, Error, XpResult};

/// Chooses the cropping box of an experiment, given a representative frame of it.
pub trait RoiSelector {
    fn select(&self, exp_name: &str, reference_frame: &GrayImage) -> XpResult<CroppingBox>;
}

/// Keeps every frame whole.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FullFrame;

impl RoiSelector for FullFrame {
    fn select(&self, _exp_name: &str, reference_frame: &GrayImage) -> XpResult<CroppingBox> {
        Ok(CroppingBox::full_frame(reference_frame))
    }
}

/// Cropping boxes chosen ahead of time, one per experiment name.
///
/// On disk this is a JSON object mapping experiment names to
/// `[min_row, min_col, max_row, max_col]`:
/// ```json
/// {"Exp1": [10, 0, 470, 320], "Exp2": [0, 15, 480, 300]}
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RoiTable {
    boxes: HashMap<String, CroppingBox>,
}

impl RoiTable {
    pub fn new(boxes: HashMap<String, CroppingBox>) -> Self {
        Self { boxes }
    }

    pub fn from_json_file(path: &Path) -> XpResult<Self> {
        let table_err = |reason: String| Error::RoiTable {
            path: path.to_path_buf(),
            reason,
        };

        let text = std::fs::read_to_string(path).map_err(|e| table_err(e.to_string()))?;
        let raw: HashMap<String, [u32; 4]> =
            serde_json::from_str(&text).map_err(|e| table_err(e.to_string()))?;

        log::debug!(target: "roi", "Loaded {} cropping boxes from {}", raw.len(), path.display());
        Ok(Self::new(
            raw.into_iter().map(|(name, bounds)| (name, bounds.into())).collect(),
        ))
    }

    pub fn get(&self, exp_name: &str) -> Option<CroppingBox> {
        self.boxes.get(exp_name).copied()
    }
}

impl RoiSelector for RoiTable {
    fn select(&self, exp_name: &str, reference_frame: &GrayImage) -> XpResult<CroppingBox> {
        let cropping_box = self
            .get(exp_name)
            .ok_or_else(|| Error::MissingRoi(exp_name.to_string()))?;

        let (width, height) = reference_frame.dimensions();
        if !cropping_box.fits_in((width, height)) {
            return Err(Error::InvalidRegion {
                cropping_box,
                width,
                height,
            });
        }
        Ok(cropping_box)
    }
}
