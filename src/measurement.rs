use serde::{Deserialize, Serialize};

use crate::RegionProps;

/// Position and size of the ice front in one frame of one experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontRecord {
    pub exp_name: String,
    pub frame_index: u32,
    pub area: u64,
    pub min_row: u32,
    pub min_col: u32,
    pub max_row: u32,
    pub max_col: u32,
    /// Front height in pixels, taken as `area / frame_height`. This is only exact when the
    /// front region spans a constant number of rows in every column.
    pub height_px: f64,
}

impl FrontRecord {
    pub fn from_region(
        exp_name: &str,
        frame_index: u32,
        region: &RegionProps,
        frame_height: u32,
    ) -> Self {
        Self {
            exp_name: exp_name.to_string(),
            frame_index,
            area: region.area,
            min_row: region.bbox.min_row,
            min_col: region.bbox.min_col,
            max_row: region.bbox.max_row,
            max_col: region.bbox.max_col,
            height_px: region.area as f64 / f64::from(frame_height.max(1)),
        }
    }
}

/// Size and shape of one bubble, in physical units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BubbleRecord {
    /// Position of the analyzed image in the list of images.
    pub frame_index: u32,
    pub label: u32,
    pub area_mm2: f64,
    pub eccentricity: f64,
    pub bbox_area_mm2: f64,
}

impl BubbleRecord {
    /// `scale` is in pixels per millimetre.
    pub fn from_region(frame_index: u32, region: &RegionProps, scale: f64) -> Self {
        let px_per_mm2 = scale * scale;
        Self {
            frame_index,
            label: region.label,
            area_mm2: region.area as f64 / px_per_mm2,
            eccentricity: region.eccentricity,
            bbox_area_mm2: region.bbox_area() as f64 / px_per_mm2,
        }
    }
}
