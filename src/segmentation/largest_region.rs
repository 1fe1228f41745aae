use image::GrayImage;
use imageproc::region_labelling::Connectivity;

use super::{binarize, close, label_components, region_props, Footprint, RegionProps};
use crate::{Error, XpResult};

/// The largest bright region of `frame`.
///
/// The frame is binarized with `threshold`, closed with a 3x3 square and split into
/// 8-connected regions. Of regions with equal area, the one reached first in a row-major
/// scan wins.
///
/// # Errors
/// [`Error::NoRegionFound`] when no pixel survives thresholding and closing.
pub fn largest_region(frame: &GrayImage, threshold: u8) -> XpResult<RegionProps> {
    let mask = close(&binarize(frame, threshold), Footprint::Square3);
    let labels = label_components(&mask, Connectivity::Eight);

    region_props(&labels)
        .into_iter()
        .fold(None, |best: Option<RegionProps>, region| match best {
            Some(best) if best.area >= region.area => Some(best),
            _ => Some(region),
        })
        .ok_or(Error::NoRegionFound)
}
