use std::fmt;

use image::{GenericImageView, GrayImage};
use serde::{Deserialize, Serialize};

use crate::{Error, XpResult};

/// A rectangular region of interest in pixel coordinates: rows `min_row..max_row` and
/// columns `min_col..max_col` (maxima exclusive).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CroppingBox {
    pub min_row: u32,
    pub min_col: u32,
    pub max_row: u32,
    pub max_col: u32,
}

impl CroppingBox {
    #[must_use]
    pub fn new(min_row: u32, min_col: u32, max_row: u32, max_col: u32) -> Self {
        Self {
            min_row,
            min_col,
            max_row,
            max_col,
        }
    }

    /// A box covering the whole of `frame`.
    #[must_use]
    pub fn full_frame<I: GenericImageView>(frame: &I) -> Self {
        let (width, height) = frame.dimensions();
        Self::new(0, 0, height, width)
    }

    pub fn height(&self) -> u32 {
        self.max_row.saturating_sub(self.min_row)
    }

    pub fn width(&self) -> u32 {
        self.max_col.saturating_sub(self.min_col)
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width()) * u64::from(self.height())
    }

    /// True when the box is non-empty and lies inside a frame of the given (width, height).
    pub fn fits_in(&self, (width, height): (u32, u32)) -> bool {
        self.min_row < self.max_row
            && self.min_col < self.max_col
            && self.max_row <= height
            && self.max_col <= width
    }

    /// (x, y, width, height), as taken by [`GenericImageView::view`].
    #[must_use]
    pub fn as_view_args(&self) -> (u32, u32, u32, u32) {
        (self.min_col, self.min_row, self.width(), self.height())
    }
}

impl fmt::Display for CroppingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.min_row, self.min_col, self.max_row, self.max_col
        )
    }
}

impl From<[u32; 4]> for CroppingBox {
    fn from([min_row, min_col, max_row, max_col]: [u32; 4]) -> Self {
        Self::new(min_row, min_col, max_row, max_col)
    }
}

/// Copy out the part of `frame` addressed by `cropping_box`.
pub fn crop(frame: &GrayImage, cropping_box: CroppingBox) -> XpResult<GrayImage> {
    let (width, height) = frame.dimensions();
    if !cropping_box.fits_in((width, height)) {
        return Err(Error::InvalidRegion {
            cropping_box,
            width,
            height,
        });
    }

    let (x, y, w, h) = cropping_box.as_view_args();
    Ok(frame.view(x, y, w, h).to_image())
}

/// Apply the same cropping box to every frame of a clip.
pub fn crop_all(frames: &[GrayImage], cropping_box: CroppingBox) -> XpResult<Vec<GrayImage>> {
    frames
        .iter()
        .map(|frame| crop(frame, cropping_box))
        .collect()
}
