use std::path::Path;

use image::{Rgb, RgbImage};
use imageproc::{
    drawing::{draw_filled_circle_mut, draw_filled_rect_mut, draw_line_segment_mut},
    rect::Rect,
};

use super::{value_range, Chart, ChartKind, ChartRenderer};
use crate::app::AppError;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([0, 0, 0]);
const PALETTE: [Rgb<u8>; 8] = [
    Rgb([31, 119, 180]),
    Rgb([255, 127, 14]),
    Rgb([44, 160, 44]),
    Rgb([214, 39, 40]),
    Rgb([148, 103, 189]),
    Rgb([140, 86, 75]),
    Rgb([227, 119, 194]),
    Rgb([127, 127, 127]),
];

const MARGIN_LEFT: u32 = 60;
const MARGIN_RIGHT: u32 = 20;
const MARGIN_TOP: u32 = 30;
const MARGIN_BOTTOM: u32 = 50;
const MARKER_RADIUS: i32 = 3;

/// Draws charts into a PNG image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RasterRenderer {
    pub width: u32,
    pub height: u32,
    pub histogram_bins: usize,
}

impl Default for RasterRenderer {
    fn default() -> Self {
        Self {
            width: 800,
            height: 500,
            histogram_bins: 20,
        }
    }
}

/// The drawing area inside the axes, in pixel coordinates.
#[derive(Debug, Clone, Copy)]
struct PlotArea {
    left: f32,
    right: f32,
    top: f32,
    bottom: f32,
}

impl PlotArea {
    fn width(&self) -> f32 {
        self.right - self.left
    }

    fn height(&self) -> f32 {
        self.bottom - self.top
    }

    fn x_px(&self, v: f64, (lo, hi): (f64, f64)) -> f32 {
        self.left + ((v - lo) / (hi - lo)) as f32 * self.width()
    }

    fn y_px(&self, v: f64, (lo, hi): (f64, f64)) -> f32 {
        self.bottom - ((v - lo) / (hi - lo)) as f32 * self.height()
    }
}

impl RasterRenderer {
    pub(crate) fn draw(&self, chart: &Chart) -> RgbImage {
        let mut img = RgbImage::from_pixel(self.width, self.height, BACKGROUND);

        let area = PlotArea {
            left: MARGIN_LEFT as f32,
            right: self.width.saturating_sub(MARGIN_RIGHT).max(MARGIN_LEFT + 1) as f32,
            top: MARGIN_TOP as f32,
            bottom: self.height.saturating_sub(MARGIN_BOTTOM).max(MARGIN_TOP + 1) as f32,
        };

        match chart.kind {
            ChartKind::Scatter => self.draw_scatter(&mut img, chart, area),
            ChartKind::Histogram => self.draw_histogram(&mut img, chart, area),
        }

        draw_line_segment_mut(&mut img, (area.left, area.bottom), (area.right, area.bottom), AXIS);
        draw_line_segment_mut(&mut img, (area.left, area.top), (area.left, area.bottom), AXIS);

        img
    }

    fn draw_scatter(&self, img: &mut RgbImage, chart: &Chart, area: PlotArea) {
        let x_range = value_range(chart.series.iter().flat_map(|s| s.x.iter().copied()));
        let y_range = value_range(chart.series.iter().flat_map(|s| s.y.iter().copied()));

        for (series, colour) in chart.series.iter().zip(PALETTE.iter().cycle()) {
            for (&x, &y) in series.x.iter().zip(&series.y) {
                if !(x.is_finite() && y.is_finite()) {
                    continue;
                }
                let centre = (
                    area.x_px(x, x_range).round() as i32,
                    area.y_px(y, y_range).round() as i32,
                );
                draw_filled_circle_mut(img, centre, MARKER_RADIUS, *colour);
            }
        }
    }

    fn draw_histogram(&self, img: &mut RgbImage, chart: &Chart, area: PlotArea) {
        let bins = self.histogram_bins.max(1);
        let x_range = value_range(chart.series.iter().flat_map(|s| s.x.iter().copied()));

        let counts = chart
            .series
            .iter()
            .map(|s| bin_counts(&s.x, x_range, bins))
            .collect::<Vec<_>>();
        let max_count = counts.iter().flatten().copied().max().unwrap_or(0).max(1);

        // series share each bin side by side.
        let bin_px = area.width() / bins as f32;
        let bar_px = (bin_px / counts.len().max(1) as f32).max(1.0);

        for (series_idx, (series_counts, colour)) in
            counts.iter().zip(PALETTE.iter().cycle()).enumerate()
        {
            for (bin, &count) in series_counts.iter().enumerate() {
                if count == 0 {
                    continue;
                }
                let bar_height = count as f32 / max_count as f32 * area.height();
                let x = area.left + bin as f32 * bin_px + series_idx as f32 * bar_px;
                let y = area.bottom - bar_height;

                let rect = Rect::at(x.round() as i32, y.round() as i32)
                    .of_size(bar_px.round().max(1.0) as u32, bar_height.round().max(1.0) as u32);
                draw_filled_rect_mut(img, rect, *colour);
            }
        }
    }
}

impl ChartRenderer for RasterRenderer {
    fn file_extension(&self) -> &'static str {
        "png"
    }

    fn render(&self, chart: &Chart, path: &Path) -> Result<(), AppError> {
        self.draw(chart)
            .save(path)
            .map_err(|e| AppError::chart_write(path, e))
    }
    fn legend(&self, chart: &Chart) -> Option<String> {
        let entries = chart
            .series
            .iter()
            .zip(PALETTE.iter().cycle())
            .map(|(series, Rgb([r, g, b]))| format!("{}: #{r:02x}{g:02x}{b:02x}", series.name))
            .collect::<Vec<_>>();

        (!entries.is_empty()).then(|| entries.join(", "))
    }
}

fn bin_counts(vals: &[f64], (lo, hi): (f64, f64), bins: usize) -> Vec<usize> {
    let mut counts = vec![0; bins];
    for v in vals.iter().filter(|v| v.is_finite()) {
        let pos = ((v - lo) / (hi - lo) * bins as f64).floor();
        let bin = (pos.max(0.0) as usize).min(bins - 1);
        counts[bin] += 1;
    }
    counts
}
