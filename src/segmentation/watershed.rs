//! Splitting touching bubbles apart with a distance-transform watershed.

use std::{
    cmp::{Ordering, Reverse},
    collections::BinaryHeap,
};

use image::{GrayImage, Luma};
use imageproc::{
    definitions::Image, distance_transform::euclidean_squared_distance_transform,
    region_labelling::Connectivity,
};

use super::{binarize, close, label_components, region_props, Footprint, RegionProps};
use crate::definitions::{PEAK_FOOTPRINT, PEAK_MIN_DISTANCE};

/// Every bubble of `frame`.
///
/// The frame is binarized at its Otsu level and closed with a 3x3 cross. Touching bubbles
/// are separated by a watershed of the distance map, then each basin is measured.
pub fn segment_bubbles(frame: &GrayImage) -> Vec<RegionProps> {
    let level = imageproc::contrast::otsu_level(frame);
    let mask = close(&binarize(frame, level), Footprint::Cross3);

    let basins = watershed_labels(&mask);
    let regions = region_props(&label_components(&nonzero(&basins), Connectivity::Four));

    log::trace!(target: "watershed", "Otsu level {level}, {} regions", regions.len());
    regions
}

/// Label image of the watershed basins of a binary mask, seeded at the peaks of the
/// distance map. Pixels on the line between two basins, and pixels outside the mask, are 0.
pub fn watershed_labels(mask: &GrayImage) -> Image<Luma<u32>> {
    let (width, height) = mask.dimensions();
    let distance = stretch(distance_map(mask));
    let markers = label_components(&peak_mask(&distance, width, height), Connectivity::Four);

    flood(&distance, markers, mask)
}

/// Euclidean distance of every foreground pixel to the nearest background pixel, row-major.
/// Background pixels are 0.
fn distance_map(mask: &GrayImage) -> Vec<f64> {
    let mut background = mask.clone();
    for Luma([pix]) in background.pixels_mut() {
        *pix = if *pix == 0 { 255 } else { 0 };
    }

    // With no background anywhere, every pixel is equally far from it.
    if background.pixels().all(|&Luma([pix])| pix == 0) {
        return vec![0.0; mask.len()];
    }

    euclidean_squared_distance_transform(&background)
        .pixels()
        .map(|&Luma([sq])| sq.sqrt())
        .collect()
}

/// Rescale linearly onto [0, 1]. A constant map becomes all zeros.
fn stretch(mut values: Vec<f64>) -> Vec<f64> {
    let (lo, hi) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));

    if hi > lo {
        values.iter_mut().for_each(|v| *v = (*v - lo) / (hi - lo));
    } else {
        values.iter_mut().for_each(|v| *v = 0.0);
    }
    values
}

/// 255 at every pixel that is the maximum of the `PEAK_FOOTPRINT`-wide window around it,
/// strictly above the map's minimum and not within `PEAK_MIN_DISTANCE` of the border.
///
/// Of peaks closer than `PEAK_MIN_DISTANCE` (in either axis) to a higher one, or to an
/// equal one earlier in a row-major scan, only the first is kept.
fn peak_mask(values: &[f64], width: u32, height: u32) -> GrayImage {
    let (w, h) = (i64::from(width), i64::from(height));
    let reach = i64::from(PEAK_FOOTPRINT / 2);
    let border = i64::from(PEAK_MIN_DISTANCE);
    let floor = values.iter().copied().fold(f64::INFINITY, f64::min);

    let at = |x: i64, y: i64| -> f64 {
        if (0..w).contains(&x) && (0..h).contains(&y) {
            values[(y * w + x) as usize]
        } else {
            0.0
        }
    };

    let is_peak = |x: i64, y: i64| -> bool {
        let val = at(x, y);
        if val <= floor {
            return false;
        }
        let window = -reach..reach;
        window
            .clone()
            .flat_map(|dy| window.clone().map(move |dx| (dx, dy)))
            .all(|(dx, dy)| at(x + dx, y + dy) <= val)
    };

    let mut candidates = (border..h - border)
        .flat_map(|y| (border..w - border).map(move |x| (x, y)))
        .filter(|&(x, y)| is_peak(x, y))
        .collect::<Vec<_>>();
    candidates.sort_by(|&(ax, ay), &(bx, by)| at(bx, by).total_cmp(&at(ax, ay)));

    let mut kept: Vec<(i64, i64)> = vec![];
    for (x, y) in candidates {
        if kept
            .iter()
            .all(|&(kx, ky)| (kx - x).abs() > border || (ky - y).abs() > border)
        {
            kept.push((x, y));
        }
    }

    let mut peaks = GrayImage::new(width, height);
    for (x, y) in kept {
        peaks.put_pixel(x as u32, y as u32, Luma([255]));
    }
    peaks
}

fn nonzero(labels: &Image<Luma<u32>>) -> GrayImage {
    GrayImage::from_fn(labels.width(), labels.height(), |x, y| {
        if labels.get_pixel(x, y)[0] == 0 {
            Luma([0])
        } else {
            Luma([255])
        }
    })
}

#[derive(Debug, Clone, Copy)]
struct FloodItem {
    value: f64,
    age: u64,
    index: usize,
    source: usize,
}

impl Ord for FloodItem {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value
            .total_cmp(&other.value)
            .then(self.age.cmp(&other.age))
            .then(self.index.cmp(&other.index))
    }
}

impl PartialOrd for FloodItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for FloodItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FloodItem {}

/// Priority-flood of the negated distance map from the markers, restricted to the mask and
/// 4-connected. Equal heights are flooded first-come first-served. A pixel that would join
/// two differently labelled basins is left at 0 as a watershed line.
fn flood(distance: &[f64], markers: Image<Luma<u32>>, mask: &GrayImage) -> Image<Luma<u32>> {
    let (width, height) = markers.dimensions();
    let (w, h) = (width as usize, height as usize);

    let mut labels = markers.into_raw();
    let mut open = mask.as_raw().iter().map(|&pix| pix != 0).collect::<Vec<_>>();

    let neighbours = |index: usize| {
        let (x, y) = (index % w, index / w);
        [
            (y > 0).then(|| index - w),
            (x > 0).then(|| index - 1),
            (x + 1 < w).then(|| index + 1),
            (y + 1 < h).then(|| index + w),
        ]
        .into_iter()
        .flatten()
    };

    let mut queue = BinaryHeap::new();
    for (index, &label) in labels.iter().enumerate() {
        if label != 0 {
            queue.push(Reverse(FloodItem {
                value: -distance[index],
                age: 0,
                index,
                source: index,
            }));
        }
    }

    let mut age = 0;
    while let Some(Reverse(item)) = queue.pop() {
        if labels[item.index] != 0 && item.index != item.source {
            continue;
        }
        if separates_basins(&labels, &mut open, item.index, neighbours(item.index)) {
            continue;
        }
        labels[item.index] = labels[item.source];

        for next in neighbours(item.index) {
            if labels[next] != 0 || !open[next] {
                continue;
            }
            age += 1;
            queue.push(Reverse(FloodItem {
                value: -distance[next],
                age,
                index: next,
                source: item.source,
            }));
        }
    }

    // `labels` still has one entry per pixel.
    Image::from_raw(width, height, labels).unwrap_or_else(|| Image::new(width, height))
}

// True when `index` must stay unlabelled: it is already a line pixel (or outside the mask),
// or its open neighbours carry two different labels, which makes it a line pixel now.
fn separates_basins(
    labels: &[u32],
    open: &mut [bool],
    index: usize,
    neighbours: impl Iterator<Item = usize>,
) -> bool {
    if !open[index] {
        return true;
    }

    let mut seen = 0;
    for next in neighbours.filter(|&next| open[next]) {
        match labels[next] {
            0 => {}
            label if seen == 0 => seen = label,
            label if label != seen => {
                open[index] = false;
                return true;
            }
            _ => {}
        }
    }
    false
}

#[cfg(test)]
mod test {
    use imageproc::drawing::draw_filled_circle_mut;

    use super::*;

    fn discs(width: u32, height: u32, centres: &[(i32, i32)], radius: i32) -> GrayImage {
        let mut frame = GrayImage::new(width, height);
        for &centre in centres {
            draw_filled_circle_mut(&mut frame, centre, radius, Luma([255]));
        }
        frame
    }

    #[test]
    fn test_touching_discs_are_split() {
        let single = segment_bubbles(&discs(100, 80, &[(36, 40)], 15));
        assert_eq!(single.len(), 1);
        let disc_area = single[0].area as f64;

        let pair = segment_bubbles(&discs(100, 80, &[(36, 40), (64, 40)], 15));
        assert_eq!(pair.len(), 2);
        for region in &pair {
            let rel = (region.area as f64 - disc_area).abs() / disc_area;
            assert!(rel < 0.05, "area {} vs isolated {disc_area}", region.area);
        }
        assert!(pair[0].bbox.min_col < pair[1].bbox.min_col);
    }

    #[test]
    fn test_separate_discs_each_found() {
        let frame = discs(160, 60, &[(30, 30), (80, 30), (130, 30)], 10);
        let regions = segment_bubbles(&frame);

        assert_eq!(regions.len(), 3);
        assert!(regions.iter().all(|r| r.eccentricity < 0.2));

        let cols = regions.iter().map(|r| r.bbox.min_col).collect::<Vec<_>>();
        assert!(cols.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn test_small_bubble_near_edge_is_kept() {
        let mut frame = discs(140, 40, &[(30, 20), (70, 20)], 10);
        draw_filled_circle_mut(&mut frame, (110, 4), 3, Luma([255]));

        let regions = segment_bubbles(&frame);

        assert_eq!(regions.len(), 3);
        let small = regions
            .iter()
            .find(|r| r.bbox.min_col >= 100)
            .expect("bubble near the top edge");
        assert!(small.bbox.min_row <= 2);
        assert!(small.area < 50);
    }

    #[test]
    fn test_empty_and_full_frames_have_no_bubbles() {
        assert!(segment_bubbles(&GrayImage::new(30, 30)).is_empty());
        assert!(segment_bubbles(&GrayImage::from_pixel(30, 30, Luma([200]))).is_empty());
    }

    #[test]
    fn test_stretch() {
        assert_eq!(stretch(vec![2.0, 4.0, 6.0]), vec![0.0, 0.5, 1.0]);
        assert_eq!(stretch(vec![3.0, 3.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_distance_map_of_bar() {
        let mask = GrayImage::from_vec(7, 1, vec![0, 255, 255, 255, 255, 255, 0]).unwrap();
        assert_eq!(distance_map(&mask), vec![0.0, 1.0, 2.0, 3.0, 2.0, 1.0, 0.0]);
    }

    #[test]
    fn test_peaks_respect_border_and_floor() {
        let (w, h) = (20, 20);
        let mut values = vec![0.0; w * h];
        values[10 * w + 10] = 1.0;
        values[2 * w + 2] = 1.0;
        values[5 * w] = 1.0;
        values[19 * w + 15] = 1.0;

        let peaks = peak_mask(&values, w as u32, h as u32);
        let found = peaks
            .enumerate_pixels()
            .filter(|(_, _, &Luma([p]))| p != 0)
            .map(|(x, y, _)| (x, y))
            .collect::<Vec<_>>();
        assert_eq!(found, vec![(2, 2), (10, 10)]);

        let flat = peak_mask(&vec![0.5; w * h], w as u32, h as u32);
        assert!(flat.pixels().all(|&Luma([p])| p == 0));
    }

    #[test]
    fn test_adjacent_equal_peaks_are_merged() {
        let (w, h) = (20, 20);
        let mut values = vec![0.0; w * h];
        values[8 * w + 8] = 1.0;
        values[9 * w + 9] = 1.0;

        let peaks = peak_mask(&values, w as u32, h as u32);
        assert_eq!(peaks.pixels().filter(|&&Luma([p])| p != 0).count(), 1);
        assert_eq!(peaks.get_pixel(8, 8), &Luma([255]));
    }

    #[test]
    fn test_flood_draws_line_between_basins() {
        // Two markers at the ends of a bar; the middle pixel is equally far from both.
        let mask = GrayImage::from_pixel(5, 1, Luma([255]));
        let distance = vec![0.0; 5];
        let markers = Image::<Luma<u32>>::from_vec(5, 1, vec![1, 0, 0, 0, 2]).unwrap();

        let act = flood(&distance, markers, &mask).into_raw();
        assert_eq!(act, vec![1, 1, 0, 2, 2]);
    }
}
