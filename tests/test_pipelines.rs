use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
    thread,
    time::Duration,
};

use image::{GrayImage, Luma};
use imageproc::drawing::draw_filled_circle_mut;
use itertools::Itertools;
use xptools::*;

const HUMP: [u8; 16] = [0, 1, 1, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 5, 5, 6];

/// A dark 40x60 frame whose bottom `front_rows` rows are bright.
fn front_frame(front_rows: u32) -> GrayImage {
    let (width, height) = (40, 60);
    GrayImage::from_fn(width, height, |x, y| {
        let hump = HUMP[((y * width + x) as usize) % HUMP.len()];
        if y >= height - front_rows {
            Luma([170 + hump])
        } else {
            Luma([30 + hump])
        }
    })
}

/// Clips held in memory, keyed by file name. Clips listed in `delays` take that long to
/// decode, so workers finish in a different order from the input.
#[derive(Default)]
struct MemorySource {
    clips: HashMap<String, Vec<GrayImage>>,
    delays: HashMap<String, Duration>,
    decodes: AtomicUsize,
}

impl MemorySource {
    fn with_clip(mut self, name: &str, frames: Vec<GrayImage>) -> Self {
        self.clips.insert(name.to_string(), frames);
        self
    }

    fn with_delay(mut self, name: &str, delay: Duration) -> Self {
        self.delays.insert(name.to_string(), delay);
        self
    }

    fn file_name(path: &Path) -> String {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

impl FrameSource for MemorySource {
    fn frames(&self, path: &Path) -> XpResult<Vec<GrayImage>> {
        let name = Self::file_name(path);
        self.decodes.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(&name) {
            thread::sleep(*delay);
        }
        self.clips.get(&name).cloned().ok_or_else(|| Error::Decode {
            path: path.to_path_buf(),
            reason: "not in memory".to_string(),
        })
    }
}

fn front_source() -> MemorySource {
    MemorySource::default()
        .with_clip("A.avi", [10, 20, 30, 40, 50].map(front_frame).to_vec())
        .with_clip("B.avi", vec![front_frame(20); 5])
}

fn paths(names: &[&str]) -> Vec<PathBuf> {
    names.iter().map(|n| Path::new("/experiments").join(n)).collect()
}

#[test]
fn test_front_end_to_end() {
    let files = paths(&["A.avi", "B.avi"]);
    let source = front_source();

    let boxes = resolve_cropping_boxes(&files, &source, &FullFrame).unwrap();
    let report = FrontPipeline::default()
        .process_batch(&files, &source, &boxes)
        .unwrap();

    assert!(report.is_complete());
    assert_eq!(report.results.len(), 10);

    let names = report.results.iter().map(|r| r.exp_name.as_str()).dedup().collect::<Vec<_>>();
    assert_eq!(names, vec!["A", "B"]);

    let a_heights = report
        .results
        .iter()
        .filter(|r| r.exp_name == "A")
        .map(|r| r.height_px)
        .collect::<Vec<_>>();
    assert_eq!(a_heights.len(), 5);
    assert!(a_heights.iter().tuple_windows().all(|(a, b)| a <= b));

    let b_areas = report
        .results
        .iter()
        .filter(|r| r.exp_name == "B")
        .map(|r| r.area)
        .unique()
        .collect::<Vec<_>>();
    assert_eq!(b_areas, vec![800]);
}

#[test]
fn test_front_order_ignores_completion_order() {
    let names = ["A.avi", "B.avi", "C.avi", "D.avi"];
    let source = front_source()
        .with_clip("C.avi", vec![front_frame(30); 2])
        .with_clip("D.avi", vec![front_frame(40); 3])
        .with_delay("A.avi", Duration::from_millis(150))
        .with_delay("B.avi", Duration::from_millis(75));

    let files = paths(&names);
    let boxes = resolve_cropping_boxes(&files, &source, &FullFrame).unwrap();
    let report = FrontPipeline::default()
        .process_batch(&files, &source, &boxes)
        .unwrap();

    let order = report.results.iter().map(|r| r.exp_name.as_str()).dedup().collect::<Vec<_>>();
    assert_eq!(order, vec!["A", "B", "C", "D"]);
    assert_eq!(report.succeeded, files);

    let frame_indexes = report
        .results
        .iter()
        .filter(|r| r.exp_name == "D")
        .map(|r| r.frame_index)
        .collect::<Vec<_>>();
    assert_eq!(frame_indexes, vec![0, 1, 2]);
}

#[test]
fn test_front_failure_policies() {
    let source = front_source().with_clip("Flat.avi", vec![GrayImage::from_pixel(40, 60, Luma([80])); 3]);
    let files = paths(&["A.avi", "Flat.avi", "B.avi"]);
    let boxes = resolve_cropping_boxes(&files, &source, &FullFrame).unwrap();

    let fail_fast = FrontPipeline::default().process_batch(&files, &source, &boxes);
    match fail_fast {
        Err(Error::Batch { path, source }) => {
            assert_eq!(path, files[1]);
            assert!(matches!(*source, Error::Threshold(_)));
        }
        other => panic!("expected batch failure, got {other:?}"),
    }

    let report = FrontPipeline::default()
        .with_failure_policy(FailurePolicy::BestEffort)
        .process_batch(&files, &source, &boxes)
        .unwrap();
    assert_eq!(report.succeeded, vec![files[0].clone(), files[2].clone()]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].path, files[1]);
    assert_eq!(report.results.len(), 10);
}

#[test]
fn test_front_with_roi_table() {
    let files = paths(&["A.avi", "B.avi"]);
    let source = front_source();

    let mut table = HashMap::new();
    table.insert("A".to_string(), CroppingBox::new(20, 0, 60, 40));
    let partial = RoiTable::new(table.clone());

    let missing = resolve_cropping_boxes(&files, &source, &partial);
    assert!(matches!(missing, Err(Error::Batch { source, .. }) if matches!(*source, Error::MissingRoi(_))));

    table.insert("B".to_string(), CroppingBox::new(0, 0, 60, 40));
    let boxes = resolve_cropping_boxes(&files, &source, &RoiTable::new(table)).unwrap();
    let report = FrontPipeline::default()
        .process_batch(&files, &source, &boxes)
        .unwrap();

    // The 10 bright rows of A's first frame sit at the bottom of the 40 cropped rows.
    let first = &report.results.records()[0];
    assert_eq!(first.exp_name, "A");
    assert_eq!((first.min_row, first.max_row), (30, 40));
    assert!((first.height_px - 400.0 / 40.0).abs() < 1e-9);
}

#[test]
fn test_resolution_decodes_before_processing() {
    let files = paths(&["A.avi", "B.avi"]);
    let source = front_source();

    let _boxes = resolve_cropping_boxes(&files, &source, &FullFrame).unwrap();
    assert_eq!(source.decodes.load(Ordering::SeqCst), 2);
}

fn bubble_image(centres: &[(i32, i32)], radius: i32) -> GrayImage {
    let mut frame = GrayImage::new(160, 60);
    for &centre in centres {
        draw_filled_circle_mut(&mut frame, centre, radius, Luma([255]));
    }
    frame
}

#[test]
fn test_bubbles_end_to_end() {
    let frame = bubble_image(&[(30, 30), (80, 30), (130, 30)], 10);
    let source = MemorySource::default().with_clip("Bubbles.png", vec![frame.clone()]);
    let files = paths(&["Bubbles.png"]);

    let boxes = resolve_cropping_boxes(&files, &source, &FullFrame).unwrap();
    let report = BubblePipeline::new(2.0)
        .process_batch(&files, &source, &boxes)
        .unwrap();

    let regions = segment_bubbles(&frame);
    assert_eq!(regions.len(), 3);
    assert_eq!(report.results.len(), 3);

    for (rec, region) in report.results.iter().zip(&regions) {
        assert_eq!(rec.frame_index, 0);
        assert_eq!(rec.area_mm2, region.area as f64 / 4.0);
        assert_eq!(rec.bbox_area_mm2, region.bbox_area() as f64 / 4.0);
    }
}

#[test]
fn test_bubble_frame_index_is_file_position() {
    let source = MemorySource::default()
        .with_clip("one.png", vec![bubble_image(&[(30, 30)], 10)])
        .with_clip("two.png", vec![bubble_image(&[(30, 30), (100, 30)], 10)]);
    let files = paths(&["one.png", "two.png"]);

    let boxes = resolve_cropping_boxes(&files, &source, &FullFrame).unwrap();
    let report = BubblePipeline::default()
        .process_batch(&files, &source, &boxes)
        .unwrap();

    let indexes = report.results.iter().map(|r| r.frame_index).collect::<Vec<_>>();
    assert_eq!(indexes, vec![0, 1, 1]);
}

#[test]
fn test_touching_bubbles_are_split() {
    let isolated = segment_bubbles(&bubble_image(&[(60, 30)], 15));
    let touching = segment_bubbles(&bubble_image(&[(60, 30), (88, 30)], 15));

    assert_eq!(isolated.len(), 1);
    assert_eq!(touching.len(), 2);

    let disc_area = isolated[0].area as f64;
    for region in &touching {
        assert!((region.area as f64 - disc_area).abs() / disc_area < 0.05);
    }
}

#[test]
fn test_saved_results_reload() {
    let files = paths(&["A.avi", "B.avi"]);
    let source = front_source();
    let boxes = resolve_cropping_boxes(&files, &source, &FullFrame).unwrap();
    let report = FrontPipeline::default()
        .process_batch(&files, &source, &boxes)
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let store = result_store_path(dir.path());
    report.results.save(&store).unwrap();

    let reloaded = ResultSet::<FrontRecord>::load(&store).unwrap();
    assert_eq!(reloaded, report.results);
}
