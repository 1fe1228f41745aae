//! Charts of a result set. A [`Chart`] is built from the records, then handed to one of the
//! [`ChartRenderer`] backends.

mod plotly;
mod raster;

use std::path::{Path, PathBuf};

use itertools::Itertools;
use xptools::{BubbleRecord, FrontRecord, ResultSet};

use crate::app::*;

pub(crate) use plotly::PlotlyRenderer;
pub(crate) use raster::RasterRenderer;

const FRONT_CHART_STEM: &str = "FrontHeight";
const BUBBLE_CHART_STEM: &str = "BubbleArea";

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum ChartKind {
    Scatter,
    /// Only the `x` values of each series are used.
    Histogram,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Series {
    pub name: String,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Chart {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub kind: ChartKind,
    pub series: Vec<Series>,
}

impl Chart {
    fn is_empty(&self) -> bool {
        self.series.iter().all(|s| s.x.is_empty())
    }
}

pub(crate) trait ChartRenderer {
    fn file_extension(&self) -> &'static str;

    fn render(&self, chart: &Chart, path: &Path) -> Result<(), AppError>;

    /// Which colour stands for which series, for backends whose output has no legend.
    fn legend(&self, _chart: &Chart) -> Option<String> {
        None
    }
}

fn renderer_for(backend: ChartBackend) -> Box<dyn ChartRenderer> {
    match backend {
        ChartBackend::Raster => Box::new(RasterRenderer::default()),
        ChartBackend::Plotly => Box::new(PlotlyRenderer),
    }
}

/// Front height against frame number, one series per experiment in result order.
pub(crate) fn front_chart(results: &ResultSet<FrontRecord>) -> Chart {
    let series = results
        .iter()
        .chunk_by(|rec| rec.exp_name.clone())
        .into_iter()
        .map(|(name, recs)| {
            let (x, y) = recs
                .map(|rec| (f64::from(rec.frame_index), rec.height_px))
                .unzip();
            Series { name, x, y }
        })
        .collect();

    Chart {
        title: "Front height".to_string(),
        x_label: "Time (s)".to_string(),
        y_label: "Height of Front (px)".to_string(),
        kind: ChartKind::Scatter,
        series,
    }
}

/// Distribution of bubble areas, one series per image.
pub(crate) fn bubble_chart(results: &ResultSet<BubbleRecord>) -> Chart {
    let series = results
        .iter()
        .chunk_by(|rec| rec.frame_index)
        .into_iter()
        .map(|(frame_index, recs)| Series {
            name: format!("Frame {frame_index}"),
            x: recs.map(|rec| rec.area_mm2).collect(),
            y: vec![],
        })
        .collect();

    Chart {
        title: "Bubble area".to_string(),
        x_label: "Area (mm^2)".to_string(),
        y_label: "Count".to_string(),
        kind: ChartKind::Histogram,
        series,
    }
}

pub(crate) fn chart_output_path(plot: &PlotCfg, cwd: &Path, stem: &str, ext: &str) -> PathBuf {
    let dir = if plot.save {
        cwd.to_path_buf()
    } else {
        std::env::temp_dir()
    };
    dir.join(stem).with_extension(ext)
}

pub(crate) fn draw_front_chart(
    results: &ResultSet<FrontRecord>,
    plot: &PlotCfg,
    cwd: &Path,
) -> Result<PathBuf, AppError> {
    draw(&front_chart(results), plot, cwd, FRONT_CHART_STEM)
}

pub(crate) fn draw_bubble_chart(
    results: &ResultSet<BubbleRecord>,
    plot: &PlotCfg,
    cwd: &Path,
) -> Result<PathBuf, AppError> {
    draw(&bubble_chart(results), plot, cwd, BUBBLE_CHART_STEM)
}

fn draw(chart: &Chart, plot: &PlotCfg, cwd: &Path, stem: &str) -> Result<PathBuf, AppError> {
    let renderer = renderer_for(plot.backend);
    let path = chart_output_path(plot, cwd, stem, renderer.file_extension());

    if chart.is_empty() {
        warn!(target: "charts", "Nothing to plot in {}", chart.title);
    }

    renderer.render(chart, &path)?;
    match renderer.legend(chart) {
        Some(legend) => {
            info!(target: "charts", "Chart written to {} ({legend})", path.display());
        }
        None => info!(target: "charts", "Chart written to {}", path.display()),
    }

    Ok(path)
}

/// The range covered by `vals`, widened when it is a single point.
pub(super) fn value_range(vals: impl IntoIterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = vals
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });

    if lo > hi {
        (0.0, 1.0)
    } else if lo == hi {
        (lo - 0.5, hi + 0.5)
    } else {
        (lo, hi)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn front_rec(exp_name: &str, frame_index: u32, height_px: f64) -> FrontRecord {
        FrontRecord {
            exp_name: exp_name.to_string(),
            frame_index,
            area: 0,
            min_row: 0,
            min_col: 0,
            max_row: 1,
            max_col: 1,
            height_px,
        }
    }

    fn bubble_rec(frame_index: u32, area_mm2: f64) -> BubbleRecord {
        BubbleRecord {
            frame_index,
            label: 1,
            area_mm2,
            eccentricity: 0.0,
            bbox_area_mm2: area_mm2,
        }
    }

    #[test]
    fn test_front_chart_one_series_per_experiment() {
        let results: ResultSet<FrontRecord> = [
            front_rec("B", 0, 1.0),
            front_rec("B", 1, 2.0),
            front_rec("A", 0, 5.0),
        ]
        .into_iter()
        .collect();

        let chart = front_chart(&results);

        assert_eq!(chart.kind, ChartKind::Scatter);
        assert_eq!(chart.y_label, "Height of Front (px)");
        assert_eq!(chart.x_label, "Time (s)");

        let names = chart.series.iter().map(|s| s.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, ["B", "A"]);
        assert_eq!(chart.series[0].x, [0.0, 1.0]);
        assert_eq!(chart.series[0].y, [1.0, 2.0]);
        assert_eq!(chart.series[1].y, [5.0]);
    }

    #[test]
    fn test_bubble_chart_one_series_per_frame() {
        let results: ResultSet<BubbleRecord> =
            [bubble_rec(0, 1.5), bubble_rec(0, 2.5), bubble_rec(1, 4.0)]
                .into_iter()
                .collect();

        let chart = bubble_chart(&results);

        assert_eq!(chart.kind, ChartKind::Histogram);
        assert_eq!(chart.series.len(), 2);
        assert_eq!(chart.series[0].name, "Frame 0");
        assert_eq!(chart.series[0].x, [1.5, 2.5]);
        assert_eq!(chart.series[1].x, [4.0]);
    }

    #[test]
    fn test_empty_results_give_empty_chart() {
        let chart = front_chart(&ResultSet::default());
        assert!(chart.series.is_empty());
        assert!(chart.is_empty());
    }

    #[test]
    fn test_chart_output_path() {
        let cwd = Path::new("/lab/run");

        let saved = PlotCfg {
            backend: ChartBackend::Raster,
            save: true,
        };
        assert_eq!(
            chart_output_path(&saved, cwd, FRONT_CHART_STEM, "png"),
            PathBuf::from("/lab/run/FrontHeight.png")
        );

        let unsaved = PlotCfg {
            backend: ChartBackend::Plotly,
            save: false,
        };
        assert_eq!(
            chart_output_path(&unsaved, cwd, BUBBLE_CHART_STEM, "html"),
            std::env::temp_dir().join("BubbleArea.html")
        );
    }

    #[test]
    fn test_value_range() {
        assert_eq!(value_range([3.0, -1.0, 2.0]), (-1.0, 3.0));
        assert_eq!(value_range([2.0]), (1.5, 2.5));
        assert_eq!(value_range([]), (0.0, 1.0));
        assert_eq!(value_range([f64::NAN, 1.0, 4.0]), (1.0, 4.0));
    }

    #[test]
    fn test_only_raster_charts_log_a_legend() {
        let results: ResultSet<FrontRecord> =
            [front_rec("A", 0, 1.0), front_rec("B", 0, 3.0)].into_iter().collect();
        let chart = front_chart(&results);

        let raster = renderer_for(ChartBackend::Raster).legend(&chart);
        assert_eq!(raster.as_deref(), Some("A: #1f77b4, B: #ff7f0e"));
        assert_eq!(renderer_for(ChartBackend::Plotly).legend(&chart), None);
    }

    #[test]
    fn test_draw_writes_with_backend_extension() {
        let dir = tempfile::tempdir().unwrap();
        let results: ResultSet<FrontRecord> =
            [front_rec("A", 0, 1.0), front_rec("A", 1, 3.0)].into_iter().collect();

        for (backend, ext) in [(ChartBackend::Raster, "png"), (ChartBackend::Plotly, "html")] {
            let plot = PlotCfg {
                backend,
                save: true,
            };
            let path = draw_front_chart(&results, &plot, dir.path()).unwrap();
            assert_eq!(path, dir.path().join("FrontHeight").with_extension(ext));
            assert!(path.is_file());
        }
    }
}
