use std::path::PathBuf;

use xptools::FailurePolicy;

/// Which of the two analyses a binary runs.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Program {
    /// Ice front height in every frame of a directory of videos.
    Front,
    /// Bubble sizes in one image or a directory of images.
    Bubbles,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReportVerbosity {
    Quiet,
    Default,
    Verbose,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ChartBackend {
    /// A PNG image.
    Raster,
    /// An HTML page with an interactive Plotly figure.
    Plotly,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct PlotCfg {
    pub backend: ChartBackend,
    /// Write the chart into the working directory instead of the temporary directory.
    pub save: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppCfg {
    pub program: Program,
    pub input: PathBuf,
    pub reprocess: bool,
    pub plot: PlotCfg,
    /// Pixels per millimetre. Only used by the bubble analysis.
    pub scale: f64,
    pub roi_file: Option<PathBuf>,
    pub failure_policy: FailurePolicy,
    pub verbosity: ReportVerbosity,
}
