use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    /////////////////////////////////
    //analysis problems
    #[error(transparent)]
    Analysis(#[from] xptools::Error),

    #[error(transparent)]
    Store(#[from] xptools::ResultStoreError),

    /////////////////////////////////
    //environment
    #[error("ffmpeg and ffprobe must be installed and on the PATH to read videos")]
    FfmpegMissing,

    #[error("Input directory not found: {0}")]
    MissingInputDir(PathBuf),

    /////////////////////////////////
    //charts
    #[error("Failed to write chart to {path}: {src}")]
    ChartWrite { path: PathBuf, src: String },
}

impl AppError {
    pub(crate) fn chart_write(path: impl Into<PathBuf>, src: impl ToString) -> Self {
        Self::ChartWrite {
            path: path.into(),
            src: src.to_string(),
        }
    }
}

pub fn print_error_and_quit(e: eyre::Report) -> ! {
    #[allow(clippy::print_stderr)]
    let () = eprintln!("{:?}", e);
    std::process::exit(1);
}
