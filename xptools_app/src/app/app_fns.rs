use std::{error::Error, path::Path};

use ffmpeg_cmdline_utils::ffmpeg_and_ffprobe_are_callable;
use serde::{de::DeserializeOwned, Serialize};
use xptools::{
    discover_inputs, resolve_cropping_boxes, result_store_path, BatchReport, BubblePipeline,
    BubbleRecord, FrontPipeline, FrontRecord, FullFrame, MediaDecoder, ResultSet, RoiSelector,
    RoiTable, BUBBLE_IMAGE_EXTENSION, FRONT_VIDEO_EXTENSION,
};

use crate::app::*;

// * read cfg
// * load saved results, unless asked to reprocess
// * otherwise: find inputs, choose cropping boxes, run the pipeline, save
// * draw the chart

pub fn run_app(program: Program) -> i32 {
    let cfg = arg_parse::parse_args(program);
    configure_logs(cfg.verbosity);

    let ret = match run_app_inner(&cfg) {
        Ok(()) => 0,
        Err(fatal_error) => {
            print_fatal_err(fatal_error, cfg.verbosity);
            1
        }
    };

    ret
}

fn run_app_inner(cfg: &AppCfg) -> eyre::Result<()> {
    let cwd = std::env::current_dir()?;

    match cfg.program {
        Program::Front => {
            let results = front_results(cfg)?;
            charts::draw_front_chart(&results, &cfg.plot, &cwd)?;
        }
        Program::Bubbles => {
            let results = bubble_results(cfg)?;
            charts::draw_bubble_chart(&results, &cfg.plot, &cwd)?;
        }
    }

    Ok(())
}

fn front_results(cfg: &AppCfg) -> eyre::Result<ResultSet<FrontRecord>> {
    if !cfg.input.is_dir() {
        return Err(AppError::MissingInputDir(cfg.input.clone()).into());
    }

    let store_path = result_store_path(&cfg.input);
    if let Some(results) = load_saved(cfg, &store_path)? {
        return Ok(results);
    }

    if !ffmpeg_and_ffprobe_are_callable() {
        return Err(AppError::FfmpegMissing.into());
    }

    let files = discover_inputs(&cfg.input, FRONT_VIDEO_EXTENSION, false)?;
    info!(target: "app", "Found {} videos in {}", files.len(), cfg.input.display());

    let selector = roi_selector(cfg)?;
    let boxes = resolve_cropping_boxes(&files, &MediaDecoder, selector.as_ref())?;

    let report = FrontPipeline::default()
        .with_failure_policy(cfg.failure_policy)
        .process_batch(&files, &MediaDecoder, &boxes)?;

    Ok(persist(report, &store_path)?)
}

fn bubble_results(cfg: &AppCfg) -> eyre::Result<ResultSet<BubbleRecord>> {
    let store_path = result_store_path(&cfg.input);
    if let Some(results) = load_saved(cfg, &store_path)? {
        return Ok(results);
    }

    let files = discover_inputs(&cfg.input, BUBBLE_IMAGE_EXTENSION, true)?;
    info!(target: "app", "Found {} images in {}", files.len(), cfg.input.display());

    let selector = roi_selector(cfg)?;
    let boxes = resolve_cropping_boxes(&files, &MediaDecoder, selector.as_ref())?;

    let report = BubblePipeline::new(cfg.scale)
        .with_failure_policy(cfg.failure_policy)
        .process_batch(&files, &MediaDecoder, &boxes)?;

    Ok(persist(report, &store_path)?)
}

fn roi_selector(cfg: &AppCfg) -> Result<Box<dyn RoiSelector>, AppError> {
    Ok(match &cfg.roi_file {
        Some(roi_file) => Box::new(RoiTable::from_json_file(roi_file)?),
        None => Box::new(FullFrame),
    })
}

/// The saved results of an earlier run, if there are any and reprocessing was not requested.
fn load_saved<R>(cfg: &AppCfg, store_path: &Path) -> Result<Option<ResultSet<R>>, AppError>
where
    R: DeserializeOwned,
{
    if cfg.reprocess || !store_path.is_file() {
        return Ok(None);
    }

    let results = ResultSet::load(store_path)?;
    info!(target: "app",
        "Loaded {} saved records from {} (use --reprocess to analyze again)",
        results.len(),
        store_path.display()
    );
    Ok(Some(results))
}

// Results of an incomplete batch are charted but never saved.
fn persist<R>(report: BatchReport<R>, store_path: &Path) -> Result<ResultSet<R>, AppError>
where
    R: Serialize,
{
    for failure in &report.failed {
        warn!(target: "app", "Skipped {}: {}", failure.path.display(), failure.error);
    }

    if report.is_complete() {
        report.results.save(store_path)?;
    } else {
        warn!(target: "app",
            "{} files failed, results not saved to {}",
            report.failed.len(),
            store_path.display()
        );
    }

    Ok(report.results)
}

fn print_fatal_err(fatal_err: eyre::Report, verbosity: ReportVerbosity) {
    error!(target: "app-errorlog", "{}", fatal_err);

    if verbosity == ReportVerbosity::Verbose {
        let mut source: Option<&(dyn Error + 'static)> = fatal_err.source();
        while let Some(e) = source {
            error!(target: "app-errorlog", "    caused by: {}", e);
            source = e.source();
        }
    }
}

pub fn configure_logs(verbosity: ReportVerbosity) {
    use simplelog::*;

    TermLogger::init(
        min_loglevel(verbosity),
        log_config(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )
    .unwrap_or_else(|e| print_error_and_quit(e.into()));
}

fn min_loglevel(verbosity: ReportVerbosity) -> simplelog::LevelFilter {
    use simplelog::LevelFilter;

    match verbosity {
        ReportVerbosity::Quiet => LevelFilter::Warn,
        ReportVerbosity::Default => LevelFilter::Info,
        ReportVerbosity::Verbose => LevelFilter::Trace,
    }
}

fn log_config() -> simplelog::Config {
    let mut cfg = simplelog::ConfigBuilder::new();
    cfg.build()
}
