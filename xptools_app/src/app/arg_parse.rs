use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use clap::{value_parser, ArgAction::*};
use xptools::{FailurePolicy, DEFAULT_SCALE_PX_PER_MM};

use crate::app::*;

// input specification
const INPUT_PATH: &str = "Input path";
const ROI_FILE: &str = "ROI file";

// processing
const REPROCESS: &str = "Reprocess";
const SCALE: &str = "Scale";
const KEEP_GOING: &str = "Keep going";

// charts
const PLOTLY: &str = "Plotly";
const SAVE: &str = "Save";

//Verbosity
const VERBOSITY_QUIET: &str = "Quiet";
const VERBOSITY_VERBOSE: &str = "Verbose";

const DISPLAY_ORDERING: [&str; 9] = [
    //
    // input specification
    INPUT_PATH,
    ROI_FILE,
    //
    // processing
    REPROCESS,
    SCALE,
    KEEP_GOING,
    //
    // charts
    PLOTLY,
    SAVE,
    //
    //verbosity
    VERBOSITY_QUIET,
    VERBOSITY_VERBOSE,
];

fn get_ordering(arg_name: &str) -> usize {
    match DISPLAY_ORDERING.iter().position(|x| *x == arg_name) {
        Some(idx) => idx,
        None => {
            panic!("argument not assigned a display order: {arg_name:?}");
        }
    }
}

fn parse_scale(val: &str) -> Result<f64, String> {
    let scale = val
        .parse::<f64>()
        .map_err(|e| format!("{val:?} is not a number: {e}"))?;
    if scale.is_finite() && scale > 0.0 {
        Ok(scale)
    } else {
        Err(format!("scale must be a positive number of pixels per mm, got {val}"))
    }
}

fn build_app(program: Program) -> clap::Command {
    //args are not added through method chaining because rustfmt struggles with very long expressions.
    let mut clap_app = match program {
        Program::Front => clap::Command::new("analyze_front")
            .about("Measure the height of the ice front in every frame of a directory of .avi videos"),
        Program::Bubbles => clap::Command::new("analyze_bubbles")
            .about("Measure the area and eccentricity of every bubble in .png images"),
    }
    .version(clap::crate_version!());

    let input_arg = clap::Arg::new(INPUT_PATH)
        .value_parser(value_parser!(PathBuf))
        .display_order(get_ordering(INPUT_PATH));
    clap_app = clap_app.arg(match program {
        Program::Front => input_arg
            .required(true)
            .help("Directory holding the .avi videos of the experiments"),
        Program::Bubbles => input_arg
            .default_value(".")
            .help("A .png image, or a directory holding .png images"),
    });

    clap_app = clap_app.arg(
        clap::Arg::new(ROI_FILE)
            .long("roi")
            .value_parser(value_parser!(PathBuf))
            .num_args(1)
            .help("JSON file mapping each experiment name to its cropping box, as [min_row, min_col, max_row, max_col]. Without it the whole frame is analyzed")
            .display_order(get_ordering(ROI_FILE)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(REPROCESS)
            .short('r')
            .long("reprocess")
            .help("Analyze the input again even if saved results exist")
            .action(SetTrue)
            .display_order(get_ordering(REPROCESS)),
    );

    if program == Program::Bubbles {
        clap_app = clap_app.arg(
            clap::Arg::new(SCALE)
                .short('c')
                .long("scale")
                .value_parser(parse_scale)
                .num_args(1)
                .default_value(DEFAULT_SCALE_PX_PER_MM.to_string())
                .help("Image scale in pixels per mm")
                .display_order(get_ordering(SCALE)),
        );
    }

    clap_app = clap_app.arg(
        clap::Arg::new(KEEP_GOING)
            .long("keep-going")
            .help("Skip files that cannot be analyzed instead of stopping at the first one. Results are then not saved")
            .action(SetTrue)
            .display_order(get_ordering(KEEP_GOING)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(PLOTLY)
            .short('p')
            .long("plotly")
            .help("Draw an interactive HTML chart instead of a PNG")
            .action(SetTrue)
            .display_order(get_ordering(PLOTLY)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(SAVE)
            .short('s')
            .long("save")
            .help("Write the chart into the working directory")
            .action(SetTrue)
            .display_order(get_ordering(SAVE)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(VERBOSITY_QUIET)
            .short('q')
            .long("quiet")
            .help("Reduced verbosity")
            .conflicts_with(VERBOSITY_VERBOSE)
            .action(SetTrue)
            .display_order(get_ordering(VERBOSITY_QUIET)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(VERBOSITY_VERBOSE)
            .short('v')
            .long("verbose")
            .help("Increased verbosity")
            .conflicts_with(VERBOSITY_QUIET)
            .action(SetTrue)
            .display_order(get_ordering(VERBOSITY_VERBOSE)),
    );

    clap_app
}

pub fn parse_args(program: Program) -> AppCfg {
    match parse_args_from(program, std::env::args_os()) {
        Ok(cfg) => cfg,
        Err(e) => e.exit(),
    }
}

pub(crate) fn parse_args_from<I, T>(program: Program, args: I) -> Result<AppCfg, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    //capture the cwd once, to minimize the risk of working with two values if it is changed by the OS at runtime.
    let cwd = std::env::current_dir().unwrap_or_default();

    let args = build_app(program).try_get_matches_from(args)?;

    let input = args
        .get_one::<PathBuf>(INPUT_PATH)
        .map(|p| absolutify_path(&cwd, p))
        .unwrap_or_else(|| cwd.clone());

    let verbosity = if args.get_flag(VERBOSITY_QUIET) {
        ReportVerbosity::Quiet
    } else if args.get_flag(VERBOSITY_VERBOSE) {
        ReportVerbosity::Verbose
    } else {
        ReportVerbosity::Default
    };

    let plot = PlotCfg {
        backend: if args.get_flag(PLOTLY) {
            ChartBackend::Plotly
        } else {
            ChartBackend::Raster
        },
        save: args.get_flag(SAVE),
    };

    let failure_policy = if args.get_flag(KEEP_GOING) {
        FailurePolicy::BestEffort
    } else {
        FailurePolicy::FailFast
    };

    let scale = match program {
        Program::Bubbles => *args
            .get_one::<f64>(SCALE)
            .unwrap_or(&DEFAULT_SCALE_PX_PER_MM),
        Program::Front => DEFAULT_SCALE_PX_PER_MM,
    };

    Ok(AppCfg {
        program,
        input,
        reprocess: args.get_flag(REPROCESS),
        plot,
        scale,
        roi_file: args
            .get_one::<PathBuf>(ROI_FILE)
            .map(|p| absolutify_path(&cwd, p)),
        failure_policy,
        verbosity,
    })
}

fn absolutify_path(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}
