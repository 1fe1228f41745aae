mod app_cfg;
mod app_fns;
mod arg_parse;
mod charts;
mod errors;

pub(crate) use app_cfg::*;
pub(crate) use errors::*;

pub use app_cfg::Program;
pub use app_fns::run_app;
