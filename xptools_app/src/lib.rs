#![allow(clippy::let_and_return)]
#![allow(clippy::len_without_is_empty)]
#![warn(clippy::cast_lossless)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]

//! The `analyze_front` and `analyze_bubbles` programs. Each binary is a thin wrapper around
//! [`run_app`].

#[macro_use]
extern crate log;

mod app;

pub use app::{run_app, Program};
