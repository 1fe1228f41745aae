//! Running the decode, crop, threshold, segment and measure stages over lists of files.

pub mod batch;
pub mod bubbles;
pub mod front;
