use std::path::Path;

use ffmpeg_cmdline_utils::GrayFrameReader;
use image::{GrayImage, ImageFormat};

use crate::{Error, XpResult};

/// Anything that can turn a media file into an ordered sequence of grayscale frames.
///
/// Implementations must be shareable between threads, as one source is used by every worker
/// of a parallel batch. Calling [`FrameSource::frames`] again with the same path starts over
/// from the first frame.
pub trait FrameSource: Sync {
    fn frames(&self, path: &Path) -> XpResult<Vec<GrayImage>>;
}

/// Decodes still images in-process with the `image` crate and everything else as video
/// through ffmpeg.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MediaDecoder;

impl FrameSource for MediaDecoder {
    fn frames(&self, path: &Path) -> XpResult<Vec<GrayImage>> {
        let frames = if is_still_image(path) {
            vec![decode_image(path)?]
        } else {
            decode_video(path)?
        };

        if frames.is_empty() {
            return Err(Error::decode(path, "file contains no frames"));
        }

        log::trace!(target: "frame_source", "Decoded {} frames from {}", frames.len(), path.display());
        Ok(frames)
    }
}

fn is_still_image(path: &Path) -> bool {
    ImageFormat::from_path(path).is_ok()
}

fn decode_image(path: &Path) -> XpResult<GrayImage> {
    let img = image::open(path).map_err(|e| Error::decode(path, e))?;
    Ok(img.to_luma8())
}

fn decode_video(path: &Path) -> XpResult<Vec<GrayImage>> {
    if !path.is_file() {
        return Err(Error::decode(path, "no such file"));
    }

    let mut frames = GrayFrameReader::new(path)
        .spawn()
        .map_err(|e| Error::decode(path, e))?;

    let decoded = frames.by_ref().collect::<Vec<_>>();
    match frames.exit_error() {
        Some(e) => Err(Error::decode(path, e)),
        None => Ok(decoded),
    }
}
