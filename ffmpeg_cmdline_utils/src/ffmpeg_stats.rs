use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::ffmpeg_ops::get_video_stats;
use crate::*;

#[derive(Debug, Deserialize, Serialize, Clone, Error)]
pub enum VideoInfoError {
    #[error("Error parsing stats: {0}")]
    JsonError(String),
    #[error("Error parsing stats: {0}")]
    ParseIntError(String),
    #[error("Error parsing stats: {0}")]
    ParseFloatError(String),
    #[error("Unexpected video rotation: {0}")]
    Rotation(String),
}

impl From<serde_json::Error> for VideoInfoError {
    fn from(e: serde_json::Error) -> Self {
        //limit maximum number of characters
        let error_string = format!("{e}").chars().take(500).collect::<String>();
        VideoInfoError::JsonError(error_string)
    }
}

impl From<std::num::ParseIntError> for VideoInfoError {
    fn from(e: std::num::ParseIntError) -> Self {
        VideoInfoError::ParseIntError(format!("{e}"))
    }
}

impl From<std::num::ParseFloatError> for VideoInfoError {
    fn from(e: std::num::ParseFloatError) -> Self {
        VideoInfoError::ParseFloatError(format!("{e}"))
    }
}

/// The subset of ffprobe's report needed to read raw frames out of a video.
#[derive(PartialEq, Eq, Clone, Debug, Serialize, Deserialize, Default)]
pub struct VideoInfo {
    duration: std::time::Duration,
    resolution: (u32, u32),
    frame_count: Option<u64>,
}

impl VideoInfo {
    /// Use ffprobe to get the duration, resolution and declared frame count of the first
    /// video stream of a file.
    ///
    /// # errors
    /// * The file cannot be read or is not recognized by ffprobe
    /// * The output from ffprobe could not be parsed as JSON
    pub fn new<P>(src_path: P) -> Result<Self, FfmpegError>
    where
        P: AsRef<Path>,
    {
        let stats_string = get_video_stats(&src_path)?;
        Ok(Self::from_ffprobe_json(&stats_string)?)
    }

    pub(crate) fn from_ffprobe_json(stats_string: &str) -> Result<Self, VideoInfoError> {
        let stats_parsed: Value = serde_json::from_str(stats_string)?;
        let first_video = Self::first_video(&stats_parsed);

        let duration = match &stats_parsed["format"]["duration"] {
            Value::String(d) => std::time::Duration::from_secs_f64(d.parse::<f64>()?.max(0.0)),
            _ => std::time::Duration::ZERO,
        };

        let frame_count = match first_video.map(|v| &v["nb_frames"]) {
            Some(Value::String(n)) => Some(n.parse::<u64>()?),
            _ => None,
        };

        let width = first_video.and_then(|v| v["width"].as_u64()).unwrap_or(0) as u32;
        let height = first_video.and_then(|v| v["height"].as_u64()).unwrap_or(0) as u32;

        // ffmpeg autorotates frames when the metadata declares a rotation, so the reported
        // width and height must be swapped for quarter turns.
        let resolution = if Self::quarter_turned(first_video)? {
            (height, width)
        } else {
            (width, height)
        };

        Ok(VideoInfo {
            duration,
            resolution,
            frame_count,
        })
    }

    /// The duration of the video
    pub fn duration(&self) -> std::time::Duration {
        self.duration
    }

    /// The resolution of frames as ffmpeg will output them (width, height).
    pub fn resolution(&self) -> (u32, u32) {
        self.resolution
    }

    /// The number of frames declared in the container, when the container declares one.
    pub fn frame_count(&self) -> Option<u64> {
        self.frame_count
    }

    fn quarter_turned(first_video: Option<&Value>) -> Result<bool, VideoInfoError> {
        let rotation = first_video.and_then(|stream| {
            let side_data = stream
                .get("side_data_list")
                .and_then(|list| list.get(0))
                .and_then(|entry| entry.get("rotation"));
            side_data.or_else(|| stream.get("tags").and_then(|tags| tags.get("rotate")))
        });

        //the rotation may be a JSON String or a JSON number
        let rotation = match rotation {
            None => return Ok(false),
            Some(Value::Number(val)) => val
                .as_i64()
                .ok_or_else(|| VideoInfoError::Rotation(val.to_string()))?,
            Some(Value::String(val)) => val.parse::<i64>()?,
            Some(other) => return Err(VideoInfoError::Rotation(other.to_string())),
        };

        match rotation.rem_euclid(360) {
            0 | 180 => Ok(false),
            90 | 270 => Ok(true),
            _ => Err(VideoInfoError::Rotation(rotation.to_string())),
        }
    }

    fn first_video(stats_parsed: &Value) -> Option<&Value> {
        let Value::Array(streams) = &stats_parsed["streams"] else {
            return None;
        };

        streams
            .iter()
            .find(|s| matches!(&s["codec_type"], Value::String(t) if t == "video"))
    }
}
