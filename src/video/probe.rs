use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Deserialize;
use tracing::info;

use crate::error::{Result, VideoError};
use crate::video::tools::run_to_completion;
use crate::video::types::{FrameRate, StreamDescriptor};

/// Reads stream properties with ffprobe
#[derive(Debug, Clone)]
pub struct VideoProbe {
    ffprobe: PathBuf,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    #[serde(default)]
    side_data_list: Vec<ProbeSideData>,
    #[serde(default)]
    tags: ProbeTags,
}

#[derive(Debug, Deserialize)]
struct ProbeSideData {
    rotation: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeTags {
    rotate: Option<String>,
}

impl ProbeStream {
    /// Display rotation in degrees, normalised to 0..360. The display matrix
    /// side data wins over the legacy `rotate` tag.
    fn rotation(&self) -> u32 {
        let degrees = self
            .side_data_list
            .iter()
            .find_map(|side| side.rotation)
            .or_else(|| self.tags.rotate.as_deref().and_then(|r| r.trim().parse::<f64>().ok()))
            .unwrap_or(0.0);
        (degrees.round() as i64).rem_euclid(360) as u32
    }
}

impl VideoProbe {
    pub fn new(ffprobe: impl Into<PathBuf>) -> Self {
        Self { ffprobe: ffprobe.into() }
    }

    pub fn probe(&self, path: &Path) -> Result<StreamDescriptor> {
        let mut cmd = Command::new(&self.ffprobe);
        // full stream sections carry the display matrix and rotate tag
        cmd.args(["-v", "error", "-print_format", "json", "-show_streams"]).arg(path);

        let output = run_to_completion(cmd).map_err(|reason| VideoError::ProbeFailed {
            path: path.display().to_string(),
            reason,
        })?;

        let json = String::from_utf8_lossy(&output.stdout);
        let descriptor = parse_probe_output(&json).map_err(|reason| VideoError::ProbeFailed {
            path: path.display().to_string(),
            reason,
        })?;

        info!(
            "Video metadata: {}x{} @ {} ({:.2} fps), audio: {}",
            descriptor.width,
            descriptor.height,
            descriptor.frame_rate,
            descriptor.fps(),
            descriptor.has_audio
        );
        Ok(descriptor)
    }
}

/// Build a descriptor from ffprobe's JSON: the first video stream gives size
/// and rate, any audio stream sets `has_audio`.
///
/// ffmpeg applies the display rotation while decoding, so a quarter-turn
/// swaps the reported width and height.
pub fn parse_probe_output(json: &str) -> std::result::Result<StreamDescriptor, String> {
    let output: ProbeOutput =
        serde_json::from_str(json).map_err(|e| format!("invalid ffprobe output: {}", e))?;

    let has_audio = output
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    let video = output
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| "no video stream".to_string())?;

    let (width, height) = match (video.width, video.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err("video stream has no dimensions".to_string()),
    };
    let (width, height) = match video.rotation() {
        90 | 270 => (height, width),
        _ => (width, height),
    };

    // r_frame_rate is the container's base rate; avg_frame_rate covers
    // streams where that is reported as 0/0
    let frame_rate = video
        .r_frame_rate
        .as_deref()
        .and_then(FrameRate::parse)
        .or_else(|| video.avg_frame_rate.as_deref().and_then(FrameRate::parse))
        .ok_or_else(|| "video stream has no frame rate".to_string())?;

    Ok(StreamDescriptor {
        width,
        height,
        frame_rate,
        has_audio,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_video_with_audio() {
        let json = r#"{
            "programs": [],
            "streams": [
                {"codec_type": "video", "width": 1280, "height": 720, "r_frame_rate": "30000/1001", "avg_frame_rate": "30000/1001"},
                {"codec_type": "audio", "r_frame_rate": "0/0", "avg_frame_rate": "0/0"}
            ]
        }"#;
        let d = parse_probe_output(json).unwrap();
        assert_eq!((d.width, d.height), (1280, 720));
        assert_eq!(d.frame_rate, FrameRate::new(30000, 1001));
        assert!(d.has_audio);
    }

    #[test]
    fn test_parse_video_only_falls_back_to_avg_rate() {
        let json = r#"{"streams": [{"codec_type": "video", "width": 64, "height": 48, "r_frame_rate": "0/0", "avg_frame_rate": "25/1"}]}"#;
        let d = parse_probe_output(json).unwrap();
        assert_eq!(d.frame_rate, FrameRate::new(25, 1));
        assert!(!d.has_audio);
    }

    #[test]
    fn test_quarter_turn_swaps_dimensions() {
        let json = r#"{"streams": [{"codec_type": "video", "width": 1920, "height": 1080, "r_frame_rate": "30/1",
            "side_data_list": [{"side_data_type": "Display Matrix", "rotation": -90}]}]}"#;
        let d = parse_probe_output(json).unwrap();
        assert_eq!((d.width, d.height), (1080, 1920));

        let json = r#"{"streams": [{"codec_type": "video", "width": 1920, "height": 1080, "r_frame_rate": "30/1",
            "tags": {"rotate": "270"}}]}"#;
        let d = parse_probe_output(json).unwrap();
        assert_eq!((d.width, d.height), (1080, 1920));
    }

    #[test]
    fn test_half_turn_keeps_dimensions() {
        let json = r#"{"streams": [{"codec_type": "video", "width": 1920, "height": 1080, "r_frame_rate": "30/1",
            "side_data_list": [{"side_data_type": "Display Matrix", "rotation": 180}]}]}"#;
        let d = parse_probe_output(json).unwrap();
        assert_eq!((d.width, d.height), (1920, 1080));
    }

    #[test]
    fn test_parse_rejects_audio_only() {
        let json = r#"{"streams": [{"codec_type": "audio"}]}"#;
        assert_eq!(parse_probe_output(json).unwrap_err(), "no video stream");
        assert!(parse_probe_output("not json").is_err());
    }
}
