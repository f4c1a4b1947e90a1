use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{info, warn};

use crate::config::EncodingConfig;
use crate::error::{Result, VideoError};
use crate::video::tools::run_to_completion;

/// One final-output encode: a video track, an optional audio track and the
/// codec preset to apply
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeRequest {
    pub video_track: PathBuf,
    pub audio_track: Option<PathBuf>,
    pub output: PathBuf,
    pub params: EncodingConfig,
}

impl EncodeRequest {
    /// ffmpeg arguments for this request, output path last
    pub fn ffmpeg_args(&self) -> Vec<String> {
        let p = &self.params;
        let mut args: Vec<String> = vec!["-nostdin".into(), "-y".into(), "-v".into(), "error".into()];

        args.push("-i".into());
        args.push(self.video_track.display().to_string());
        if let Some(audio) = &self.audio_track {
            args.push("-i".into());
            args.push(audio.display().to_string());
        }

        args.extend(["-map".into(), "0:v:0".into()]);
        if self.audio_track.is_some() {
            args.extend(["-map".into(), "1:a:0".into()]);
        }

        args.extend([
            "-c:v".into(),
            p.video_codec.clone(),
            "-preset".into(),
            p.preset.clone(),
            "-crf".into(),
            p.crf.to_string(),
            "-pix_fmt".into(),
            p.pixel_format.clone(),
        ]);

        if self.audio_track.is_some() {
            args.extend(["-c:a".into(), p.audio_codec.clone()]);
        } else {
            args.push("-an".into());
        }

        if p.faststart {
            args.extend(["-movflags".into(), "+faststart".into()]);
        }

        // output container follows the final name, not the scratch suffix
        args.extend(["-f".into(), "mp4".into()]);
        args.push(self.output.display().to_string());
        args
    }
}

/// Encodes a video track (plus optional audio) into a finished container
pub trait Transcoder: Send + Sync {
    fn encode(&self, request: &EncodeRequest) -> Result<()>;
}

/// Transcoder backed by the ffmpeg CLI
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    ffmpeg: PathBuf,
}

impl FfmpegTranscoder {
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self { ffmpeg: ffmpeg.into() }
    }
}

impl Transcoder for FfmpegTranscoder {
    fn encode(&self, request: &EncodeRequest) -> Result<()> {
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.args(request.ffmpeg_args());

        run_to_completion(cmd).map_err(|reason| VideoError::EncodeFailed { reason })?;
        Ok(())
    }
}

/// Joins the filtered video track with the source audio and publishes the
/// result under its final name
pub struct RemuxStage<'a> {
    transcoder: &'a dyn Transcoder,
    params: EncodingConfig,
}

impl<'a> RemuxStage<'a> {
    pub fn new(transcoder: &'a dyn Transcoder, params: EncodingConfig) -> Self {
        Self { transcoder, params }
    }

    /// Encode into `scratch`, then rename over `output`. A failed encode
    /// leaves nothing under the final name.
    pub fn run(&self, video_track: &Path, source: &Path, has_audio: bool, scratch: &Path, output: &Path) -> Result<()> {
        let request = EncodeRequest {
            video_track: video_track.to_path_buf(),
            audio_track: has_audio.then(|| source.to_path_buf()),
            output: scratch.to_path_buf(),
            params: self.params.clone(),
        };

        if !has_audio {
            info!("Source has no audio track, producing a video-only result");
        }

        if let Err(e) = self.transcoder.encode(&request) {
            remove_if_present(scratch);
            return Err(e);
        }

        if let Err(e) = std::fs::rename(scratch, output) {
            remove_if_present(scratch);
            return Err(VideoError::EncodeFailed {
                reason: format!("failed to publish {}: {}", output.display(), e),
            }
            .into());
        }

        info!("Remuxed result written to {}", output.display());
        Ok(())
    }
}

fn remove_if_present(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}
