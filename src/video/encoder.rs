use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::JoinHandle;

use tracing::{debug, warn};

use crate::config::EncodingConfig;
use crate::error::{Result, VideoError};
use crate::video::types::{Frame, StreamDescriptor};

/// Consumer of processed frames
pub trait FrameSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()>;

    /// Flush and close the output; no frames may be written afterwards
    fn finish(&mut self) -> Result<()>;
}

/// Writes a video-only intermediate stream by piping raw RGB into ffmpeg
pub struct FfmpegEncoder {
    descriptor: StreamDescriptor,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_reader: Option<JoinHandle<String>>,
    frames_written: u64,
    output: PathBuf,
}

impl FfmpegEncoder {
    pub fn create(ffmpeg: &Path, output: &Path, descriptor: StreamDescriptor, encoding: &EncodingConfig) -> Result<Self> {
        let mut cmd = Command::new(ffmpeg);
        cmd.args(["-nostdin", "-y", "-v", "error", "-f", "rawvideo", "-pix_fmt", "rgb24"])
            .arg("-s")
            .arg(format!("{}x{}", descriptor.width, descriptor.height))
            .arg("-r")
            .arg(descriptor.frame_rate.to_string())
            .args(["-i", "-", "-an", "-c:v", &encoding.intermediate_codec]);
        if !encoding.intermediate_tag.is_empty() {
            cmd.args(["-tag:v", &encoding.intermediate_tag]);
        }
        cmd.args(["-q:v", "2"]).arg(output);

        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_error(ffmpeg, e))?;

        let stdin = child.stdin.take();
        let stderr_reader = child.stderr.take().map(|mut stderr| {
            std::thread::spawn(move || {
                let mut text = String::new();
                let _ = stderr.read_to_string(&mut text);
                text
            })
        });

        debug!("Encoding intermediate stream to {}", output.display());

        Ok(Self {
            descriptor,
            child: Some(child),
            stdin,
            stderr_reader,
            frames_written: 0,
            output: output.to_path_buf(),
        })
    }

    fn encoder_error(&mut self, context: &str) -> VideoError {
        self.stdin = None;
        if let Some(mut child) = self.child.take() {
            let _ = child.wait();
        }
        let stderr = self
            .stderr_reader
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();
        VideoError::EncodeFailed {
            reason: format!("{}: {}", context, stderr.trim()),
        }
    }
}

impl FrameSink for FfmpegEncoder {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        if frame.width() != self.descriptor.width || frame.height() != self.descriptor.height {
            return Err(VideoError::DimensionMismatch {
                expected_width: self.descriptor.width,
                expected_height: self.descriptor.height,
                actual_width: frame.width(),
                actual_height: frame.height(),
            }
            .into());
        }

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(VideoError::EncodeFailed {
                reason: "encoder already finished".to_string(),
            }
            .into());
        };

        if let Err(e) = stdin.write_all(frame.as_rgb_bytes()) {
            let context = format!("write of frame {} failed ({})", self.frames_written, e);
            return Err(self.encoder_error(&context).into());
        }
        self.frames_written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        // closing stdin signals end of stream
        self.stdin = None;
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        let status = child.wait().map_err(|e| VideoError::EncodeFailed {
            reason: format!("failed to wait for encoder: {}", e),
        })?;
        let stderr = self
            .stderr_reader
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        if !status.success() {
            return Err(VideoError::EncodeFailed {
                reason: format!("encoder exited with {}: {}", status, stderr.trim()),
            }
            .into());
        }

        debug!("Wrote {} frames to {}", self.frames_written, self.output.display());
        Ok(())
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        self.stdin = None;
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                warn!("Failed to stop encoder process: {}", e);
            }
            let _ = child.wait();
        }
    }
}

fn spawn_error(ffmpeg: &Path, e: std::io::Error) -> VideoError {
    if e.kind() == ErrorKind::NotFound {
        VideoError::ToolUnavailable {
            tool: ffmpeg.display().to_string(),
        }
    } else {
        VideoError::EncodeFailed {
            reason: format!("failed to spawn {}: {}", ffmpeg.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::types::FrameRate;

    #[test]
    fn test_missing_binary_fails_to_create() {
        let descriptor = StreamDescriptor {
            width: 4,
            height: 4,
            frame_rate: FrameRate::new(30, 1),
            has_audio: false,
        };
        let result = FfmpegEncoder::create(
            Path::new("/nonexistent/ffmpeg"),
            Path::new("out.mp4"),
            descriptor,
            &EncodingConfig::default(),
        );
        assert!(matches!(
            result,
            Err(crate::error::CompositorError::Video(VideoError::ToolUnavailable { .. }))
        ));
    }
}
