use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;

use tracing::{debug, warn};

use crate::error::{Result, VideoError};
use crate::video::types::{Frame, StreamDescriptor};

/// Anything that yields frames in presentation order
pub trait FrameSource {
    fn descriptor(&self) -> &StreamDescriptor;

    /// Next frame, or `None` once the stream is exhausted
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// Decodes a video file to packed RGB frames through an ffmpeg pipe
pub struct FfmpegDecoder {
    descriptor: StreamDescriptor,
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    stderr_reader: Option<JoinHandle<String>>,
    frames_read: u64,
    path: PathBuf,
}

impl FfmpegDecoder {
    pub fn open(ffmpeg: &Path, path: &Path, descriptor: StreamDescriptor) -> Result<Self> {
        let mut child = Command::new(ffmpeg)
            .args(["-nostdin", "-v", "error", "-i"])
            .arg(path)
            .args(["-map", "0:v:0", "-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_error(ffmpeg, e))?;

        let stdout = child.stdout.take();
        let stderr_reader = child.stderr.take().map(|mut stderr| {
            // keep the pipe drained so ffmpeg never blocks on diagnostics
            std::thread::spawn(move || {
                let mut text = String::new();
                let _ = stderr.read_to_string(&mut text);
                text
            })
        });

        debug!(
            "Decoding {} as {}x{} rgb24",
            path.display(),
            descriptor.width,
            descriptor.height
        );

        Ok(Self {
            descriptor,
            child: Some(child),
            stdout,
            stderr_reader,
            frames_read: 0,
            path: path.to_path_buf(),
        })
    }

    fn collect_stderr(&mut self) -> String {
        self.stderr_reader
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default()
    }

    /// Reap the child once stdout hits EOF and surface a non-zero exit
    fn finish(&mut self) -> Result<()> {
        self.stdout = None;
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        let status = child.wait().map_err(|e| VideoError::DecodeFailed {
            reason: format!("failed to wait for decoder: {}", e),
        })?;
        let stderr = self.collect_stderr();

        if !status.success() {
            return Err(VideoError::DecodeFailed {
                reason: format!("decoder for {} exited with {}: {}", self.path.display(), status, stderr.trim()),
            }
            .into());
        }

        debug!("Decoded {} frames from {}", self.frames_read, self.path.display());
        Ok(())
    }
}

/// Read exactly `buf.len()` bytes, returning how many arrived before EOF
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

impl FrameSource for FfmpegDecoder {
    fn descriptor(&self) -> &StreamDescriptor {
        &self.descriptor
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(None);
        };

        let frame_bytes = self.descriptor.frame_bytes();
        let mut buf = vec![0u8; frame_bytes];
        let filled = read_full(stdout, &mut buf).map_err(|e| VideoError::DecodeFailed {
            reason: format!("read from decoder failed: {}", e),
        })?;

        if filled == 0 {
            self.finish()?;
            return Ok(None);
        }
        if filled < frame_bytes {
            let _ = self.finish();
            return Err(VideoError::DecodeFailed {
                reason: format!(
                    "truncated frame {}: got {} of {} bytes",
                    self.frames_read, filled, frame_bytes
                ),
            }
            .into());
        }

        self.frames_read += 1;
        let frame = Frame::from_rgb_bytes(self.descriptor.width, self.descriptor.height, buf).ok_or_else(|| {
            VideoError::DecodeFailed {
                reason: "frame buffer has the wrong size".to_string(),
            }
        })?;
        Ok(Some(frame))
    }
}

impl Drop for FfmpegDecoder {
    fn drop(&mut self) {
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                warn!("Failed to stop decoder process: {}", e);
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
        VideoError::DecodeFailed {
            reason: format!("failed to spawn {}: {}", ffmpeg.display(), e),
        }
    }
}
