use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Main configuration for the Backdrop-Compositor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP listener settings
    pub server: ServerConfig,

    /// Scratch and result storage
    pub storage: StorageConfig,

    /// External video tooling and frame processing
    pub video: VideoConfig,

    /// Final output encoding preset
    pub encoding: EncodingConfig,

    /// Face detection / segmentation backend
    pub vision: VisionConfig,

    /// Result thumbnails
    pub thumbnail: ThumbnailConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let config: Config = toml::from_str(&content)
            .map_err(|_| ConfigError::ParseFailed { path: path.display().to_string() })?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::InvalidValue {
                key: "config".to_string(),
                value: e.to_string()
            })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        self.video.validate()?;
        self.encoding.validate()?;
        self.thumbnail.validate()?;
        Ok(())
    }
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allow cross-origin requests from any origin
    pub cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors: true,
        }
    }
}

impl ServerConfig {
    fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "server.host".to_string(),
                value: self.host.clone()
            }.into());
        }
        Ok(())
    }
}

/// Storage layout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Single directory holding downloads, intermediates and results
    pub scratch_dir: PathBuf,

    /// Leave downloads and intermediate streams on disk after a job
    pub keep_intermediates: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            scratch_dir: PathBuf::from("temp"),
            keep_intermediates: false,
        }
    }
}

/// Video tooling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,

    /// Threads used for per-frame filter and composite work
    pub processing_threads: usize,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            processing_threads: num_cpus::get(),
        }
    }
}

impl VideoConfig {
    fn validate(&self) -> Result<()> {
        if self.processing_threads == 0 {
            return Err(ConfigError::InvalidValue {
                key: "video.processing_threads".to_string(),
                value: self.processing_threads.to_string()
            }.into());
        }
        Ok(())
    }
}

/// Encoding preset for the final output and the intermediate stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodingConfig {
    pub video_codec: String,
    pub audio_codec: String,

    /// Constant rate factor (0-51, lower is better)
    pub crf: u8,

    pub preset: String,
    pub pixel_format: String,

    /// Move the moov atom to the front for progressive playback
    pub faststart: bool,

    /// Codec and tag of the video-only intermediate stream
    pub intermediate_codec: String,
    pub intermediate_tag: String,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            crf: 20,
            preset: "veryfast".to_string(),
            pixel_format: "yuv420p".to_string(),
            faststart: true,
            intermediate_codec: "mpeg4".to_string(),
            intermediate_tag: "mp4v".to_string(),
        }
    }
}

impl EncodingConfig {
    fn validate(&self) -> Result<()> {
        if self.crf > 51 {
            return Err(ConfigError::InvalidValue {
                key: "encoding.crf".to_string(),
                value: self.crf.to_string()
            }.into());
        }

        for (key, value) in [
            ("encoding.video_codec", &self.video_codec),
            ("encoding.audio_codec", &self.audio_codec),
            ("encoding.preset", &self.preset),
            ("encoding.pixel_format", &self.pixel_format),
            ("encoding.intermediate_codec", &self.intermediate_codec),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: value.clone()
                }.into());
            }
        }

        Ok(())
    }
}

/// Which vision backend to construct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisionBackend {
    #[default]
    None,
    OpenCv,
}

/// Vision backend configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    pub backend: VisionBackend,

    /// Haar cascade XML for the OpenCV backend
    pub cascade_path: Option<PathBuf>,
}

/// Thumbnail configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailConfig {
    pub enabled: bool,
    pub width: u32,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            width: 320,
        }
    }
}

impl ThumbnailConfig {
    fn validate(&self) -> Result<()> {
        if self.enabled && (self.width < 2 || self.width % 2 != 0) {
            return Err(ConfigError::InvalidValue {
                key: "thumbnail.width".to_string(),
                value: self.width.to_string()
            }.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test_config.toml");

        let mut original_config = Config::default();
        original_config.server.port = 9090;
        original_config.encoding.crf = 23;

        original_config.save_to_file(&file_path).unwrap();
        let loaded_config = Config::from_file(&file_path).unwrap();

        assert_eq!(loaded_config.server.port, 9090);
        assert_eq!(loaded_config.encoding, original_config.encoding);
        assert_eq!(loaded_config.vision.backend, VisionBackend::None);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("partial.toml");
        std::fs::write(&file_path, "[vision]\nbackend = \"opencv\"\n\n[storage]\nscratch_dir = \"/data\"\n").unwrap();

        let config = Config::from_file(&file_path).unwrap();
        assert_eq!(config.vision.backend, VisionBackend::OpenCv);
        assert_eq!(config.storage.scratch_dir, PathBuf::from("/data"));
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.encoding.preset, "veryfast");
    }

    #[test]
    fn test_missing_file() {
        assert!(Config::from_file("/definitely/not/here.toml").is_err());
    }

    #[test]
    fn test_invalid_crf() {
        let mut config = Config::default();
        config.encoding.crf = 60;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_thumbnail_width() {
        let mut config = Config::default();
        config.thumbnail.width = 321;
        assert!(config.validate().is_err());
        config.thumbnail.enabled = false;
        assert!(config.validate().is_ok());
    }
}
