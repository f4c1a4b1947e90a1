use thiserror::Error;

/// Main error type for the Backdrop-Compositor library
#[derive(Error, Debug)]
pub enum CompositorError {
    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Video processing error: {0}")]
    Video(#[from] VideoError),

    #[error("Vision error: {0}")]
    Vision(#[from] VisionError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

/// Errors surfaced synchronously to callers of the job manager
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("Invalid filter type: {name}")]
    InvalidFilter { name: String },

    #[error("video_url is required")]
    MissingSource,

    #[error("Unsupported video_url '{source_url}': only http and https sources are accepted")]
    UnsupportedSource { source_url: String },

    #[error("Job not found: {id}")]
    JobNotFound { id: String },

    #[error("Job {id} cannot move from {from} to {to}")]
    InvalidTransition { id: String, from: String, to: String },
}

/// Video-specific errors
#[derive(Error, Debug)]
pub enum VideoError {
    #[error("Failed to fetch video from {source_url}: {reason}")]
    FetchFailed { source_url: String, reason: String },

    #[error("Failed to probe video file {path}: {reason}")]
    ProbeFailed { path: String, reason: String },

    #[error("Video decoding failed: {reason}")]
    DecodeFailed { reason: String },

    #[error("Video encoding failed: {reason}")]
    EncodeFailed { reason: String },

    #[error("Dimension mismatch: expected {expected_width}x{expected_height}, got {actual_width}x{actual_height}")]
    DimensionMismatch {
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    #[error("External tool not available: {tool}")]
    ToolUnavailable { tool: String },
}

/// Errors raised by the vision oracle or the mask estimator around it
#[derive(Error, Debug)]
pub enum VisionError {
    #[error("Face detection failed: {reason}")]
    DetectionFailed { reason: String },

    #[error("Segmentation failed: {reason}")]
    SegmentationFailed { reason: String },

    #[error("Vision backend unavailable: {backend}")]
    BackendUnavailable { backend: String },

    #[error("Segmentation output is {actual_width}x{actual_height}, seed map is {expected_width}x{expected_height}")]
    SeedMapMismatch {
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path}")]
    ParseFailed { path: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Convenience type alias for Results using CompositorError
pub type Result<T> = std::result::Result<T, CompositorError>;

impl CompositorError {
    /// Create a generic error with a custom message
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }

    /// Whether this error should be reported to an HTTP client as its own fault
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Job(JobError::InvalidFilter { .. })
                | Self::Job(JobError::MissingSource)
                | Self::Job(JobError::UnsupportedSource { .. })
                | Self::Job(JobError::JobNotFound { .. })
        )
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Job(JobError::InvalidFilter { name }) => {
                format!(
                    "Filter '{}' not found. Available filters: {}",
                    name,
                    crate::filters::FilterKind::available().join(", ")
                )
            }
            Self::Job(err) => err.to_string(),
            Self::Video(VideoError::FetchFailed { source_url, reason }) => {
                format!("Could not download video '{}': {}", source_url, reason)
            }
            Self::Video(VideoError::DecodeFailed { reason }) => {
                format!("Could not read the source video: {}", reason)
            }
            Self::Video(VideoError::EncodeFailed { reason }) => {
                format!("Could not write the output video: {}", reason)
            }
            Self::Vision(VisionError::SegmentationFailed { reason }) => {
                format!("Could not separate the subject from the background: {}", reason)
            }
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors() {
        let invalid: CompositorError = JobError::InvalidFilter { name: "blur".into() }.into();
        assert!(invalid.is_client_error());
        assert!(invalid.user_message().contains("grayscale"));

        let local: CompositorError = JobError::UnsupportedSource { source_url: "/etc/passwd".into() }.into();
        assert!(local.is_client_error());
        assert!(local.user_message().contains("http"));

        let encode: CompositorError = VideoError::EncodeFailed { reason: "boom".into() }.into();
        assert!(!encode.is_client_error());
        assert!(encode.user_message().contains("boom"));
    }
}
