use std::path::Path;
use std::process::{Command, Output, Stdio};

use tracing::debug;

/// Whether the given ffmpeg-family binary can be executed
pub fn check_tool_available(tool: &Path) -> bool {
    Command::new(tool)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Run a command to completion, returning its output or a readable failure
pub fn run_to_completion(mut cmd: Command) -> std::result::Result<Output, String> {
    debug!("Running {:?}", cmd);

    let output = cmd
        .stdin(Stdio::null())
        .output()
        .map_err(|e| format!("failed to execute {:?}: {}", cmd.get_program(), e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("{} exited with {}: {}", cmd.get_program().to_string_lossy(), output.status, stderr.trim()));
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_tool_is_unavailable() {
        assert!(!check_tool_available(Path::new("/nonexistent/ffmpeg-binary")));
    }

    #[test]
    fn test_missing_tool_reports_error() {
        let err = run_to_completion(Command::new("/nonexistent/ffmpeg-binary")).unwrap_err();
        assert!(err.contains("failed to execute"));
    }
}
