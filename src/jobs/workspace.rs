use std::path::{Path, PathBuf};

use rand::Rng;
use tracing::{debug, warn};

use crate::error::Result;

/// Prefix shared by every generated scratch and job name
pub const NAME_PREFIX: &str = "temp_";

/// Subdirectory holding published results, the only part served over HTTP
pub const RESULTS_DIR: &str = "results";

const MAX_ATTEMPTS: usize = 16;

/// `temp_` followed by eight lowercase hex digits
pub fn random_name() -> String {
    let value: u32 = rand::thread_rng().gen();
    format!("{}{:08x}", NAME_PREFIX, value)
}

/// Scratch root for downloads and intermediates, with finished results in
/// its `results/` subdirectory
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn results_dir(&self) -> PathBuf {
        self.root.join(RESULTS_DIR)
    }

    pub fn ensure_exists(&self) -> Result<()> {
        std::fs::create_dir_all(self.results_dir())?;
        Ok(())
    }

    /// A path under the root that no existing file uses
    pub fn allocate(&self, extension: &str) -> PathBuf {
        let mut candidate = self.path_for(&random_name(), extension);
        for _ in 1..MAX_ATTEMPTS {
            if !candidate.exists() {
                break;
            }
            candidate = self.path_for(&random_name(), extension);
        }
        candidate
    }

    pub fn path_for(&self, base: &str, extension: &str) -> PathBuf {
        if extension.is_empty() {
            self.root.join(base)
        } else {
            self.root.join(format!("{}.{}", base, extension))
        }
    }

    /// Where a published result named `base` lives
    pub fn result_path(&self, base: &str, extension: &str) -> PathBuf {
        self.results_dir().join(format!("{}.{}", base, extension))
    }

    /// Best-effort removal of scratch files; missing files are fine
    pub fn remove_all(&self, paths: &[PathBuf]) {
        for path in paths {
            match std::fs::remove_file(path) {
                Ok(()) => debug!("Removed scratch file {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove scratch file {}: {}", path.display(), e),
            }
        }
    }
}
