use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

use crate::error::{PyletError, Result};

/// File the submitted code is staged into.
pub const CODE_FILE_NAME: &str = "code.py";

/// Subdirectory the sandboxed code may write result files into.
pub const OUTPUT_DIR_NAME: &str = "output";

/// Per-invocation staging directory.
///
/// A uniquely named temporary directory holding the staged source file and a
/// writable `output` subdirectory. The directory is exclusively owned by one
/// invocation; names never collide across concurrent calls. Deletion is
/// guaranteed on every exit path: `close()` on the normal path, `Drop` as
/// the backstop when an invocation errors or panics mid-flight.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a fresh workspace under `parent` and stage `code` into it.
    pub fn stage(parent: &Path, code: &str) -> Result<Self> {
        std::fs::create_dir_all(parent)
            .map_err(|e| PyletError::WorkspaceSetup(format!("{}: {}", parent.display(), e)))?;

        let dir = tempfile::Builder::new()
            .prefix("pylet-")
            .tempdir_in(parent)
            .map_err(|e| PyletError::WorkspaceSetup(e.to_string()))?;

        std::fs::create_dir(dir.path().join(OUTPUT_DIR_NAME))
            .map_err(|e| PyletError::WorkspaceSetup(e.to_string()))?;
        std::fs::write(dir.path().join(CODE_FILE_NAME), code)
            .map_err(|e| PyletError::WorkspaceSetup(e.to_string()))?;

        debug!(workspace = %dir.path().display(), "Staged execution workspace");

        Ok(Self { dir })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn code_file(&self) -> PathBuf {
        self.dir.path().join(CODE_FILE_NAME)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.dir.path().join(OUTPUT_DIR_NAME)
    }

    /// Delete the workspace recursively, reporting any error.
    pub fn close(self) -> Result<()> {
        let path = self.dir.path().to_path_buf();
        debug!(workspace = %path.display(), "Removing execution workspace");
        self.dir.close().map_err(PyletError::Io)
    }
}
