//! Staging of code too large or awkward to inline into a request.
//!
//! The code is written to a scratch file and the request carries a one-line instruction
//! that loads it. The file lives exactly as long as the request: it is released when the
//! terminal response is dispatched, and a dropped handle still removes it.
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::TempPath;
use tracing::{debug, warn};

use crate::escape::quote;
use crate::{Error, Result};

/// Writes payloads to scratch files
#[derive(Debug, Clone)]
pub struct Stager {
    dir: PathBuf,
    suffix: String,
}

/// Handle to a staged scratch file
#[derive(Debug)]
pub struct StagedFile {
    path: TempPath,
}

impl Stager {
    pub fn new(dir: impl Into<PathBuf>, suffix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            suffix: suffix.into(),
        }
    }

    /// Directory scratch files are created in
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write trimmed `text` to a fresh scratch file.
    /// Returns the instruction that loads it, and the handle that deletes it.
    pub fn stage(&self, text: &str) -> Result<(String, StagedFile)> {
        let mut file = tempfile::Builder::new()
            .prefix("replwire-")
            .suffix(&self.suffix)
            .tempfile_in(&self.dir)
            .map_err(Error::StagingIOError)?;
        file.write_all(text.trim().as_bytes())
            .and_then(|_| file.flush())
            .map_err(Error::StagingIOError)?;

        let path = file.into_temp_path();
        debug!("staged {} bytes at {}", text.len(), path.display());
        Ok((load_instruction(&path), StagedFile { path }))
    }
}

impl Default for Stager {
    fn default() -> Self {
        Self::new(std::env::temp_dir(), ".jl")
    }
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the scratch file. Failure is logged and otherwise ignored.
    pub fn release(self) {
        let shown = self.path.display().to_string();
        match self.path.close() {
            Ok(()) => debug!("released staged file {shown}"),
            Err(e) => warn!("Failed to delete staged file {shown} - {e}"),
        }
    }
}

/// Instruction that makes the interpreter load and evaluate the file at `path`
pub fn load_instruction(path: &Path) -> String {
    format!("include({})", quote(&path.to_string_lossy()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tracing_test::traced_test;

    #[test]
    fn stage_trims_and_writes() {
        let dir = tempfile::tempdir().unwrap();
        let stager = Stager::new(dir.path(), ".jl");

        let (loader, staged) = stager.stage("  x = 1\ny = 2  ").unwrap();

        assert!(staged.path().exists(), "staged file should exist after stage");
        assert_eq!(staged.path().parent(), Some(dir.path()));
        assert_eq!(
            std::fs::read_to_string(staged.path()).unwrap(),
            "x = 1\ny = 2"
        );
        assert_eq!(loader, load_instruction(staged.path()));
        assert!(loader.contains(&*staged.path().to_string_lossy()));
    }

    #[test]
    fn stage_unique_names() {
        let dir = tempfile::tempdir().unwrap();
        let stager = Stager::new(dir.path(), ".jl");
        let (_, a) = stager.stage("a").unwrap();
        let (_, b) = stager.stage("a").unwrap();
        assert_ne!(a.path(), b.path());
        assert!(a.path().to_string_lossy().ends_with(".jl"));
    }

    #[test]
    fn release_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let (_, staged) = Stager::new(dir.path(), ".jl").stage("1").unwrap();
        let path = staged.path().to_path_buf();

        staged.release();

        assert!(!path.exists(), "staged file should be gone after release");
    }

    #[test]
    fn drop_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let (_, staged) = Stager::new(dir.path(), ".jl").stage("1").unwrap();
        let path = staged.path().to_path_buf();

        drop(staged);

        assert!(!path.exists(), "unreleased staged file should be gone on drop");
    }

    #[test]
    #[traced_test]
    fn release_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let (_, staged) = Stager::new(dir.path(), ".jl").stage("1").unwrap();
        std::fs::remove_file(staged.path()).unwrap();

        staged.release();

        assert!(logs_contain("Failed to delete staged file"));
    }

    #[test]
    fn stage_fails_without_dir() {
        let dir = tempfile::tempdir().unwrap();
        let stager = Stager::new(dir.path().join("missing"), ".jl");
        assert_matches!(stager.stage("1"), Err(Error::StagingIOError(_)));
    }

    #[test]
    fn load_instruction_escapes_path() {
        assert_eq!(
            load_instruction(Path::new("/tmp/a \"b\"$.jl")),
            r#"include("/tmp/a \"b\"\$.jl")"#
        );
    }
}
