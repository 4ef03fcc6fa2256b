//! Per-run scratch space

use std::fs;
use std::path::{Path, PathBuf};

use agriboundary_core::error::Result;
use tempfile::TempDir;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Scratch directory and identifier owned by one pipeline run.
///
/// The directory and everything written into it is removed when the context
/// is closed or dropped, whichever exit path the run takes.
#[derive(Debug)]
pub struct RunContext {
    id: Uuid,
    dir: Option<TempDir>,
    path: PathBuf,
}

impl RunContext {
    /// Create `run-*` under `scratch_root`, creating the root if needed
    pub fn create(scratch_root: &Path) -> Result<Self> {
        fs::create_dir_all(scratch_root)?;
        let dir = tempfile::Builder::new().prefix("run-").tempdir_in(scratch_root)?;
        let id = Uuid::new_v4();
        let path = dir.path().to_path_buf();
        info!(run_id = %id, path = %path.display(), "Created run scratch directory");
        Ok(Self { id, dir: Some(dir), path })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write an uploaded file into the scratch directory as `upload.<extension>`
    pub fn stage_upload(&self, bytes: &[u8], extension: &str) -> Result<PathBuf> {
        let path = self.path.join(format!("upload.{}", extension));
        fs::write(&path, bytes)?;
        debug!(path = %path.display(), bytes = bytes.len(), "Staged upload");
        Ok(path)
    }

    /// Remove the scratch directory now, reporting failures
    pub fn close(mut self) -> Result<()> {
        if let Some(dir) = self.dir.take() {
            dir.close()?;
            debug!(run_id = %self.id, "Removed run scratch directory");
        }
        Ok(())
    }
}

impl Drop for RunContext {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            if let Err(e) = dir.close() {
                warn!(run_id = %self.id, error = %e, "Failed to remove run scratch directory");
            } else {
                debug!(run_id = %self.id, "Removed run scratch directory");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_removes_directory() {
        let root = tempfile::tempdir().unwrap();
        let ctx = RunContext::create(root.path()).unwrap();
        let staged = ctx.stage_upload(b"<kml/>", "kml").unwrap();
        assert!(staged.exists());
        assert!(ctx.path().file_name().unwrap().to_string_lossy().starts_with("run-"));

        let path = ctx.path().to_path_buf();
        ctx.close().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_drop_removes_directory() {
        let root = tempfile::tempdir().unwrap();
        let path = {
            let ctx = RunContext::create(root.path()).unwrap();
            ctx.stage_upload(b"{}", "geojson").unwrap();
            ctx.path().to_path_buf()
        };
        assert!(!path.exists());
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_missing_root_is_created() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("a").join("b");
        let ctx = RunContext::create(&nested).unwrap();
        assert!(ctx.path().starts_with(&nested));
        assert_ne!(ctx.id(), RunContext::create(&nested).unwrap().id());
    }
}
