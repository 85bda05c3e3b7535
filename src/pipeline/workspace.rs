use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Scratch space for one `/config` run: running-config snapshots plus the
/// archive built from them. Removed from disk when dropped, whichever way
/// the run ends.
#[derive(Debug)]
pub struct RunWorkspace {
    dir: TempDir,
    snapshots: PathBuf,
}

impl RunWorkspace {
    pub const ARCHIVE_NAME: &'static str = "running_configs.zip";

    /// Create a uniquely named workspace under `parent`
    pub fn create(parent: &Path, run_id: &str) -> io::Result<Self> {
        std::fs::create_dir_all(parent)?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("run-{}-", run_id))
            .tempdir_in(parent)?;
        let snapshots = dir.path().join("snapshots");
        std::fs::create_dir(&snapshots)?;
        Ok(Self { dir, snapshots })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Where a device's running config is written
    pub fn snapshot_path(&self, hostname: &str) -> PathBuf {
        self.snapshots.join(format!("{}_running.txt", hostname))
    }

    pub fn archive_path(&self) -> PathBuf {
        self.dir.path().join(Self::ARCHIVE_NAME)
    }

    /// Snapshot files currently present, sorted by name
    pub fn snapshot_files(&self) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.snapshots)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }
}

#[cfg(test)]
impl RunWorkspace {
    pub fn snapshot_dir(&self) -> &Path {
        &self.snapshots
    }
}
