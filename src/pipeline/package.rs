use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::workspace::RunWorkspace;
use crate::chat::FileUpload;

#[derive(Debug, thiserror::Error)]
pub enum PackagingError {
    #[error("no running configs were collected")]
    Empty,

    #[error("archive I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("archive write failed: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("packaging task failed: {0}")]
    Task(String),
}

/// Zip of collected running configs, stored in the run workspace
#[derive(Debug, Clone)]
pub struct Artifact {
    pub path: PathBuf,
    pub file_count: usize,
}

impl Artifact {
    pub const CONTENT_TYPE: &'static str = "application/x-zip-compressed";

    pub async fn to_upload(&self) -> io::Result<FileUpload> {
        Ok(FileUpload {
            filename: RunWorkspace::ARCHIVE_NAME.to_string(),
            content_type: Self::CONTENT_TYPE.to_string(),
            bytes: tokio::fs::read(&self.path).await?,
        })
    }
}

#[derive(Debug)]
pub enum Packaged {
    Artifact(Artifact),
    NoArtifact,
}

/// Archive every snapshot in the workspace.
/// Never fails: an empty workspace or any archiving error gives `NoArtifact`.
pub async fn package(workspace: &RunWorkspace) -> Packaged {
    let files = match workspace.snapshot_files() {
        Ok(files) => files,
        Err(e) => {
            tracing::warn!("Could not list snapshots in {}: {}", workspace.path().display(), e);
            return Packaged::NoArtifact;
        }
    };
    let archive_path = workspace.archive_path();

    let target = archive_path.clone();
    let built = tokio::task::spawn_blocking(move || build_archive(&files, &target))
        .await
        .map_err(|e| PackagingError::Task(e.to_string()))
        .and_then(|r| r);

    match built {
        Ok(file_count) => {
            tracing::info!("Packaged {} running configs into {}", file_count, archive_path.display());
            Packaged::Artifact(Artifact {
                path: archive_path,
                file_count,
            })
        }
        Err(PackagingError::Empty) => Packaged::NoArtifact,
        Err(e) => {
            tracing::warn!("Packaging running configs failed: {}", e);
            let _ = std::fs::remove_file(&archive_path);
            Packaged::NoArtifact
        }
    }
}

fn build_archive(files: &[PathBuf], archive_path: &Path) -> Result<usize, PackagingError> {
    if files.is_empty() {
        return Err(PackagingError::Empty);
    }

    let mut zip = ZipWriter::new(File::create(archive_path)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for file in files {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "snapshot without a file name"))?;
        zip.start_file(name, options)?;
        zip.write_all(&std::fs::read(file)?)?;
    }
    zip.finish()?;
    Ok(files.len())
}
