use std::io::Cursor;
use std::path::{Path, PathBuf};
use zip::ZipArchive;

use crate::chat::{fetch_first_attachment, AttachmentError, ChatApi, ChatMessage};

/// Content types accepted for `/upload`
pub const ARCHIVE_TYPES: &[&str] = &["application/x-zip-compressed", "application/zip"];

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error(transparent)]
    Attachment(#[from] AttachmentError),

    #[error("invalid zip archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("archive entry '{0}' escapes the target directory")]
    UnsafePath(String),

    #[error("extraction failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("extraction task failed: {0}")]
    Task(String),
}

/// Fetch the zip attached to `message` and unpack it into `target`.
/// The content type is checked before anything is written; returns the
/// number of archive entries.
pub async fn receive_archive(
    chat: &dyn ChatApi,
    message: &ChatMessage,
    target: &Path,
) -> Result<usize, UploadError> {
    let attachment = fetch_first_attachment(chat, message, ARCHIVE_TYPES).await?;

    let target: PathBuf = target.to_path_buf();
    let entries = tokio::task::spawn_blocking(move || extract(attachment.bytes, &target))
        .await
        .map_err(|e| UploadError::Task(e.to_string()))??;

    tracing::info!("Extracted {} archive entries", entries);
    Ok(entries)
}

fn extract(bytes: Vec<u8>, target: &Path) -> Result<usize, UploadError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    for i in 0..archive.len() {
        let entry = archive.by_index(i)?;
        if entry.enclosed_name().is_none() {
            return Err(UploadError::UnsafePath(entry.name().to_string()));
        }
    }

    std::fs::create_dir_all(target)?;
    archive.extract(target)?;
    Ok(archive.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeChat;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    const URL: &str = "https://files.example.com/configs";

    fn zip_of(files: &[(&str, &str)]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in files {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    fn message() -> ChatMessage {
        ChatMessage {
            id: "M1".to_string(),
            room_id: "R1".to_string(),
            files: vec![URL.to_string()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_receive_archive_extracts() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("configs");
        let chat = FakeChat::new().with_attachment(
            URL,
            "application/x-zip-compressed",
            &zip_of(&[("sw-a.txt", "vlan 10\n"), ("sw-b.txt", "vlan 20\n")]),
        );

        let count = receive_archive(&chat, &message(), &target).await.unwrap();
        assert_eq!(count, 2);
        assert_eq!(std::fs::read_to_string(target.join("sw-a.txt")).unwrap(), "vlan 10\n");
    }

    #[tokio::test]
    async fn test_receive_archive_rejects_wrong_type() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("configs");
        let chat = FakeChat::new().with_attachment(URL, "text/plain", b"sw-a: S1\n");

        let err = receive_archive(&chat, &message(), &target).await.unwrap_err();
        assert!(matches!(err, UploadError::Attachment(AttachmentError::WrongType { .. })));
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn test_receive_archive_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("configs");
        let chat = FakeChat::new().with_attachment(
            URL,
            "application/zip",
            &zip_of(&[("sw-a.txt", "vlan 10\n"), ("../escape.txt", "nope\n")]),
        );

        let err = receive_archive(&chat, &message(), &target).await.unwrap_err();
        assert!(matches!(err, UploadError::UnsafePath(_)));
        assert!(!target.exists());
        assert!(!dir.path().join("escape.txt").exists());
    }

    #[tokio::test]
    async fn test_receive_archive_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let chat = FakeChat::new().with_attachment(URL, "application/zip", b"not a zip");
        let err = receive_archive(&chat, &message(), dir.path()).await.unwrap_err();
        assert!(matches!(err, UploadError::Archive(_)));
    }
}
