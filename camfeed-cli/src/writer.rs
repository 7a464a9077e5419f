//! Snapshot file writer.
//!
//! The feeds hand over raw image bytes; this module decides where they land
//! on disk (timestamp-based naming) and writes them.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bytes::Bytes;
use chrono::Local;

/// Writes snapshot images into a target directory.
pub struct SnapshotWriter {
    dir: PathBuf,
}

impl SnapshotWriter {
    /// Create a writer targeting `dir`. The directory is created lazily on
    /// the first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Build the output path for a labelled snapshot.
    ///
    /// Names follow `{label}-{local timestamp}.jpg`.
    pub fn path_for(&self, label: &str) -> PathBuf {
        let stamp = Local::now().format("%Y%m%d-%H%M%S%.3f");
        self.dir.join(format!("{label}-{stamp}.jpg"))
    }

    /// Write one snapshot and return the path it landed at.
    pub async fn write(&self, label: &str, image: &Bytes) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create snapshot directory {:?}", self.dir))?;

        let path = self.path_for(label);
        tokio::fs::write(&path, image)
            .await
            .with_context(|| format!("failed to write snapshot to {:?}", path))?;

        Ok(path)
    }

    /// The directory this writer targets.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_for_uses_label_and_extension() {
        let writer = SnapshotWriter::new("/tmp/snaps");
        let path = writer.path_for("latest");

        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("latest-"));
        assert!(name.ends_with(".jpg"));
        assert_eq!(path.parent().unwrap(), Path::new("/tmp/snaps"));
    }

    #[tokio::test]
    async fn test_write_creates_directory_and_file() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = SnapshotWriter::new(tmp.path().join("nested"));

        let image = Bytes::from_static(b"jpeg-bytes");
        let path = writer.write("latest", &image).await.unwrap();

        let written = tokio::fs::read(&path).await.unwrap();
        assert_eq!(written, b"jpeg-bytes");
    }
}
