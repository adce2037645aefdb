//! Content-addressed filesystem placement of originals and thumbnails
//! (component C3). See spec.md section 4.3.

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::errors::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Original,
    Thumb,
}

impl Kind {
    fn dir_name(self) -> &'static str {
        match self {
            Kind::Original => "original",
            Kind::Thumb => "thumb",
        }
    }
}

#[derive(Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// `<root>/<kind>/<hash[0:2]>/<hash[2:4]>/<hash>[.<ext>]`.
    #[must_use]
    pub fn path_for(&self, content_hash: &str, kind: Kind, ext: Option<&str>) -> PathBuf {
        let mut path = self.root.join(kind.dir_name());
        path.push(&content_hash[0..2]);
        path.push(&content_hash[2..4]);
        let filename = match ext {
            Some(ext) if !ext.is_empty() => format!("{content_hash}.{ext}"),
            _ => content_hash.to_string(),
        };
        path.push(filename);
        path
    }

    /// Writes `bytes` to the content-addressed path for `content_hash`,
    /// atomically (temp file + rename) and idempotently: if the final path
    /// already exists, the write is skipped and the existing path is
    /// returned unchanged.
    ///
    /// # Errors
    /// Returns `CoreError::Transient` on any filesystem failure.
    pub async fn write(
        &self,
        content_hash: &str,
        kind: Kind,
        ext: Option<&str>,
        bytes: &[u8],
    ) -> Result<PathBuf, CoreError> {
        let final_path = self.path_for(content_hash, kind, ext);

        if fs::try_exists(&final_path)
            .await
            .map_err(|e| CoreError::Transient(e.to_string()))?
        {
            debug!("storage write skipped, already present: {:?}", final_path);
            return Ok(final_path);
        }

        let parent = final_path
            .parent()
            .ok_or_else(|| CoreError::Transient("storage path has no parent".into()))?;
        fs::create_dir_all(parent)
            .await
            .map_err(|e| CoreError::Transient(e.to_string()))?;

        let tmp_path = parent.join(format!(".{}.tmp", uuid::Uuid::new_v4()));
        {
            let mut tmp_file = fs::File::create(&tmp_path)
                .await
                .map_err(|e| CoreError::Transient(e.to_string()))?;
            tmp_file
                .write_all(bytes)
                .await
                .map_err(|e| CoreError::Transient(e.to_string()))?;
            tmp_file
                .sync_all()
                .await
                .map_err(|e| CoreError::Transient(e.to_string()))?;
        }

        match fs::rename(&tmp_path, &final_path).await {
            Ok(()) => Ok(final_path),
            Err(e) => {
                let _ = fs::remove_file(&tmp_path).await;
                // Another writer may have won the race for the same bytes;
                // that's fine, the write is idempotent either way.
                if fs::try_exists(&final_path).await.unwrap_or(false) {
                    Ok(final_path)
                } else {
                    Err(CoreError::Transient(e.to_string()))
                }
            }
        }
    }

    /// # Errors
    /// Returns `CoreError::Transient` if the file can't be read.
    pub async fn read(&self, path: &Path) -> Result<Vec<u8>, CoreError> {
        fs::read(path).await.map_err(|e| CoreError::Transient(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_layout_matches_spec() {
        let storage = Storage::new(PathBuf::from("/data"));
        let path = storage.path_for("abcd1234", Kind::Original, Some("jpg"));
        assert_eq!(path, PathBuf::from("/data/original/ab/cd/abcd1234.jpg"));
    }

    #[tokio::test]
    async fn write_is_idempotent_and_atomic() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().to_path_buf());
        let hash = crate::common::content_hash::content_hash(b"hello world");

        let path1 = storage.write(&hash, Kind::Original, Some("jpg"), b"hello world").await.unwrap();
        let path2 = storage.write(&hash, Kind::Original, Some("jpg"), b"hello world").await.unwrap();

        assert_eq!(path1, path2);
        assert_eq!(storage.read(&path1).await.unwrap(), b"hello world");
    }
}
