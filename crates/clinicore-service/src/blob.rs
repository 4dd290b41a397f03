//! Local filesystem [`BlobStore`].

use std::path::{Component, Path, PathBuf};

use clinicore_core::error::{ClinicError, ClinicResult};
use clinicore_core::storage::BlobStore;
use tracing::debug;

use crate::error::ServiceError;

/// Stores blobs as files under a root directory.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative blob path, refusing anything that could
    /// escape the root.
    fn resolve(&self, path: &str) -> Result<PathBuf, ServiceError> {
        let relative = Path::new(path);
        let safe = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(ServiceError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

impl BlobStore for LocalBlobStore {
    async fn put(&self, path: &str, content: &[u8]) -> ClinicResult<()> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(ServiceError::from)?;
        }
        tokio::fs::write(&full, content)
            .await
            .map_err(ServiceError::from)?;
        debug!(path, bytes = content.len(), "Stored blob");
        Ok(())
    }

    async fn get(&self, path: &str) -> ClinicResult<Vec<u8>> {
        let full = self.resolve(path)?;
        match tokio::fs::read(&full).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ClinicError::not_found("file", path))
            }
            Err(e) => Err(ServiceError::from(e).into()),
        }
    }

    /// Deleting a missing blob succeeds.
    async fn delete(&self, path: &str) -> ClinicResult<()> {
        let full = self.resolve(path)?;
        match tokio::fs::remove_file(&full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ServiceError::from(e).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("clinicore-blob-{}", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn put_get_delete() {
        let root = scratch_dir();
        let store = LocalBlobStore::new(&root);

        store.put("clinic_a/patient_b/x.pdf", b"%PDF-1.7").await.unwrap();
        assert_eq!(store.get("clinic_a/patient_b/x.pdf").await.unwrap(), b"%PDF-1.7");

        store.delete("clinic_a/patient_b/x.pdf").await.unwrap();
        assert!(store.get("clinic_a/patient_b/x.pdf").await.unwrap_err().is_not_found());
        store.delete("clinic_a/patient_b/x.pdf").await.unwrap();

        let _ = std::fs::remove_dir_all(root);
    }

    #[tokio::test]
    async fn escaping_paths_are_refused() {
        let store = LocalBlobStore::new(scratch_dir());
        for path in ["../etc/passwd", "/etc/passwd", "a/../../b", ""] {
            let err = store.get(path).await.unwrap_err();
            assert!(matches!(err, ClinicError::Storage(_)), "{path} was accepted");
        }
    }
}
