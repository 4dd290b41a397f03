//! Blob storage seam for attachment content.

use crate::error::ClinicResult;

/// Durable storage for uploaded file content, addressed by relative
/// path.
pub trait BlobStore: Send + Sync {
    fn put(&self, path: &str, content: &[u8]) -> impl Future<Output = ClinicResult<()>> + Send;
    /// Fails with [`crate::ClinicError::NotFound`] when nothing is
    /// stored at `path`.
    fn get(&self, path: &str) -> impl Future<Output = ClinicResult<Vec<u8>>> + Send;
    fn delete(&self, path: &str) -> impl Future<Output = ClinicResult<()>> + Send;
}
