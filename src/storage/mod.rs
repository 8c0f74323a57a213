//! Blob storage for converted images.
//!
//! The service only ever writes and removes whole objects under
//! deterministic keys (`images/<id>.png`); it never reads them back.

mod memory;
mod s3;

pub use memory::MemoryObjectStore;
pub use s3::{create_s3_client, S3ObjectStore};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::ObjectStoreError;

/// Content type of every stored image.
pub const PNG_CONTENT_TYPE: &str = "image/png";

/// Durable blob storage.
///
/// Both operations succeed only when the backend acknowledged the request;
/// any other outcome is returned as an error.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `data` under `key`, replacing any existing object.
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), ObjectStoreError>;

    /// Remove the object stored under `key`.
    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError>;
}
