//! # Content Stores
//!
//! Opaque object storage the submission flow copies work-item content
//! through. Locators are store-relative keys; metadata is a flat string map
//! that travels with the bytes.

pub mod filesystem;
pub mod memory;

use async_trait::async_trait;
use std::collections::HashMap;

use crate::errors::ContentError;

pub use filesystem::FilesystemContentStore;
pub use memory::InMemoryContentStore;

pub type ContentResult<T> = Result<T, ContentError>;

/// Bytes plus the metadata stored alongside them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub metadata: HashMap<String, String>,
    /// Tag assigned by the store on the last write, when it tracks one
    pub version_tag: Option<String>,
}

impl StoredObject {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            ..Self::default()
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[async_trait]
pub trait ContentStore: Send + Sync + std::fmt::Debug {
    async fn read(&self, locator: &str) -> ContentResult<StoredObject>;

    /// Store `bytes` with `metadata` at `locator`, replacing any existing
    /// object, and return the new version tag
    async fn write(
        &self,
        locator: &str,
        bytes: &[u8],
        metadata: &HashMap<String, String>,
    ) -> ContentResult<String>;
}
