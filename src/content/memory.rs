//! In-process content store, mainly for tests and local runs.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::{ContentResult, ContentStore, StoredObject};
use crate::errors::ContentError;

#[derive(Debug, Clone, Default)]
pub struct InMemoryContentStore {
    objects: Arc<DashMap<String, StoredObject>>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object without going through [`ContentStore::write`]
    pub fn insert(&self, locator: impl Into<String>, object: StoredObject) {
        self.objects.insert(locator.into(), object);
    }

    pub fn get(&self, locator: &str) -> Option<StoredObject> {
        self.objects.get(locator).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, locator: &str) -> bool {
        self.objects.contains_key(locator)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn read(&self, locator: &str) -> ContentResult<StoredObject> {
        self.get(locator).ok_or_else(|| ContentError::NotFound {
            locator: locator.to_string(),
        })
    }

    async fn write(
        &self,
        locator: &str,
        bytes: &[u8],
        metadata: &HashMap<String, String>,
    ) -> ContentResult<String> {
        if locator.trim().is_empty() {
            return Err(ContentError::InvalidLocator {
                locator: locator.to_string(),
                reason: "locator is empty".to_string(),
            });
        }

        let version_tag = Uuid::new_v4().to_string();
        self.objects.insert(
            locator.to_string(),
            StoredObject {
                bytes: bytes.to_vec(),
                metadata: metadata.clone(),
                version_tag: Some(version_tag.clone()),
            },
        );
        Ok(version_tag)
    }
}
