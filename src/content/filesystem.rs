//! # Filesystem Content Store
//!
//! Objects live under a root directory at their locator's relative path.
//! Metadata and the version tag sit in a JSON sidecar named
//! `<file>.meta.json` next to the object. Locators may not be absolute or
//! contain `..` segments.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use super::{ContentResult, ContentStore, StoredObject};
use crate::errors::ContentError;

const SIDECAR_SUFFIX: &str = ".meta.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct Sidecar {
    #[serde(default)]
    version_tag: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct FilesystemContentStore {
    root: PathBuf,
}

impl FilesystemContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, locator: &str) -> ContentResult<PathBuf> {
        let invalid = |reason: &str| ContentError::InvalidLocator {
            locator: locator.to_string(),
            reason: reason.to_string(),
        };

        let relative = Path::new(locator);
        if locator.trim().is_empty() {
            return Err(invalid("locator is empty"));
        }
        if locator.ends_with(SIDECAR_SUFFIX) {
            return Err(invalid("locator collides with metadata sidecar naming"));
        }
        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => return Err(invalid("locator must be a relative path without '..'")),
            }
        }

        Ok(self.root.join(relative))
    }

    fn sidecar_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(SIDECAR_SUFFIX);
        PathBuf::from(name)
    }

    fn io_error(locator: &str, source: std::io::Error) -> ContentError {
        if source.kind() == std::io::ErrorKind::NotFound {
            ContentError::NotFound {
                locator: locator.to_string(),
            }
        } else {
            ContentError::Io {
                locator: locator.to_string(),
                source,
            }
        }
    }
}

#[async_trait]
impl ContentStore for FilesystemContentStore {
    async fn read(&self, locator: &str) -> ContentResult<StoredObject> {
        let path = self.resolve(locator)?;
        let bytes = fs::read(&path)
            .await
            .map_err(|e| Self::io_error(locator, e))?;

        // objects dropped in by other tools have no sidecar
        let sidecar = match fs::read(Self::sidecar_path(&path)).await {
            Ok(raw) => serde_json::from_slice::<Sidecar>(&raw).map_err(|e| ContentError::Metadata {
                locator: locator.to_string(),
                reason: e.to_string(),
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Sidecar::default(),
            Err(e) => return Err(Self::io_error(locator, e)),
        };

        Ok(StoredObject {
            bytes,
            metadata: sidecar.metadata,
            version_tag: sidecar.version_tag,
        })
    }

    async fn write(
        &self,
        locator: &str,
        bytes: &[u8],
        metadata: &HashMap<String, String>,
    ) -> ContentResult<String> {
        let path = self.resolve(locator)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Self::io_error(locator, e))?;
        }

        let version_tag = Uuid::new_v4().to_string();
        let sidecar = Sidecar {
            version_tag: Some(version_tag.clone()),
            metadata: metadata.clone(),
        };
        let sidecar_bytes = serde_json::to_vec_pretty(&sidecar).map_err(|e| ContentError::Metadata {
            locator: locator.to_string(),
            reason: e.to_string(),
        })?;

        fs::write(&path, bytes)
            .await
            .map_err(|e| Self::io_error(locator, e))?;
        fs::write(Self::sidecar_path(&path), sidecar_bytes)
            .await
            .map_err(|e| Self::io_error(locator, e))?;

        debug!(locator = %locator, bytes = bytes.len(), version_tag = %version_tag, "Wrote content object");
        Ok(version_tag)
    }
}
