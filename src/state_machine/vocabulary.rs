//! Mapping from the processor's raw status strings to [`ExternalStatus`].

use std::collections::HashMap;
use tracing::warn;

use super::states::ExternalStatus;
use crate::config::VocabularyConfig;

/// Case-insensitive lookup table for raw processor statuses
#[derive(Debug, Clone)]
pub struct StatusVocabulary {
    table: HashMap<String, ExternalStatus>,
}

impl StatusVocabulary {
    pub fn new() -> Self {
        Self {
            table: HashMap::new(),
        }
    }

    pub fn from_config(config: &VocabularyConfig) -> Self {
        let mut vocabulary = Self::new();
        for word in &config.in_progress {
            vocabulary.insert(word, ExternalStatus::InProgress);
        }
        for word in &config.failed {
            vocabulary.insert(word, ExternalStatus::Failed);
        }
        for word in &config.completed {
            vocabulary.insert(word, ExternalStatus::Completed);
        }
        vocabulary
    }

    /// Add or replace one mapping
    pub fn insert(&mut self, raw: &str, status: ExternalStatus) {
        self.table.insert(normalize(raw), status);
    }

    pub fn with(mut self, raw: &str, status: ExternalStatus) -> Self {
        self.insert(raw, status);
        self
    }

    /// Map a raw string; unknown strings warn and become `Unknown`
    pub fn classify(&self, raw: &str) -> ExternalStatus {
        match self.table.get(&normalize(raw)) {
            Some(status) => status.clone(),
            None => {
                warn!(
                    raw_status = %raw,
                    "Unrecognized external status, treating as non-terminal"
                );
                ExternalStatus::Unknown(raw.to_string())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl Default for StatusVocabulary {
    fn default() -> Self {
        Self::from_config(&VocabularyConfig::default())
    }
}

fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}
