//! Resumable URL → question cache backed by a single JSON file.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::AppError;
use crate::models::QuestionRecord;
use crate::traits::QuestionStore;

/// Discussion URL → question record.
///
/// Ordered by key so the persisted file is stable across runs.
pub type QuestionCache = BTreeMap<String, QuestionRecord>;

/// A [`QuestionStore`] persisting the whole cache as one pretty-printed JSON object.
#[derive(Debug, Clone)]
pub struct JsonFileCache {
    path: PathBuf,
}

impl JsonFileCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "cache.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl QuestionStore for JsonFileCache {
    fn load(&self) -> Result<QuestionCache, AppError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(QuestionCache::new());
            }
            Err(e) => {
                return Err(AppError::CacheError(format!(
                    "Failed to read cache {}: {e}",
                    self.path.display()
                )));
            }
        };

        match serde_json::from_str::<QuestionCache>(&raw) {
            Ok(cache) => {
                tracing::info!(path = %self.path.display(), entries = cache.len(), "Loaded cache");
                Ok(cache)
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Cache is malformed, starting from an empty cache"
                );
                Ok(QuestionCache::new())
            }
        }
    }

    fn persist(&self, cache: &QuestionCache) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(cache)?;
        let tmp = self.temp_path();
        std::fs::write(&tmp, json).map_err(|e| {
            AppError::CacheError(format!("Failed to write cache {}: {e}", tmp.display()))
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            AppError::CacheError(format!(
                "Failed to move cache into place at {}: {e}",
                self.path.display()
            ))
        })?;
        Ok(())
    }
}
