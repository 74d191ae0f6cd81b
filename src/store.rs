//! Durable set of already-ingested article keys.
//!
//! The state file is a JSON array of key strings. A missing or corrupt file
//! reads as an empty history: re-processing an article is preferable to
//! aborting the run. Writes replace the file atomically via a sibling temp
//! file and a rename.

use crate::models::ArticleKey;
use std::collections::BTreeSet;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, error, info, instrument, warn};

/// Keys of every article the ingester has ever accepted.
pub type ProcessedKeySet = BTreeSet<ArticleKey>;

#[derive(Debug, Clone)]
pub struct ProcessedSetStore {
    path: PathBuf,
}

impl ProcessedSetStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted keys. Never fails.
    #[instrument(level = "debug", skip_all, fields(path = %self.path.display()))]
    pub async fn load(&self) -> ProcessedKeySet {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No processed-article state yet; starting empty");
                return ProcessedKeySet::new();
            }
            Err(e) => {
                warn!(error = %e, "Could not read processed-article state; starting empty");
                return ProcessedKeySet::new();
            }
        };

        match serde_json::from_str::<Vec<ArticleKey>>(&raw) {
            Ok(keys) => {
                let set: ProcessedKeySet = keys.into_iter().collect();
                info!(count = set.len(), "Loaded processed article keys");
                set
            }
            Err(e) => {
                warn!(error = %e, "Processed-article state is corrupt; starting empty");
                ProcessedKeySet::new()
            }
        }
    }

    /// Persist `keys`, replacing prior state. Errors are logged, not returned.
    #[instrument(level = "debug", skip_all, fields(path = %self.path.display(), count = keys.len()))]
    pub async fn save(&self, keys: &ProcessedKeySet) {
        match self.write_atomically(keys).await {
            Ok(()) => info!(count = keys.len(), "Saved processed article keys"),
            Err(e) => error!(error = %e, "Failed to save processed article keys"),
        }
    }

    async fn write_atomically(&self, keys: &ProcessedKeySet) -> Result<(), Box<dyn Error>> {
        let json = serde_json::to_string_pretty(keys)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let mut tmp_name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "processed_articles.json".into());
        tmp_name.push(".tmp");
        let tmp_path = self.path.with_file_name(tmp_name);

        fs::write(&tmp_path, json).await?;
        fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}
