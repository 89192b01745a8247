use std::path::{Path, PathBuf};

use uuid::Uuid;

use super::{AssessmentRecord, AssessmentStore, StorageError};
use crate::config::PipelineConfig;

/// One pretty-printed JSON file per record, named `<record_id>.json`.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.storage_dir.clone())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, id: &Uuid) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Read a record back by id. Ids that are not UUIDs are rejected before
    /// touching the filesystem.
    pub fn load(&self, id: &str) -> Result<AssessmentRecord, StorageError> {
        let id = Uuid::parse_str(id).map_err(|_| StorageError::InvalidId(id.to_string()))?;
        let path = self.record_path(&id);
        if !path.exists() {
            return Err(StorageError::NotFound(id));
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

impl AssessmentStore for JsonFileStore {
    fn store(&self, record: &AssessmentRecord) -> Result<String, StorageError> {
        std::fs::create_dir_all(&self.dir)?;

        let json = serde_json::to_string_pretty(record)?;
        let path = self.record_path(&record.record_id);
        // Write beside the target, then rename, so readers never see a partial file.
        let staging = path.with_extension("json.tmp");
        std::fs::write(&staging, json)?;
        std::fs::rename(&staging, &path)?;

        tracing::debug!(record_id = %record.record_id, "Assessment record written");
        Ok(record.record_id.to_string())
    }
}
