use std::sync::Mutex;

use super::{AssessmentRecord, AssessmentStore, StorageError};

/// In-process store. Optionally refuses every write, to exercise the
/// pipeline's handling of an unavailable store.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<AssessmentRecord>>,
    unavailable: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unavailable() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            unavailable: true,
        }
    }

    pub fn records(&self) -> Vec<AssessmentRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|records| records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AssessmentStore for MemoryStore {
    fn store(&self, record: &AssessmentRecord) -> Result<String, StorageError> {
        if self.unavailable {
            return Err(StorageError::Unavailable("memory store disabled".into()));
        }
        let mut records = self
            .records
            .lock()
            .map_err(|_| StorageError::Unavailable("memory store lock poisoned".into()))?;
        records.push(record.clone());
        Ok(record.record_id.to_string())
    }
}
