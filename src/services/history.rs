use crate::models::scan::ScanRecord;
use anyhow::Result;
use std::fs;
use std::path::Path;
use tokio::sync::RwLock;

/// Append-only scan history backing the dashboard reads. One record per
/// scan; nothing is ever updated or deleted.
pub struct HistoryStore {
    file_path: String,
    records: RwLock<Vec<ScanRecord>>,
}

impl HistoryStore {
    pub fn new(file_path: &str) -> Result<Self> {
        let records = if Path::new(file_path).exists() {
            let content = fs::read_to_string(file_path)?;
            serde_json::from_str(&content)?
        } else {
            Vec::new()
        };

        Ok(Self {
            file_path: file_path.to_string(),
            records: RwLock::new(records),
        })
    }

    pub async fn append(&self, record: ScanRecord) -> Result<()> {
        let mut records = self.records.write().await;
        records.push(record);
        self.persist(&records)?;
        Ok(())
    }

    /// Snapshot for dashboard reads, newest first.
    pub async fn list(&self) -> Vec<ScanRecord> {
        let records = self.records.read().await;
        let mut snapshot = records.clone();
        snapshot.reverse();
        snapshot
    }

    fn persist(&self, records: &[ScanRecord]) -> Result<()> {
        let json = serde_json::to_string_pretty(records)?;
        fs::write(&self.file_path, json)?;
        Ok(())
    }
}
