//! Persisted attendance log.

use rollcall_core::AttendanceRecord;

use crate::kv::KvStore;
use crate::{report, StoreError};

/// Collection key in the backing document.
const LOG_KEY: &str = "attendanceRecords";

/// Append-only sequence of attendance events in the order they were
/// marked. Never mutated or pruned.
pub struct AttendanceLog<S: KvStore> {
    store: S,
}

impl<S: KvStore> AttendanceLog<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Read the whole log. An absent key is the empty log.
    pub fn list(&self) -> Result<Vec<AttendanceRecord>, StoreError> {
        match self.store.get(LOG_KEY)? {
            Some(text) => Ok(serde_json::from_str(&text)?),
            None => Ok(Vec::new()),
        }
    }

    /// Append one record and rewrite the collection.
    pub fn append(&self, record: AttendanceRecord) -> Result<(), StoreError> {
        let mut records = self.list()?;
        records.push(record);
        self.store.put(LOG_KEY, &serde_json::to_string(&records)?)?;
        tracing::debug!(count = records.len(), "attendance log written");
        Ok(())
    }

    /// Render the whole log as the plain-text report.
    pub fn export_text(&self) -> Result<String, StoreError> {
        Ok(report::render_report(&self.list()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{JsonFileStore, MemoryStore};

    fn record(id: &str, name: &str, timestamp: &str) -> AttendanceRecord {
        AttendanceRecord {
            id: id.into(),
            name: name.into(),
            timestamp: timestamp.into(),
        }
    }

    #[test]
    fn test_empty_log() {
        let log = AttendanceLog::new(MemoryStore::new());
        assert!(log.list().unwrap().is_empty());
    }

    #[test]
    fn test_append_n_read_n_in_order() {
        let log = AttendanceLog::new(MemoryStore::new());
        for i in 0..7 {
            log.append(record(
                &i.to_string(),
                &format!("person-{i}"),
                "2024-03-01T09:00:00+00:00",
            ))
            .unwrap();
        }
        let records = log.list().unwrap();
        assert_eq!(records.len(), 7);
        for (i, r) in records.iter().enumerate() {
            assert_eq!(r.id, i.to_string());
        }
    }

    #[test]
    fn test_file_backed_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attendance.json");

        {
            let log = AttendanceLog::new(JsonFileStore::open(&path).unwrap());
            log.append(record("1", "ada", "2024-03-01T09:00:00+00:00")).unwrap();
        }

        // Re-open: the record survives with identical fields.
        let log = AttendanceLog::new(JsonFileStore::open(&path).unwrap());
        let records = log.list().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "1");
        assert_eq!(records[0].name, "ada");
        assert_eq!(records[0].timestamp, "2024-03-01T09:00:00+00:00");
    }
}
