use crate::model::{ExtractedInfo, PersonRecord, TranscriptChunk};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Storage for per-caller call records
///
/// Append and update operations are atomic per record; methods that take a
/// person_id return `None` when no record exists.
#[async_trait]
pub trait PersonStore: Send + Sync {
    /// Fetch the record, creating it if absent. The bool reports creation.
    async fn get_or_create(&self, person_id: &str) -> Result<(PersonRecord, bool)>;

    async fn get(&self, person_id: &str) -> Result<Option<PersonRecord>>;

    async fn append_chunk(
        &self,
        person_id: &str,
        chunk: TranscriptChunk,
    ) -> Result<Option<PersonRecord>>;

    /// Set the latest extraction result and append it to the history.
    async fn update_extracted_info(
        &self,
        person_id: &str,
        info: ExtractedInfo,
    ) -> Result<Option<PersonRecord>>;

    /// Mark the call ended and the record inactive.
    async fn end_call(&self, person_id: &str) -> Result<Option<PersonRecord>>;

    async fn list_active(&self) -> Result<Vec<PersonRecord>>;

    /// All records that have at least one extraction result.
    async fn list_with_extracted_info(&self) -> Result<Vec<PersonRecord>>;

    async fn count_active(&self) -> Result<usize>;

    async fn count_total(&self) -> Result<usize>;
}

/// In-memory person store used by the default deployment and tests
pub struct MemoryPersonStore {
    records: RwLock<HashMap<String, PersonRecord>>,
}

impl MemoryPersonStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryPersonStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PersonStore for MemoryPersonStore {
    async fn get_or_create(&self, person_id: &str) -> Result<(PersonRecord, bool)> {
        let mut records = self.records.write().await;
        if let Some(record) = records.get(person_id) {
            return Ok((record.clone(), false));
        }
        let record = PersonRecord::new(person_id);
        records.insert(person_id.to_string(), record.clone());
        Ok((record, true))
    }

    async fn get(&self, person_id: &str) -> Result<Option<PersonRecord>> {
        let records = self.records.read().await;
        Ok(records.get(person_id).cloned())
    }

    async fn append_chunk(
        &self,
        person_id: &str,
        chunk: TranscriptChunk,
    ) -> Result<Option<PersonRecord>> {
        let mut records = self.records.write().await;
        match records.get_mut(person_id) {
            Some(record) => {
                record.transcript_chunks.push(chunk);
                record.updated_at = Utc::now();
                Ok(Some(record.clone()))
            }
            None => Ok(None),
        }
    }

    async fn update_extracted_info(
        &self,
        person_id: &str,
        info: ExtractedInfo,
    ) -> Result<Option<PersonRecord>> {
        let mut records = self.records.write().await;
        match records.get_mut(person_id) {
            Some(record) => {
                record.extraction_history.push(info.clone());
                record.extracted_info = Some(info);
                record.updated_at = Utc::now();
                Ok(Some(record.clone()))
            }
            None => Ok(None),
        }
    }

    async fn end_call(&self, person_id: &str) -> Result<Option<PersonRecord>> {
        let mut records = self.records.write().await;
        match records.get_mut(person_id) {
            Some(record) => {
                record.is_active = false;
                record.call_ended_at = Some(Utc::now());
                record.updated_at = Utc::now();
                Ok(Some(record.clone()))
            }
            None => Ok(None),
        }
    }

    async fn list_active(&self) -> Result<Vec<PersonRecord>> {
        let records = self.records.read().await;
        Ok(records.values().filter(|r| r.is_active).cloned().collect())
    }

    async fn list_with_extracted_info(&self) -> Result<Vec<PersonRecord>> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|r| r.extracted_info.is_some())
            .cloned()
            .collect())
    }

    async fn count_active(&self) -> Result<usize> {
        let records = self.records.read().await;
        Ok(records.values().filter(|r| r.is_active).count())
    }

    async fn count_total(&self) -> Result<usize> {
        let records = self.records.read().await;
        Ok(records.len())
    }
}
