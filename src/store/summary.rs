use crate::model::DisasterSummary;
use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tokio::sync::RwLock;

/// Failures surfaced by the summary store
#[derive(Debug, Error)]
pub enum SummaryStoreError {
    /// Another writer applied a change after this writer read its version
    #[error("summary version conflict: expected {expected}, found {found}")]
    VersionConflict { expected: u64, found: u64 },

    /// No summary document exists yet
    #[error("no summary document exists")]
    NotFound,

    /// Backend failure in a durable implementation
    #[error("summary store backend error: {0}")]
    Backend(String),
}

/// Storage for the single versioned aggregate summary
///
/// Writers follow a read/recompute/compare-and-swap cycle: the swap applies
/// only when the stored version still matches what the writer read.
#[async_trait]
pub trait SummaryStore: Send + Sync {
    /// Current summary, creating the default version-1 document on first
    /// access.
    async fn get_current(&self) -> Result<DisasterSummary, SummaryStoreError>;

    /// Atomically replace the summary if the stored version equals
    /// `expected_version`. Bumps the version by exactly one, stamps
    /// `updated_at`, and returns the stored document.
    async fn compare_and_swap(
        &self,
        summary: DisasterSummary,
        expected_version: u64,
    ) -> Result<DisasterSummary, SummaryStoreError>;

    /// Replace the summary with a fresh version-1 default.
    async fn reset(&self) -> Result<DisasterSummary, SummaryStoreError>;
}

/// In-memory summary store used by the default deployment and tests
pub struct MemorySummaryStore {
    current: RwLock<Option<DisasterSummary>>,
}

impl MemorySummaryStore {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(None),
        }
    }
}

impl Default for MemorySummaryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SummaryStore for MemorySummaryStore {
    async fn get_current(&self) -> Result<DisasterSummary, SummaryStoreError> {
        let mut current = self.current.write().await;
        match current.as_ref() {
            Some(summary) => Ok(summary.clone()),
            None => {
                let summary = DisasterSummary::new_current();
                *current = Some(summary.clone());
                Ok(summary)
            }
        }
    }

    async fn compare_and_swap(
        &self,
        summary: DisasterSummary,
        expected_version: u64,
    ) -> Result<DisasterSummary, SummaryStoreError> {
        let mut current = self.current.write().await;
        match current.as_mut() {
            None => Err(SummaryStoreError::NotFound),
            Some(stored) if stored.version != expected_version => {
                Err(SummaryStoreError::VersionConflict {
                    expected: expected_version,
                    found: stored.version,
                })
            }
            Some(stored) => {
                let mut applied = summary;
                applied.summary_id = stored.summary_id.clone();
                applied.version = expected_version + 1;
                applied.updated_at = Utc::now();
                *stored = applied.clone();
                Ok(applied)
            }
        }
    }

    async fn reset(&self) -> Result<DisasterSummary, SummaryStoreError> {
        let mut current = self.current.write().await;
        let summary = DisasterSummary::new_current();
        *current = Some(summary.clone());
        Ok(summary)
    }
}
