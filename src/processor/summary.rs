use crate::llm::LlmClient;
use crate::model::{CallTotals, DisasterSummary, PersonRecord};
use crate::protocol::ServerMessage;
use crate::registry::ConnectionRegistry;
use crate::store::{PersonStore, SummaryStore, SummaryStoreError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Resets the pending flag when a debounce cycle ends for any reason.
/// Built before the task is spawned and moved into it, so the guard is
/// part of the future's captured state and drops even when the task is
/// aborted before its first poll.
struct PendingGuard {
    coordinator: Arc<SummaryCoordinator>,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.coordinator.pending.store(false, Ordering::SeqCst);
    }
}

/// Debounced, optimistically-concurrent summary recomputation
///
/// Any number of `schedule_update` calls within one debounce window
/// coalesce into a single recompute cycle; the pending flag guarantees at
/// most one cycle is ever in flight.
pub struct SummaryCoordinator {
    registry: Arc<ConnectionRegistry>,
    person_store: Arc<dyn PersonStore>,
    summary_store: Arc<dyn SummaryStore>,
    llm: Arc<LlmClient>,
    debounce: Duration,
    cas_retries: u32,
    pending: AtomicBool,
    task_handle: Mutex<Option<JoinHandle<()>>>,
}

impl SummaryCoordinator {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        person_store: Arc<dyn PersonStore>,
        summary_store: Arc<dyn SummaryStore>,
        llm: Arc<LlmClient>,
        debounce: Duration,
        cas_retries: u32,
    ) -> Self {
        Self {
            registry,
            person_store,
            summary_store,
            llm,
            debounce,
            cas_retries,
            pending: AtomicBool::new(false),
            task_handle: Mutex::new(None),
        }
    }

    /// Request a summary refresh. Returns immediately; if a cycle is
    /// already pending the request coalesces into it.
    pub async fn schedule_update(self: &Arc<Self>) {
        if self
            .pending
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Summary update already pending, coalescing");
            return;
        }

        let guard = PendingGuard {
            coordinator: Arc::clone(self),
        };
        let task = tokio::spawn(async move {
            sleep(guard.coordinator.debounce).await;
            guard.coordinator.recompute().await;
        });

        let mut handle = self.task_handle.lock().await;
        *handle = Some(task);
    }

    /// Whether a debounce cycle is currently pending or running.
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst)
    }

    /// One recompute cycle: read records, summarize, compare-and-swap,
    /// broadcast. Version conflicts rebase on the winner's summary and
    /// retry up to the configured bound; an abandoned cycle is picked up by
    /// the next debounce.
    pub async fn recompute(&self) {
        let records = match self.person_store.list_with_extracted_info().await {
            Ok(records) => records,
            Err(err) => {
                error!("Failed to load caller records for summary: {:#}", err);
                return;
            }
        };
        if records.is_empty() {
            debug!("No extracted caller records, skipping summary update");
            return;
        }

        for _ in 0..self.cas_retries {
            let current = match self.summary_store.get_current().await {
                Ok(current) => current,
                Err(err) => {
                    error!("Failed to read current summary: {}", err);
                    return;
                }
            };
            let expected = current.version;

            let new_summary = match self.llm.summarize(&records, &current).await {
                Ok(summary) => summary,
                Err(err) => {
                    error!("Summary generation failed: {}", err);
                    self.refresh_totals(&records, current).await;
                    return;
                }
            };

            match self.summary_store.compare_and_swap(new_summary, expected).await {
                Ok(stored) => {
                    info!("Summary updated to version {}", stored.version);
                    let count = self
                        .registry
                        .broadcast(ServerMessage::summary_update(stored))
                        .await;
                    debug!("Summary broadcast to {} connections", count);
                    return;
                }
                Err(SummaryStoreError::VersionConflict { expected, found }) => {
                    warn!(
                        "Summary version conflict (expected {}, found {}), retrying",
                        expected, found
                    );
                }
                Err(SummaryStoreError::NotFound) => {
                    warn!("Summary document missing, re-reading");
                }
                Err(err) => {
                    error!("Summary store error: {}", err);
                    return;
                }
            }
        }

        warn!(
            "Summary update abandoned after {} version conflicts",
            self.cas_retries
        );
    }

    /// Fallback when summarization fails: keep the stored narrative but
    /// refresh the raw caller totals. No broadcast; the last successfully
    /// computed summary stays the clients' known-good state.
    async fn refresh_totals(&self, records: &[PersonRecord], current: DisasterSummary) {
        let expected = current.version;
        let mut fallback = current;
        fallback.apply_totals(&CallTotals::from_records(records));

        match self.summary_store.compare_and_swap(fallback, expected).await {
            Ok(stored) => info!("Refreshed summary totals at version {}", stored.version),
            Err(err) => warn!("Skipping summary totals refresh: {}", err),
        }
    }

    /// Abort any pending debounce task. The aborted task drops its guard,
    /// returning the state to idle.
    pub async fn shutdown(&self) {
        let mut handle = self.task_handle.lock().await;
        if let Some(task) = handle.take() {
            task.abort();
        }
    }
}
