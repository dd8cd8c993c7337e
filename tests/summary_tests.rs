// Integration tests for the summary coordinator
//
// Verifies debounce coalescing, the optimistic-concurrency retry path
// under racing writers, broadcast-on-success ordering, and the totals-only
// fallback when summary generation fails.

use async_trait::async_trait;
use sitrep::llm::{CompletionProvider, LlmClient, ProviderError};
use sitrep::model::{DisasterType, ExtractedInfo, SeverityLevel};
use sitrep::processor::SummaryCoordinator;
use sitrep::protocol::ServerMessage;
use sitrep::registry::{ConnectionRegistry, Outbound};
use sitrep::store::{MemoryPersonStore, MemorySummaryStore, PersonStore, SummaryStore};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

const SUMMARY_JSON: &str = r#"{"overall_severity": "high", "narrative_summary": "Fire reported.", "disaster_types": ["fire"]}"#;

/// Returns a fixed response and counts calls.
struct CountingProvider {
    response: String,
    calls: AtomicUsize,
}

impl CountingProvider {
    fn new(response: &str) -> Arc<Self> {
        Arc::new(Self {
            response: response.to_string(),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionProvider for CountingProvider {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }
}

/// Provider that signals each call on a channel and blocks gated calls
/// until released, so a test can interleave another writer mid-recompute.
struct GatedProvider {
    response: String,
    gate_every_call: bool,
    calls: AtomicUsize,
    entered: mpsc::UnboundedSender<()>,
    release: Notify,
}

impl GatedProvider {
    fn new(
        response: &str,
        gate_every_call: bool,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<()>) {
        let (entered, entered_rx) = mpsc::unbounded_channel();
        let provider = Arc::new(Self {
            response: response.to_string(),
            gate_every_call,
            calls: AtomicUsize::new(0),
            entered,
            release: Notify::new(),
        });
        (provider, entered_rx)
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionProvider for GatedProvider {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let _ = self.entered.send(());
        if self.gate_every_call || call == 0 {
            self.release.notified().await;
        }
        Ok(self.response.clone())
    }
}

/// Shared stores and registry, so multiple coordinators can race.
struct TestBed {
    registry: Arc<ConnectionRegistry>,
    person_store: Arc<MemoryPersonStore>,
    summary_store: Arc<MemorySummaryStore>,
}

impl TestBed {
    fn new() -> Self {
        Self {
            registry: Arc::new(ConnectionRegistry::new()),
            person_store: Arc::new(MemoryPersonStore::new()),
            summary_store: Arc::new(MemorySummaryStore::new()),
        }
    }

    fn coordinator(
        &self,
        provider: Arc<dyn CompletionProvider>,
        debounce: Duration,
        cas_retries: u32,
    ) -> Arc<SummaryCoordinator> {
        let llm = Arc::new(LlmClient::new(provider, 600, 3));
        Arc::new(SummaryCoordinator::new(
            Arc::clone(&self.registry),
            self.person_store.clone() as Arc<dyn PersonStore>,
            self.summary_store.clone() as Arc<dyn SummaryStore>,
            llm,
            debounce,
            cas_retries,
        ))
    }

    async fn seed_caller(&self, person_id: &str, injuries: u32) {
        self.person_store.get_or_create(person_id).await.unwrap();
        let mut info = ExtractedInfo::default();
        info.disaster_type = DisasterType::Fire;
        info.severity = SeverityLevel::High;
        info.injuries_reported = Some(injuries);
        self.person_store
            .update_extracted_info(person_id, info)
            .await
            .unwrap();
    }

    /// Self-swap the stored summary until it reaches the given version.
    async fn advance_to_version(&self, version: u64) {
        loop {
            let current = self.summary_store.get_current().await.unwrap();
            if current.version >= version {
                break;
            }
            let expected = current.version;
            self.summary_store
                .compare_and_swap(current, expected)
                .await
                .unwrap();
        }
    }
}

fn broadcast_versions(rx: &mut mpsc::UnboundedReceiver<Outbound>) -> Vec<u64> {
    let mut versions = Vec::new();
    while let Ok(outbound) = rx.try_recv() {
        if let Outbound::Message(ServerMessage::SummaryUpdate { summary }) = outbound {
            versions.push(summary.version);
        }
    }
    versions
}

#[tokio::test]
async fn test_rapid_schedules_coalesce_to_one_recompute() {
    let provider = CountingProvider::new(SUMMARY_JSON);
    let bed = TestBed::new();
    let coordinator = bed.coordinator(provider.clone(), Duration::from_millis(30), 3);
    bed.seed_caller("p1", 0).await;

    for _ in 0..10 {
        coordinator.schedule_update().await;
    }
    assert!(coordinator.is_pending());

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(provider.calls(), 1, "ten schedules, one provider call");
    assert!(!coordinator.is_pending());
    assert_eq!(bed.summary_store.get_current().await.unwrap().version, 2);
}

#[tokio::test]
async fn test_new_window_opens_after_cycle_completes() {
    let provider = CountingProvider::new(SUMMARY_JSON);
    let bed = TestBed::new();
    let coordinator = bed.coordinator(provider.clone(), Duration::from_millis(10), 3);
    bed.seed_caller("p1", 0).await;

    coordinator.schedule_update().await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    coordinator.schedule_update().await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(provider.calls(), 2);
    assert_eq!(bed.summary_store.get_current().await.unwrap().version, 3);
}

#[tokio::test]
async fn test_aborted_debounce_returns_to_idle() {
    let provider = CountingProvider::new(SUMMARY_JSON);
    let bed = TestBed::new();
    let coordinator = bed.coordinator(provider.clone(), Duration::from_secs(30), 3);
    bed.seed_caller("p1", 0).await;

    coordinator.schedule_update().await;
    assert!(coordinator.is_pending());

    coordinator.shutdown().await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(!coordinator.is_pending(), "abort must reset the pending flag");
    assert_eq!(provider.calls(), 0);

    // A fresh schedule is accepted afterwards
    coordinator.schedule_update().await;
    assert!(coordinator.is_pending());
    coordinator.shutdown().await;
}

#[tokio::test]
async fn test_recompute_without_extractions_is_skipped() {
    let provider = CountingProvider::new(SUMMARY_JSON);
    let bed = TestBed::new();
    let coordinator = bed.coordinator(provider.clone(), Duration::from_millis(5), 3);

    // A record exists but carries no extraction result
    bed.person_store.get_or_create("p1").await.unwrap();

    coordinator.recompute().await;
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn test_conflicting_recomputes_broadcast_twice_in_version_order() {
    let bed = TestBed::new();
    bed.seed_caller("p1", 2).await;
    bed.advance_to_version(5).await;

    let fast_provider = CountingProvider::new(
        r#"{"overall_severity": "high", "narrative_summary": "From writer a.", "disaster_types": ["fire"]}"#,
    );
    let (gated_provider, mut entered_rx) = GatedProvider::new(
        r#"{"overall_severity": "critical", "narrative_summary": "From writer b.", "disaster_types": ["fire"]}"#,
        false,
    );

    let writer_a = bed.coordinator(fast_provider.clone(), Duration::from_millis(5), 3);
    let writer_b = bed.coordinator(gated_provider.clone(), Duration::from_millis(5), 3);

    let (tx, mut rx) = mpsc::unbounded_channel();
    bed.registry.connect("observer", tx).await;

    // Writer b reads version 5 and stalls inside the provider
    let b = Arc::clone(&writer_b);
    let b_task = tokio::spawn(async move { b.recompute().await });
    entered_rx.recv().await.unwrap();

    // Writer a completes a full cycle while b is stalled: 5 -> 6
    writer_a.recompute().await;
    assert_eq!(bed.summary_store.get_current().await.unwrap().version, 6);

    // Writer b resumes: its swap at 5 conflicts, so it rereads 6,
    // regenerates, and lands 7
    gated_provider.release.notify_one();
    b_task.await.unwrap();

    let stored = bed.summary_store.get_current().await.unwrap();
    assert_eq!(stored.version, 7);
    assert_eq!(stored.narrative_summary, "From writer b.");
    assert_eq!(
        gated_provider.calls(),
        2,
        "the conflict forces a fresh summarize against version 6"
    );
    assert_eq!(fast_provider.calls(), 1);

    // Exactly two broadcasts, in version order, none dropped
    assert_eq!(broadcast_versions(&mut rx), vec![6, 7]);
}

#[tokio::test]
async fn test_conflict_retries_are_bounded() {
    let bed = TestBed::new();
    bed.seed_caller("p1", 0).await;

    let (gated_provider, mut entered_rx) = GatedProvider::new(SUMMARY_JSON, true);
    let coordinator = bed.coordinator(gated_provider.clone(), Duration::from_millis(5), 3);

    let (tx, mut rx) = mpsc::unbounded_channel();
    bed.registry.connect("observer", tx).await;

    let initial = bed.summary_store.get_current().await.unwrap().version;

    let task = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.recompute().await })
    };

    // Steal the version ahead of every attempted swap
    for _ in 0..3 {
        entered_rx.recv().await.unwrap();
        let current = bed.summary_store.get_current().await.unwrap();
        let version = current.version;
        bed.summary_store
            .compare_and_swap(current, version)
            .await
            .unwrap();
        gated_provider.release.notify_one();
    }
    task.await.unwrap();

    assert_eq!(gated_provider.calls(), 3, "one summarize per bounded attempt");
    // Only the interfering writer's swaps landed
    assert_eq!(
        bed.summary_store.get_current().await.unwrap().version,
        initial + 3
    );
    assert!(
        broadcast_versions(&mut rx).is_empty(),
        "an abandoned cycle must not broadcast"
    );
}

#[tokio::test]
async fn test_summarize_failure_refreshes_totals_without_broadcast() {
    let bed = TestBed::new();

    // Seed a previously computed narrative at version 2
    let current = bed.summary_store.get_current().await.unwrap();
    let mut good = current.clone();
    good.narrative_summary = "Previously computed narrative".to_string();
    good.overall_severity = SeverityLevel::Moderate;
    bed.summary_store
        .compare_and_swap(good, current.version)
        .await
        .unwrap();

    bed.seed_caller("p1", 4).await;
    bed.seed_caller("p2", 1).await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    bed.registry.connect("observer", tx).await;

    let provider = CountingProvider::new("this is not json");
    let coordinator = bed.coordinator(provider.clone(), Duration::from_millis(5), 3);
    coordinator.recompute().await;

    let stored = bed.summary_store.get_current().await.unwrap();
    assert_eq!(stored.narrative_summary, "Previously computed narrative");
    assert_eq!(stored.overall_severity, SeverityLevel::Moderate);
    assert_eq!(stored.total_callers, 2);
    assert_eq!(stored.total_injuries, 5);
    assert_eq!(stored.version, 3, "the totals refresh still goes through the swap");

    assert_eq!(provider.calls(), 1, "no retry for an unparseable summary");
    assert!(
        broadcast_versions(&mut rx).is_empty(),
        "clients keep the last good summary"
    );
}
