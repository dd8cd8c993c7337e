// Integration tests for the extraction gateway
//
// Covers token-bucket pacing, retry with exponential backoff, tolerant
// parsing of fenced and malformed provider responses, and summary
// generation from caller records. Timing tests run on the paused tokio
// clock so no wall time is spent.

use async_trait::async_trait;
use sitrep::llm::{CompletionProvider, ExtractError, LlmClient, ProviderError, RateLimiter};
use sitrep::model::{DisasterSummary, DisasterType, ExtractedInfo, PersonRecord, SeverityLevel};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Replays a scripted sequence of provider results, then empty objects.
struct ScriptedProvider {
    responses: Mutex<VecDeque<Result<String, ProviderError>>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    fn new(responses: Vec<Result<String, ProviderError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().collect()),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut responses = self.responses.lock().await;
        responses.pop_front().unwrap_or_else(|| Ok("{}".to_string()))
    }
}

fn rate_limited() -> ProviderError {
    ProviderError::RateLimited {
        message: "429".to_string(),
    }
}

fn record_with_info(person_id: &str) -> PersonRecord {
    let mut record = PersonRecord::new(person_id);
    let mut info = ExtractedInfo::default();
    info.location = Some("Oak Street".to_string());
    info.disaster_type = DisasterType::Fire;
    info.severity = SeverityLevel::High;
    info.injuries_reported = Some(3);
    record.extracted_info = Some(info);
    record
}

#[tokio::test(start_paused = true)]
async fn test_rate_limiter_delays_burst_beyond_capacity() {
    // 6 requests per minute: capacity 6 tokens, refill 0.1 tokens/sec
    let limiter = RateLimiter::new(6);
    let start = Instant::now();

    for _ in 0..6 {
        limiter.acquire().await;
    }
    assert!(
        start.elapsed() < Duration::from_secs(1),
        "burst within capacity should not wait"
    );

    limiter.acquire().await;
    let elapsed = start.elapsed();
    assert!(
        elapsed >= Duration::from_secs(10),
        "seventh acquire should wait a full refill period, waited {:?}",
        elapsed
    );
}

#[tokio::test(start_paused = true)]
async fn test_rate_limiter_tokens_accrue_while_idle() {
    let limiter = RateLimiter::new(60); // 1 token/sec
    limiter.acquire().await;

    // After a 3s idle stretch the next two acquires are free
    tokio::time::sleep(Duration::from_secs(3)).await;
    let start = Instant::now();
    limiter.acquire().await;
    limiter.acquire().await;
    assert!(start.elapsed() < Duration::from_millis(100));
}

#[tokio::test(start_paused = true)]
async fn test_transient_errors_retry_with_backoff() {
    let provider = ScriptedProvider::new(vec![
        Err(rate_limited()),
        Err(ProviderError::Api {
            status: 500,
            message: "upstream".to_string(),
        }),
        Ok(r#"{"confidence": 0.8, "severity": "high"}"#.to_string()),
    ]);
    let client = LlmClient::new(provider.clone(), 600, 3);

    let start = Instant::now();
    let info = client.extract("fire on main street").await.unwrap();

    assert_eq!(provider.calls(), 3);
    assert_eq!(info.severity, SeverityLevel::High);
    assert_eq!(info.confidence, 0.8);
    // 1s after the first failure, 2s after the second
    assert!(start.elapsed() >= Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_errors_exhaust_retries() {
    let provider = ScriptedProvider::new(vec![
        Err(rate_limited()),
        Err(rate_limited()),
        Err(rate_limited()),
    ]);
    let client = LlmClient::new(provider.clone(), 600, 3);

    let start = Instant::now();
    let err = client.extract("anything").await.unwrap_err();

    assert!(matches!(err, ExtractError::RetriesExhausted { attempts: 3 }));
    assert_eq!(provider.calls(), 3);
    // Rate-limit hits back off even on the last attempt: 1s + 2s + 4s
    assert!(start.elapsed() >= Duration::from_secs(7));
}

#[tokio::test]
async fn test_auth_errors_do_not_retry() {
    let provider = ScriptedProvider::new(vec![Err(ProviderError::Auth {
        message: "bad key".to_string(),
    })]);
    let client = LlmClient::new(provider.clone(), 600, 3);

    let err = client.extract("anything").await.unwrap_err();
    assert!(matches!(
        err,
        ExtractError::Provider(ProviderError::Auth { .. })
    ));
    assert_eq!(provider.calls(), 1, "auth failures must not be retried");
}

#[tokio::test]
async fn test_client_errors_do_not_retry() {
    let provider = ScriptedProvider::new(vec![Err(ProviderError::Api {
        status: 400,
        message: "bad request".to_string(),
    })]);
    let client = LlmClient::new(provider.clone(), 600, 3);

    let err = client.extract("anything").await.unwrap_err();
    assert!(matches!(
        err,
        ExtractError::Provider(ProviderError::Api { status: 400, .. })
    ));
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn test_fenced_extraction_response_parses() {
    let fenced =
        "```json\n{\"location\": \"12 Pine Rd\", \"disaster_type\": \"flood\", \"confidence\": 0.9}\n```";
    let provider = ScriptedProvider::new(vec![Ok(fenced.to_string())]);
    let client = LlmClient::new(provider, 600, 3);

    let info = client.extract("water rising fast").await.unwrap();
    assert_eq!(info.location.as_deref(), Some("12 Pine Rd"));
    assert_eq!(info.disaster_type, DisasterType::Flood);
    assert_eq!(info.confidence, 0.9);
}

#[tokio::test]
async fn test_malformed_extraction_degrades_without_error() {
    let provider =
        ScriptedProvider::new(vec![Ok("The building is on fire, I think.".to_string())]);
    let client = LlmClient::new(provider, 600, 3);

    let info = client.extract("help").await.unwrap();
    assert_eq!(info.confidence, 0.0);
    assert_eq!(info.disaster_type, DisasterType::Unknown);

    let notes = info.additional_notes.unwrap();
    assert!(notes.starts_with("Extraction failed:"));
    assert!(notes.contains("The building is on fire"));
}

#[tokio::test]
async fn test_unrecognized_enum_value_degrades() {
    let provider = ScriptedProvider::new(vec![Ok(
        r#"{"disaster_type": "alien_invasion", "confidence": 0.9}"#.to_string(),
    )]);
    let client = LlmClient::new(provider, 600, 3);

    let info = client.extract("something strange").await.unwrap();
    assert_eq!(info.confidence, 0.0);
    assert_eq!(info.disaster_type, DisasterType::Unknown);
    assert!(info.additional_notes.unwrap().starts_with("Extraction failed:"));
}

#[tokio::test]
async fn test_out_of_range_confidence_degrades() {
    let provider = ScriptedProvider::new(vec![
        Ok(r#"{"location": "Main St bridge", "disaster_type": "flood", "confidence": 4.2}"#
            .to_string()),
        Ok(r#"{"location": "Main St bridge", "confidence": -0.3}"#.to_string()),
    ]);
    let client = LlmClient::new(provider, 600, 3);

    let info = client.extract("water over the bridge").await.unwrap();
    assert_eq!(info.confidence, 0.0);
    assert_eq!(
        info.location, None,
        "out-of-range responses are discarded whole"
    );
    assert!(info.additional_notes.unwrap().starts_with("Extraction failed:"));

    let info = client.extract("water still rising").await.unwrap();
    assert_eq!(info.confidence, 0.0);
    assert!(info.additional_notes.unwrap().starts_with("Extraction failed:"));
}

#[tokio::test]
async fn test_degraded_notes_keep_bounded_prefix() {
    let long_response = "x".repeat(2000);
    let provider = ScriptedProvider::new(vec![Ok(long_response)]);
    let client = LlmClient::new(provider, 600, 3);

    let info = client.extract("help").await.unwrap();
    let notes = info.additional_notes.unwrap();
    assert_eq!(notes.len(), "Extraction failed: ".len() + 500);
}

#[tokio::test]
async fn test_summarize_merges_provider_fields_with_computed_totals() {
    let response = r#"{
        "overall_severity": "critical",
        "narrative_summary": "A large fire is spreading near Oak Street.",
        "key_findings": ["Evacuate Oak Street"],
        "affected_areas": [{"location": "Oak Street", "caller_count": 2, "max_severity": "critical", "disaster_types": ["fire"]}],
        "all_hazards": ["smoke"],
        "resources_needed": ["fire truck"],
        "disaster_types": ["fire"]
    }"#;
    let provider = ScriptedProvider::new(vec![Ok(response.to_string())]);
    let client = LlmClient::new(provider, 600, 3);

    let mut ended = record_with_info("p2");
    ended.is_active = false;
    let records = vec![record_with_info("p1"), ended];
    let current = DisasterSummary::new_current();

    let summary = client.summarize(&records, &current).await.unwrap();
    // Totals come from code, not the provider
    assert_eq!(summary.total_callers, 2);
    assert_eq!(summary.active_callers, 1);
    assert_eq!(summary.total_injuries, 6);
    // Narrative fields come from the provider
    assert_eq!(summary.overall_severity, SeverityLevel::Critical);
    assert_eq!(
        summary.narrative_summary,
        "A large fire is spreading near Oak Street."
    );
    assert_eq!(summary.affected_areas.len(), 1);
    assert_eq!(summary.affected_areas[0].location, "Oak Street");
    // Version is untouched; the store assigns it at swap time
    assert_eq!(summary.version, current.version);
    assert_eq!(summary.summary_id, current.summary_id);
}

#[tokio::test]
async fn test_summarize_propagates_parse_failure() {
    let provider = ScriptedProvider::new(vec![Ok("no json here".to_string())]);
    let client = LlmClient::new(provider.clone(), 600, 3);

    let records = vec![record_with_info("p1")];
    let err = client
        .summarize(&records, &DisasterSummary::new_current())
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::Parse { .. }));
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn test_summarize_without_reports_skips_provider() {
    let provider = ScriptedProvider::new(vec![]);
    let client = LlmClient::new(provider.clone(), 600, 3);

    // Records exist but none carry extraction results yet
    let records = vec![PersonRecord::new("p1"), PersonRecord::new("p2")];
    let current = DisasterSummary::new_current();

    let summary = client.summarize(&records, &current).await.unwrap();
    assert_eq!(summary.version, current.version);
    assert_eq!(summary.total_callers, 0);
    assert_eq!(provider.calls(), 0, "no provider call without caller reports");
}
