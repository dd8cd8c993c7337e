use super::prompts;
use super::provider::{CompletionProvider, ProviderError};
use super::rate_limit::RateLimiter;
use crate::model::{
    AffectedArea, CallTotals, DisasterSummary, DisasterType, ExtractedInfo, PersonRecord,
    SeverityLevel,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Failures surfaced by the extraction/summary gateway
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("provider call failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("provider retries exhausted after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    /// Summary response that could not be decoded. Extraction never raises
    /// this; it degrades instead.
    #[error("unparseable summary response: {reason}")]
    Parse { reason: String },
}

/// Shape of the provider's summary JSON, decoded before merging into a
/// `DisasterSummary`. An unrecognized enum value anywhere fails the decode.
#[derive(Debug, Deserialize)]
struct SummaryResponse {
    #[serde(default)]
    overall_severity: SeverityLevel,
    #[serde(default)]
    narrative_summary: String,
    #[serde(default)]
    key_findings: Vec<String>,
    #[serde(default)]
    affected_areas: Vec<AffectedArea>,
    #[serde(default)]
    all_hazards: Vec<String>,
    #[serde(default)]
    resources_needed: Vec<String>,
    #[serde(default)]
    disaster_types: Vec<DisasterType>,
}

/// Gateway to the external text-analysis provider
///
/// Every call takes one rate-limiter token up front, then retries transient
/// provider failures with exponential backoff.
pub struct LlmClient {
    provider: Arc<dyn CompletionProvider>,
    limiter: RateLimiter,
    max_retries: u32,
}

impl LlmClient {
    pub fn new(provider: Arc<dyn CompletionProvider>, requests_per_minute: u32, max_retries: u32) -> Self {
        Self {
            provider,
            limiter: RateLimiter::new(requests_per_minute),
            max_retries,
        }
    }

    /// One rate-limited, retried provider call.
    ///
    /// The token is acquired once per logical request; retries reuse it so
    /// backoff delays do not compound with bucket waits.
    async fn call_provider(&self, system: &str, user: &str) -> Result<String, ExtractError> {
        self.limiter.acquire().await;

        for attempt in 0..self.max_retries {
            match self.provider.complete(system, user).await {
                Ok(text) => return Ok(text),
                Err(err @ ProviderError::RateLimited { .. }) => {
                    let wait = 1u64 << attempt;
                    warn!("Provider rate limit hit, waiting {}s: {}", wait, err);
                    sleep(Duration::from_secs(wait)).await;
                }
                Err(err) if err.is_retryable() && attempt + 1 < self.max_retries => {
                    let wait = 1u64 << attempt;
                    warn!("Transient provider error, retrying in {}s: {}", wait, err);
                    sleep(Duration::from_secs(wait)).await;
                }
                Err(err) => {
                    error!("Provider call failed: {}", err);
                    return Err(err.into());
                }
            }
        }

        Err(ExtractError::RetriesExhausted {
            attempts: self.max_retries,
        })
    }

    /// Extract structured information from a caller's full transcript.
    ///
    /// Provider failures (after retries) are errors; an unparseable response
    /// is not. The pipeline must keep moving, so parse failures return a
    /// degraded `ExtractedInfo` carrying the raw response prefix. A decoded
    /// confidence outside [0, 1] counts as a parse failure.
    pub async fn extract(&self, transcript: &str) -> Result<ExtractedInfo, ExtractError> {
        debug!("Extracting info from transcript ({} chars)", transcript.len());

        let user = prompts::extraction_user(transcript);
        let response = self.call_provider(prompts::EXTRACTION_SYSTEM, &user).await?;

        match serde_json::from_str::<ExtractedInfo>(&strip_code_fences(&response)) {
            Ok(info) if !(0.0..=1.0).contains(&info.confidence) => {
                error!(
                    "Extraction confidence {} outside [0, 1], discarding response",
                    info.confidence
                );
                Ok(ExtractedInfo::degraded(&response))
            }
            Ok(mut info) => {
                info.extracted_at = Utc::now();
                info!(
                    "Extraction complete: severity={}, disaster_type={}",
                    info.severity, info.disaster_type
                );
                Ok(info)
            }
            Err(err) => {
                error!("Failed to parse extraction response: {}", err);
                Ok(ExtractedInfo::degraded(&response))
            }
        }
    }

    /// Generate the aggregate summary from all caller records.
    ///
    /// Raw totals are computed in code and handed to the provider as
    /// context; the provider contributes the narrative fields. Unlike
    /// extraction, a parse failure here propagates so the coordinator can
    /// keep the stored narrative.
    pub async fn summarize(
        &self,
        records: &[PersonRecord],
        current: &DisasterSummary,
    ) -> Result<DisasterSummary, ExtractError> {
        let reports = build_caller_reports(records);
        if reports.is_empty() {
            info!("No caller reports to summarize");
            return Ok(current.clone());
        }

        let totals = CallTotals::from_records(records);
        debug!("Generating summary from {} caller reports", reports.len());

        let user = prompts::summary_user(&reports.join("\n"), &totals);
        let response = self.call_provider(prompts::SUMMARY_SYSTEM, &user).await?;

        let parsed: SummaryResponse = serde_json::from_str(&strip_code_fences(&response))
            .map_err(|err| {
                error!("Failed to parse summary response: {}", err);
                ExtractError::Parse {
                    reason: err.to_string(),
                }
            })?;

        let summary = DisasterSummary {
            summary_id: current.summary_id.clone(),
            version: current.version,
            total_callers: totals.total_callers,
            active_callers: totals.active_callers,
            total_injuries: totals.total_injuries,
            total_fatalities: totals.total_fatalities,
            total_trapped: totals.total_trapped,
            overall_severity: parsed.overall_severity,
            disaster_types: parsed.disaster_types,
            affected_areas: parsed.affected_areas,
            all_hazards: parsed.all_hazards,
            resources_needed: parsed.resources_needed,
            narrative_summary: parsed.narrative_summary,
            key_findings: parsed.key_findings,
            updated_at: Utc::now(),
        };

        info!(
            "Generated summary: severity={}, {} affected areas",
            summary.overall_severity,
            summary.affected_areas.len()
        );
        Ok(summary)
    }
}

/// Drop markdown code fencing the provider sometimes wraps JSON in.
fn strip_code_fences(response: &str) -> String {
    let text = response.trim();
    if !text.starts_with("```") {
        return text.to_string();
    }
    text.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// One human-readable report block per caller with extraction results.
fn build_caller_reports(records: &[PersonRecord]) -> Vec<String> {
    let mut reports = Vec::new();

    for record in records {
        if let Some(info) = &record.extracted_info {
            let mut report = format!("Caller {}:\n", record.person_id);
            if let Some(location) = &info.location {
                report.push_str(&format!("  Location: {}\n", location));
            }
            if info.disaster_type != DisasterType::Unknown {
                report.push_str(&format!("  Disaster: {}\n", info.disaster_type));
            }
            if info.severity != SeverityLevel::Unknown {
                report.push_str(&format!("  Severity: {}\n", info.severity));
            }
            if let Some(injuries) = info.injuries_reported {
                report.push_str(&format!("  Injuries: {}\n", injuries));
            }
            if let Some(fatalities) = info.fatalities_reported {
                report.push_str(&format!("  Fatalities: {}\n", fatalities));
            }
            if let Some(trapped) = info.people_trapped {
                report.push_str(&format!("  Trapped: {}\n", trapped));
            }
            if !info.hazards.is_empty() {
                report.push_str(&format!("  Hazards: {}\n", info.hazards.join(", ")));
            }
            if !info.resources_needed.is_empty() {
                report.push_str(&format!(
                    "  Resources needed: {}\n",
                    info.resources_needed.join(", ")
                ));
            }
            if let Some(notes) = &info.additional_notes {
                report.push_str(&format!("  Notes: {}\n", notes));
            }
            reports.push(report);
        }
    }

    reports
}
