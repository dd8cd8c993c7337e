use super::extraction::{DisasterType, SeverityLevel};
use super::person::PersonRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of the single aggregate summary document
pub const CURRENT_SUMMARY_ID: &str = "current";

/// One geographic cluster of callers within the aggregate summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AffectedArea {
    pub location: String,

    #[serde(default)]
    pub caller_count: u32,

    #[serde(default)]
    pub max_severity: SeverityLevel,

    #[serde(default)]
    pub disaster_types: Vec<DisasterType>,
}

/// The versioned aggregate situation view across all callers
///
/// Mutated only through the summary store's compare-and-swap, which bumps
/// `version` by exactly one per applied write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisasterSummary {
    pub summary_id: String,

    /// Optimistic-concurrency version, starts at 1
    pub version: u64,

    pub total_callers: usize,
    pub active_callers: usize,
    pub total_injuries: u32,
    pub total_fatalities: u32,
    pub total_trapped: u32,

    pub overall_severity: SeverityLevel,

    /// All disaster types reported across callers
    pub disaster_types: Vec<DisasterType>,

    pub affected_areas: Vec<AffectedArea>,

    /// Consolidated hazard list across callers
    pub all_hazards: Vec<String>,

    /// Consolidated resource requests across callers
    pub resources_needed: Vec<String>,

    /// Narrative overview written by the summary provider
    pub narrative_summary: String,

    pub key_findings: Vec<String>,

    pub updated_at: DateTime<Utc>,
}

impl DisasterSummary {
    /// The default document created on first access, version 1.
    pub fn new_current() -> Self {
        Self {
            summary_id: CURRENT_SUMMARY_ID.to_string(),
            version: 1,
            total_callers: 0,
            active_callers: 0,
            total_injuries: 0,
            total_fatalities: 0,
            total_trapped: 0,
            overall_severity: SeverityLevel::Unknown,
            disaster_types: Vec::new(),
            affected_areas: Vec::new(),
            all_hazards: Vec::new(),
            resources_needed: Vec::new(),
            narrative_summary: String::new(),
            key_findings: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// Overwrite the raw numeric counters, leaving narrative fields alone.
    pub fn apply_totals(&mut self, totals: &CallTotals) {
        self.total_callers = totals.total_callers;
        self.active_callers = totals.active_callers;
        self.total_injuries = totals.total_injuries;
        self.total_fatalities = totals.total_fatalities;
        self.total_trapped = totals.total_trapped;
    }
}

/// Raw caller counters computed in code, independent of the provider
#[derive(Debug, Clone, Copy, Default)]
pub struct CallTotals {
    pub total_callers: usize,
    pub active_callers: usize,
    pub total_injuries: u32,
    pub total_fatalities: u32,
    pub total_trapped: u32,
}

impl CallTotals {
    /// Casualty sums saturate rather than wrap; the counters are fed by
    /// untrusted provider output.
    pub fn from_records(records: &[PersonRecord]) -> Self {
        let mut totals = CallTotals::default();
        for record in records {
            totals.total_callers += 1;
            if record.is_active {
                totals.active_callers += 1;
            }
            if let Some(info) = &record.extracted_info {
                totals.total_injuries = totals
                    .total_injuries
                    .saturating_add(info.injuries_reported.unwrap_or(0));
                totals.total_fatalities = totals
                    .total_fatalities
                    .saturating_add(info.fatalities_reported.unwrap_or(0));
                totals.total_trapped = totals
                    .total_trapped
                    .saturating_add(info.people_trapped.unwrap_or(0));
            }
        }
        totals
    }
}
