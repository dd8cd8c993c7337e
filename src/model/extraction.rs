use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of emergency reported by a caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisasterType {
    #[default]
    Unknown,
    Fire,
    Flood,
    Earthquake,
    Tornado,
    Hurricane,
    Explosion,
    ChemicalSpill,
    BuildingCollapse,
    TrafficAccident,
    Other,
}

impl DisasterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisasterType::Unknown => "unknown",
            DisasterType::Fire => "fire",
            DisasterType::Flood => "flood",
            DisasterType::Earthquake => "earthquake",
            DisasterType::Tornado => "tornado",
            DisasterType::Hurricane => "hurricane",
            DisasterType::Explosion => "explosion",
            DisasterType::ChemicalSpill => "chemical_spill",
            DisasterType::BuildingCollapse => "building_collapse",
            DisasterType::TrafficAccident => "traffic_accident",
            DisasterType::Other => "other",
        }
    }
}

impl fmt::Display for DisasterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Assessed severity of an incident
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeverityLevel {
    #[default]
    Unknown,
    Low,
    Moderate,
    High,
    Critical,
}

impl SeverityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeverityLevel::Unknown => "unknown",
            SeverityLevel::Low => "low",
            SeverityLevel::Moderate => "moderate",
            SeverityLevel::High => "high",
            SeverityLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured facts extracted from a caller's transcript
///
/// Produced by the extraction gateway. All fields are optional because the
/// provider only fills in what the transcript supports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedInfo {
    /// Address, landmark, or description of the incident location
    #[serde(default)]
    pub location: Option<String>,

    /// Finer-grained location detail (floor, wing, cross street)
    #[serde(default)]
    pub location_details: Option<String>,

    #[serde(default)]
    pub disaster_type: DisasterType,

    #[serde(default)]
    pub severity: SeverityLevel,

    #[serde(default)]
    pub injuries_reported: Option<u32>,

    #[serde(default)]
    pub fatalities_reported: Option<u32>,

    #[serde(default)]
    pub people_trapped: Option<u32>,

    /// Hazards the caller mentioned (fire, gas leak, structural damage...)
    #[serde(default)]
    pub hazards: Vec<String>,

    /// Resources the caller asked for (ambulance, rescue team...)
    #[serde(default)]
    pub resources_needed: Vec<String>,

    #[serde(default)]
    pub caller_condition: Option<String>,

    #[serde(default)]
    pub additional_notes: Option<String>,

    /// Provider confidence in the extraction (0.0 to 1.0)
    #[serde(default)]
    pub confidence: f64,

    #[serde(default = "Utc::now")]
    pub extracted_at: DateTime<Utc>,
}

impl Default for ExtractedInfo {
    fn default() -> Self {
        Self {
            location: None,
            location_details: None,
            disaster_type: DisasterType::Unknown,
            severity: SeverityLevel::Unknown,
            injuries_reported: None,
            fatalities_reported: None,
            people_trapped: None,
            hazards: Vec::new(),
            resources_needed: Vec::new(),
            caller_condition: None,
            additional_notes: None,
            confidence: 0.0,
            extracted_at: Utc::now(),
        }
    }
}

impl ExtractedInfo {
    /// Fallback value used when a provider response cannot be parsed.
    /// Keeps a bounded prefix of the raw response for operator triage.
    pub fn degraded(raw_response: &str) -> Self {
        let prefix: String = raw_response.chars().take(500).collect();
        Self {
            additional_notes: Some(format!("Extraction failed: {}", prefix)),
            confidence: 0.0,
            ..Default::default()
        }
    }
}
