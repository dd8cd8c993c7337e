//! Prompt templates for extraction and summarization
//!
//! The JSON field lists in the user templates are the response contract the
//! client parses against; keep them in sync with the model types.

use crate::model::CallTotals;

pub const EXTRACTION_SYSTEM: &str = "You are an emergency call information extraction assistant. Your job is to extract structured information from emergency call transcripts.

Extract the following information when available:
- Location (address, landmark, or description)
- Location details (floor number, specific area, landmarks)
- Type of disaster/emergency
- Severity assessment (low, moderate, high, critical)
- Number of injuries
- Number of fatalities
- Number of people trapped
- Hazards present (fire, gas leak, structural damage, etc.)
- Resources needed (ambulance, fire truck, police, rescue team, etc.)
- Caller's condition
- Any additional relevant notes

Be conservative in your assessments. Only include information that is explicitly stated or strongly implied by the caller. If information is unclear or not provided, leave those fields empty.

For severity assessment:
- low: Minor incident, no immediate danger
- moderate: Significant incident, some danger present
- high: Serious incident, significant danger, urgent response needed
- critical: Life-threatening, mass casualty potential, immediate response critical

Respond with valid JSON only.";

const EXTRACTION_USER_TEMPLATE: &str = "Extract emergency information from the following call transcript:

<transcript>
{transcript}
</transcript>

Respond with a JSON object containing these fields:
{
    \"location\": string or null,
    \"location_details\": string or null,
    \"disaster_type\": one of [\"unknown\", \"fire\", \"flood\", \"earthquake\", \"tornado\", \"hurricane\", \"explosion\", \"chemical_spill\", \"building_collapse\", \"traffic_accident\", \"other\"],
    \"severity\": one of [\"unknown\", \"low\", \"moderate\", \"high\", \"critical\"],
    \"injuries_reported\": number or null,
    \"fatalities_reported\": number or null,
    \"people_trapped\": number or null,
    \"hazards\": array of strings,
    \"resources_needed\": array of strings,
    \"caller_condition\": string or null,
    \"additional_notes\": string or null,
    \"confidence\": number between 0 and 1
}";

pub const SUMMARY_SYSTEM: &str = "You are a disaster coordination assistant. Your job is to synthesize information from multiple emergency callers into a coherent overall situation summary.

Analyze all caller information to:
1. Identify patterns and common themes
2. Assess the overall scope and severity of the disaster
3. Prioritize areas and needs
4. Create an actionable summary for emergency responders

Be factual and precise. Focus on actionable information. Highlight critical needs and high-priority areas.";

const SUMMARY_USER_TEMPLATE: &str = "Based on the following caller reports, create an aggregate disaster summary.

<caller_reports>
{caller_reports}
</caller_reports>

Current statistics:
- Total callers: {total_callers}
- Active callers: {active_callers}
- Total injuries reported: {total_injuries}
- Total fatalities reported: {total_fatalities}
- Total people trapped: {total_trapped}

Provide your analysis as a JSON object:
{
    \"overall_severity\": one of [\"unknown\", \"low\", \"moderate\", \"high\", \"critical\"],
    \"narrative_summary\": \"A 2-3 paragraph summary of the overall situation\",
    \"key_findings\": [\"List of 3-5 key findings and priorities\"],
    \"affected_areas\": [
        {
            \"location\": \"area name\",
            \"caller_count\": number,
            \"max_severity\": \"severity level\",
            \"disaster_types\": [\"type1\", \"type2\"]
        }
    ],
    \"all_hazards\": [\"consolidated list of all hazards\"],
    \"resources_needed\": [\"consolidated list of all needed resources\"],
    \"disaster_types\": [\"all disaster types reported\"]
}";

pub fn extraction_user(transcript: &str) -> String {
    EXTRACTION_USER_TEMPLATE.replace("{transcript}", transcript)
}

pub fn summary_user(caller_reports: &str, totals: &CallTotals) -> String {
    SUMMARY_USER_TEMPLATE
        .replace("{caller_reports}", caller_reports)
        .replace("{total_callers}", &totals.total_callers.to_string())
        .replace("{active_callers}", &totals.active_callers.to_string())
        .replace("{total_injuries}", &totals.total_injuries.to_string())
        .replace("{total_fatalities}", &totals.total_fatalities.to_string())
        .replace("{total_trapped}", &totals.total_trapped.to_string())
}
