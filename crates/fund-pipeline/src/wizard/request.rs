//! Initiating request bodies, one shape per stage

use serde_json::{Map, Value, json};

use crate::model::{CompanyRecord, Parameter, Stage};

/// Build the single message sent when a stage's session opens
pub fn stage_request(stage: Stage, parameters: &[&Parameter], companies: &[&CompanyRecord]) -> Value {
    match stage {
        Stage::Sourcing => json!({ "additionalProp1": snake_case_map(parameters) }),
        Stage::Screening => json!({
            "mandate_parameters": snake_case_map(parameters),
            "companies": companies,
        }),
        Stage::RiskAnalysis => json!({
            "companies": companies,
            "risk_parameters": display_key_map(parameters),
        }),
    }
}

fn snake_case_map(parameters: &[&Parameter]) -> Map<String, Value> {
    parameters
        .iter()
        .map(|p| (p.snake_key(), Value::String(p.value.clone())))
        .collect()
}

/// The risk engine matches categories by their displayed label
fn display_key_map(parameters: &[&Parameter]) -> Map<String, Value> {
    parameters
        .iter()
        .map(|p| (p.key.clone(), Value::String(p.value.clone())))
        .collect()
}
