//! Result aggregation
//!
//! Pure transforms from a stage's terminal event (plus, for screening, the
//! session log) into a [`StageResult`]. Each runs once per session.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::model::{
    CompanyRecord, RiskAnalysisResult, RiskCompany, RiskScore, ScreeningResult, SourcingResult,
    Stage, StageResult, StreamingEvent,
};

/// Keys that may hold the company name in a risk entry, in priority order
pub const COMPANY_NAME_KEYS: &[&str] = &[
    "company_name",
    "companyName",
    "Company",
    "Company ",
    "company",
    "name",
];

/// Keys that may hold the overall verdict in a risk entry, in priority order
pub const OVERALL_STATUS_KEYS: &[&str] = &[
    "overall_assessment",
    "overall_result",
    "overall_status",
    "overallStatus",
    "overall",
    "status",
];

const PARAMETER_ANALYSIS_KEYS: &[&str] = &["parameter_analysis", "parameterAnalysis"];
const STATUS_KEYS: &[&str] = &["status", "Status", "result", "verdict"];
const REASON_KEYS: &[&str] = &["reason", "Reason", "explanation", "rationale"];

const UNKNOWN_STATUS: &str = "UNKNOWN";

static LEADING_SYMBOLS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\w\s]+").expect("leading symbol pattern"));

static STEP_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*STEP\s*\d+\s*:").expect("step prefix pattern"));

/// Dispatch to the stage's transform
pub fn aggregate(stage: Stage, terminal: &StreamingEvent, log: &[StreamingEvent]) -> Result<StageResult> {
    let field = stage.terminal().payload_field;
    let payload = terminal.field(field).ok_or_else(|| {
        PipelineError::Protocol(format!(
            "{} terminal event is missing '{field}'",
            stage.label()
        ))
    })?;

    let result = match stage {
        Stage::Sourcing => StageResult::Sourcing(sourcing(payload)?),
        Stage::Screening => StageResult::Screening(screening(payload, log)?),
        Stage::RiskAnalysis => StageResult::RiskAnalysis(risk_analysis(payload)?),
    };
    debug!(stage = %stage, rows = result.primary_len(), "aggregated terminal payload");
    Ok(result)
}

/// `{qualified: [...]}` taken as-is, order and duplicates preserved
pub fn sourcing(payload: &Value) -> Result<SourcingResult> {
    Ok(SourcingResult {
        qualified: records(payload.get("qualified"), "qualified")?,
    })
}

/// `{..., company_details: [...]}` plus the narrative from the log
pub fn screening(payload: &Value, log: &[StreamingEvent]) -> Result<ScreeningResult> {
    let terminal_type = Stage::Screening.terminal().event_type;
    Ok(ScreeningResult {
        company_details: records(payload.get("company_details"), "company_details")?,
        agent_thinking: agent_thinking(log, terminal_type),
    })
}

/// `[{company_name, parameter_analysis, overall_*}, ...]`
pub fn risk_analysis(payload: &Value) -> Result<RiskAnalysisResult> {
    let entries = payload
        .as_array()
        .ok_or_else(|| PipelineError::Protocol("risk results must be an array".to_string()))?;

    let companies = entries
        .iter()
        .enumerate()
        .map(|(i, entry)| risk_company(i, entry))
        .collect::<Result<Vec<_>>>()?;

    Ok(RiskAnalysisResult::new(companies))
}

/// Cleaned narrative lines from every non-terminal event
pub fn agent_thinking(log: &[StreamingEvent], terminal_type: &str) -> Vec<String> {
    log.iter()
        .filter(|ev| ev.event_type != terminal_type)
        .filter_map(StreamingEvent::narrative)
        .filter_map(clean_thinking)
        .collect()
}

/// Strip a leading symbol run and an optional `STEP <n>:` label
pub fn clean_thinking(text: &str) -> Option<String> {
    let text = LEADING_SYMBOLS.replace(text.trim_start(), "");
    let text = STEP_PREFIX.replace(&text, "");
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn records(value: Option<&Value>, field: &str) -> Result<Vec<CompanyRecord>> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::Object(map) => Ok(CompanyRecord::new(map.clone())),
                other => Err(PipelineError::Protocol(format!(
                    "{field}[{i}] is not an object: {other}"
                ))),
            })
            .collect(),
        Some(other) => Err(PipelineError::Protocol(format!(
            "{field} must be an array, got {other}"
        ))),
    }
}

fn risk_company(index: usize, entry: &Value) -> Result<RiskCompany> {
    let obj = entry.as_object().ok_or_else(|| {
        PipelineError::Protocol(format!("risk result {index} is not an object"))
    })?;

    // blank names fall through to the next alias
    let company_name = COMPANY_NAME_KEYS
        .iter()
        .filter_map(|k| obj.get(*k))
        .map(text_of)
        .find(|name| !name.trim().is_empty())
        .unwrap_or_else(|| format!("Company_{}", index + 1));

    let (overall_status, overall_reason) = match first_of(obj, OVERALL_STATUS_KEYS) {
        Some(Value::Object(assessment)) => (
            first_of(assessment, STATUS_KEYS)
                .map_or_else(|| UNKNOWN_STATUS.to_string(), text_of),
            first_of(assessment, REASON_KEYS).map(text_of),
        ),
        Some(other) => (text_of(other), None),
        None => (UNKNOWN_STATUS.to_string(), None),
    };

    let risk_scores = match first_of(obj, PARAMETER_ANALYSIS_KEYS) {
        Some(Value::Object(analysis)) => analysis
            .iter()
            .map(|(category, verdict)| risk_score(category, verdict))
            .collect(),
        _ => Vec::new(),
    };

    Ok(RiskCompany {
        company_name,
        risk_scores,
        overall_status,
        overall_reason,
    })
}

fn risk_score(category: &str, verdict: &Value) -> RiskScore {
    let (status, reason) = match verdict {
        Value::Object(fields) => (
            first_of(fields, STATUS_KEYS).map(text_of).unwrap_or_default(),
            first_of(fields, REASON_KEYS).map(text_of).unwrap_or_default(),
        ),
        other => (text_of(other), String::new()),
    };
    RiskScore {
        category: category.to_string(),
        status,
        reason,
    }
}

fn first_of<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .find_map(|k| obj.get(*k).filter(|v| !v.is_null()))
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(raw: Value) -> StreamingEvent {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn test_sourcing_preserves_order_and_duplicates() {
        let terminal = event(json!({
            "type": "analysis_complete",
            "result": {"qualified": [{"Company ": "B"}, {"Company ": "A"}, {"Company ": "B"}]}
        }));
        let result = aggregate(Stage::Sourcing, &terminal, &[]).unwrap();
        let StageResult::Sourcing(r) = result else {
            panic!("expected sourcing result");
        };
        let names: Vec<_> = r.qualified.iter().filter_map(CompanyRecord::name).collect();
        assert_eq!(names, vec!["B", "A", "B"]);
    }

    #[test]
    fn test_sourcing_missing_list_is_empty() {
        let terminal = event(json!({"type": "analysis_complete", "result": {}}));
        let result = aggregate(Stage::Sourcing, &terminal, &[]).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_missing_payload_field_is_protocol_error() {
        let terminal = event(json!({"type": "final_result"}));
        let err = aggregate(Stage::Screening, &terminal, &[]).unwrap_err();
        assert!(matches!(err, PipelineError::Protocol(_)));
    }

    #[test]
    fn test_clean_thinking() {
        assert_eq!(
            clean_thinking("💭 STEP 2: Agent Thinking\n\nlooking at revenue").as_deref(),
            Some("Agent Thinking\n\nlooking at revenue")
        );
        assert_eq!(
            clean_thinking("✅ step 4: Tool Completed").as_deref(),
            Some("Tool Completed")
        );
        assert_eq!(clean_thinking("plain text").as_deref(), Some("plain text"));
        assert_eq!(clean_thinking("🔧 STEP 3:   "), None);
        assert_eq!(clean_thinking("   "), None);
    }

    #[test]
    fn test_screening_collects_thinking_from_non_terminal_events() {
        let log = vec![
            event(json!({"type": "step_1", "content": "✅ STEP 1: Agent Initialized"})),
            event(json!({"type": "progress"})),
            event(json!({"type": "llm_thinking", "message": "🧠 evaluating 3 companies"})),
            event(json!({"type": "step_2", "content": ""})),
            event(json!({"type": "final_result", "content": {"company_details": []}})),
        ];
        let terminal = event(json!({
            "type": "final_result",
            "content": {"summary": "done", "company_details": [{"Company": "A", "Revenue": 5}]}
        }));

        let result = aggregate(Stage::Screening, &terminal, &log).unwrap();
        let StageResult::Screening(r) = result else {
            panic!("expected screening result");
        };
        assert_eq!(r.company_details.len(), 1);
        assert_eq!(
            r.agent_thinking,
            vec!["Agent Initialized".to_string(), "evaluating 3 companies".to_string()]
        );
    }

    #[test]
    fn test_risk_aliases_and_summary() {
        let terminal = event(json!({
            "type": "session_complete",
            "results": [
                {
                    "company_name": "TestCorp",
                    "parameter_analysis": {
                        "Governance Quality": {"status": "SAFE", "reason": "Strong board"},
                        "Regulatory / Legal Risk": {"Status": "UNSAFE", "Reason": "Open probe"}
                    },
                    "overall_result": "UNSAFE"
                },
                {
                    "Company": "FinanceHub",
                    "parameterAnalysis": {"Competitive Position": "SAFE"},
                    "overall_assessment": {"status": "Safe", "reason": "All clear"}
                },
                {
                    "company": "Third",
                    "overall_status": "safe"
                },
                {}
            ]
        }));

        let result = aggregate(Stage::RiskAnalysis, &terminal, &[]).unwrap();
        let r = result.as_risk().unwrap();

        assert_eq!(r.companies[0].company_name, "TestCorp");
        assert_eq!(r.companies[0].risk_scores.len(), 2);
        assert_eq!(r.companies[0].risk_scores[0].category, "Governance Quality");
        assert_eq!(r.companies[0].risk_scores[1].status, "UNSAFE");
        assert_eq!(r.companies[0].risk_scores[1].reason, "Open probe");

        assert_eq!(r.companies[1].company_name, "FinanceHub");
        assert_eq!(r.companies[1].overall_status, "Safe");
        assert_eq!(r.companies[1].overall_reason.as_deref(), Some("All clear"));
        assert_eq!(r.companies[1].risk_scores[0].status, "SAFE");
        assert_eq!(r.companies[1].risk_scores[0].reason, "");

        assert!(r.companies[2].risk_scores.is_empty());

        assert_eq!(r.companies[3].company_name, "Company_4");
        assert_eq!(r.companies[3].overall_status, "UNKNOWN");

        assert_eq!(r.summary.total, 4);
        assert_eq!(r.summary.passed, 2);
    }

    #[test]
    fn test_risk_company_name_skips_blank_and_stringifies() {
        let terminal = event(json!({
            "type": "session_complete",
            "results": [
                {"company_name": "", "Company": "Acme"},
                {"company_name": 4012},
                {"company_name": null},
            ]
        }));
        let Ok(StageResult::RiskAnalysis(result)) = aggregate(Stage::RiskAnalysis, &terminal, &[]) else {
            panic!("expected risk result");
        };
        let names: Vec<&str> = result.companies.iter().map(|c| c.company_name.as_str()).collect();
        assert_eq!(names, vec!["Acme", "4012", "Company_3"]);
    }

    #[test]
    fn test_risk_non_array_is_protocol_error() {
        let err = risk_analysis(&json!({"results": []})).unwrap_err();
        assert!(matches!(err, PipelineError::Protocol(_)));
    }
}
