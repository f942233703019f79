//! Normalisation of step-generator output and editor submissions.
//!
//! Generated step lists are loosely typed: they may arrive wrapped in a
//! markdown fence, wrapped in a `{"steps": [...]}` envelope, with link objects
//! serialized as JSON strings, or with individual steps missing required
//! fields. Everything recoverable is recovered here and reported as a warning;
//! only a response that is not a step list at all is an error.

use crate::{FlowGraph, IntakeError, Step};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Steps parsed from generator output, plus what had to be dropped.
#[derive(Debug, Clone, Default)]
pub struct StepList {
    pub steps: Vec<Step>,
    pub warnings: Vec<String>,
}

/// Extract JSON from text that may be wrapped in markdown code fences.
pub fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();
    if let Some(start) = trimmed.find("```json") {
        let after_fence = &trimmed[start + 7..];
        if let Some(end) = after_fence.find("```") {
            return after_fence[..end].trim();
        }
    }
    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        if let Some(end) = after_fence.find("```") {
            return after_fence[..end].trim();
        }
    }
    trimmed
}

/// Parse a slice of raw JSON values into typed items, skipping malformed
/// entries with warnings. Uses the `"id"` field (if present) to label
/// warnings; falls back to the array index.
pub(crate) fn parse_lenient<T: serde::de::DeserializeOwned>(raw: &[Value]) -> (Vec<T>, Vec<String>) {
    let mut items = Vec::new();
    let mut warnings = Vec::new();
    for (i, val) in raw.iter().enumerate() {
        match serde_json::from_value::<T>(val.clone()) {
            Ok(item) => items.push(item),
            Err(e) => {
                let label = val
                    .get("id")
                    .and_then(|v| v.as_str())
                    .or_else(|| val.get("title").and_then(|v| v.as_str()))
                    .map(String::from)
                    .unwrap_or_else(|| format!("#{}", i));
                warnings.push(format!("'{}' skipped (malformed): {}", label, e));
            }
        }
    }
    (items, warnings)
}

/// Parse raw generator text into a step list.
pub fn parse_step_list(text: &str) -> Result<StepList, IntakeError> {
    let value: Value = serde_json::from_str(extract_json(text))?;
    step_list_from_value(value)
}

/// Same as [`parse_step_list`] for an already-decoded JSON value.
pub fn step_list_from_value(value: Value) -> Result<StepList, IntakeError> {
    let raw_steps = match value {
        Value::Array(steps) => steps,
        Value::Object(mut map) => {
            if let Some(reason) = refusal_reason(&map) {
                return Err(IntakeError::Refused(reason));
            }
            match map.remove("steps") {
                Some(Value::Array(steps)) => steps,
                _ => return Err(IntakeError::NotAStepList("an object without a steps array")),
            }
        }
        other => return Err(IntakeError::NotAStepList(json_kind(&other))),
    };

    let mut warnings = Vec::new();
    let raw_steps: Vec<Value> = raw_steps
        .into_iter()
        .map(|step| normalize_targets(step, &mut warnings))
        .collect();

    let (steps, step_warnings) = parse_lenient::<Step>(&raw_steps);
    for warning in &step_warnings {
        warn!("Step {}", warning);
    }
    warnings.extend(step_warnings.into_iter().map(|w| format!("Step {}", w)));

    debug!("Parsed {} of {} generated steps", steps.len(), raw_steps.len());
    Ok(StepList { steps, warnings })
}

/// Parse a flow graph submitted by the diagram editor.
pub fn parse_flow_graph(text: &str) -> Result<FlowGraph, IntakeError> {
    let value: Value = serde_json::from_str(extract_json(text))?;
    flow_graph_from_value(value)
}

pub fn flow_graph_from_value(value: Value) -> Result<FlowGraph, IntakeError> {
    let has_arrays = value.get("nodes").is_some_and(Value::is_array)
        && value.get("edges").is_some_and(Value::is_array);
    if !has_arrays {
        return Err(IntakeError::InvalidFlow(
            "expected nodes and edges arrays".to_string(),
        ));
    }
    serde_json::from_value(value).map_err(|e| IntakeError::InvalidFlow(e.to_string()))
}

/// A `{"status": "400", "reason": ...}` object is the generator declining the task.
fn refusal_reason(map: &Map<String, Value>) -> Option<String> {
    let refused = match map.get("status")? {
        Value::String(s) => s == "400",
        Value::Number(n) => n.as_u64() == Some(400),
        _ => false,
    };
    if !refused {
        return None;
    }
    let reason = ["reason", "error"]
        .iter()
        .find_map(|key| map.get(*key).and_then(Value::as_str))
        .unwrap_or("AI could not create workflow.");
    Some(reason.to_string())
}

/// Decode link objects that were emitted as JSON strings and drop entries
/// that turn out to be empty. Other entries are left for the converter to
/// judge.
fn normalize_targets(mut step: Value, warnings: &mut Vec<String>) -> Value {
    let step_id = step
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or("?")
        .to_string();
    if let Some(Value::Array(targets)) = step.get_mut("target_id") {
        for entry in std::mem::take(targets) {
            match entry {
                Value::String(s) if s.trim_start().starts_with('{') => {
                    match serde_json::from_str::<Value>(&s) {
                        Ok(parsed) => targets.push(parsed),
                        Err(e) => {
                            warn!("Dropped unparseable link on step '{}': {}", step_id, s);
                            warnings.push(format!(
                                "Step '{}': dropped unparseable link {}: {}",
                                step_id, s, e
                            ));
                        }
                    }
                }
                Value::Null => {}
                other => targets.push(other),
            }
        }
    }
    step
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Link, StepType};
    use serde_json::json;

    #[test]
    fn test_extract_json_plain() {
        let input = r#"[{"id": "t"}]"#;
        assert_eq!(extract_json(input), input);
    }

    #[test]
    fn test_extract_json_code_fence() {
        let input = "```json\n[]\n```";
        assert_eq!(extract_json(input), "[]");
    }

    #[test]
    fn test_extract_json_plain_fence() {
        let input = "Here you go:\n```\n{\"steps\": []}\n```";
        assert_eq!(extract_json(input), r#"{"steps": []}"#);
    }

    #[test]
    fn test_parse_bare_array() {
        let list = parse_step_list(
            r#"[{"id": "t", "type": "trigger", "step_no": 1, "title": "Webhook",
                 "description": "d", "target_id": [{"id": "s1"}]}]"#,
        )
        .unwrap();
        assert_eq!(list.steps.len(), 1);
        assert_eq!(list.steps[0].step_type, StepType::Trigger);
        assert!(list.warnings.is_empty());
    }

    #[test]
    fn test_parse_steps_envelope() {
        let list = step_list_from_value(json!({
            "steps": [{"id": "t", "type": "trigger", "target_id": []}]
        }))
        .unwrap();
        assert_eq!(list.steps.len(), 1);
    }

    #[test]
    fn test_refusal_is_an_error() {
        let err = parse_step_list(r#"{"status": "400", "reason": "No trigger fits"}"#).unwrap_err();
        match err {
            IntakeError::Refused(reason) => assert_eq!(reason, "No trigger fits"),
            other => panic!("expected refusal, got {:?}", other),
        }

        let err = step_list_from_value(json!({"status": "400"})).unwrap_err();
        assert!(matches!(err, IntakeError::Refused(r) if r == "AI could not create workflow."));
    }

    #[test]
    fn test_non_list_is_an_error() {
        assert!(matches!(
            step_list_from_value(json!("steps")),
            Err(IntakeError::NotAStepList("a string"))
        ));
        assert!(matches!(
            step_list_from_value(json!({"nodes": []})),
            Err(IntakeError::NotAStepList(_))
        ));
        assert!(matches!(parse_step_list("not json"), Err(IntakeError::Json(_))));
    }

    #[test]
    fn test_stringified_links_are_decoded() {
        let list = step_list_from_value(json!([{
            "id": "c1",
            "type": "if",
            "target_id": [
                "{\"id\": \"s2\", \"label\": \"yes\"}",
                "{broken",
                null,
                {"id": "s3", "label": "no"}
            ]
        }]))
        .unwrap();

        let links = list.steps[0].target_id.links().unwrap();
        assert_eq!(links, &[Link::labeled("s2", "yes"), Link::labeled("s3", "no")]);
        assert_eq!(list.warnings.len(), 1);
        assert!(list.warnings[0].contains("c1"));
    }

    #[test]
    fn test_flat_string_links_are_left_malformed() {
        let list = step_list_from_value(json!([
            {"id": "a", "type": "ability", "target_id": ["b"]}
        ]))
        .unwrap();
        assert!(list.steps[0].target_id.is_malformed());
    }

    #[test]
    fn test_malformed_step_is_skipped_with_warning() {
        let list = step_list_from_value(json!([
            {"id": "t", "type": "trigger"},
            {"id": "s1", "title": "Missing type"},
            {"type": "ability"},
            {"id": 4, "title": "Numeric id"}
        ]))
        .unwrap();
        assert_eq!(list.steps.len(), 2);
        assert_eq!(list.steps[1].step_type, StepType::Unknown);
        assert_eq!(list.warnings.len(), 2);
        assert!(list.warnings[0].contains("#2"));
        assert!(list.warnings[1].contains("'Numeric id'"));
    }

    #[test]
    fn test_parse_flow_graph_requires_nodes_and_edges() {
        assert!(matches!(
            parse_flow_graph(r#"{"nodes": []}"#),
            Err(IntakeError::InvalidFlow(_))
        ));
        let graph = parse_flow_graph(r#"{"nodes": [], "edges": []}"#).unwrap();
        assert!(graph.nodes.is_empty());
    }

    #[test]
    fn test_parse_flow_graph_reports_bad_node() {
        let err = flow_graph_from_value(json!({"nodes": [{"data": {}}], "edges": []})).unwrap_err();
        assert!(matches!(err, IntakeError::InvalidFlow(msg) if msg.contains("id")));
    }
}
