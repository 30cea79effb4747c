//! Engine output normalization.
//!
//! Engines disagree on almost everything: field names, 0- vs 1-based lines,
//! flat arrays vs results nested under a key, plain JSON vs SARIF. This
//! module folds all of those shapes into [`RawMatch`] records. Any record
//! that cannot be interpreted fails the whole output; a half-understood
//! result must never be mistaken for "no matches".

use crate::config::{LineBase, RuleIdStyle};
use crate::error::EngineError;
use serde_json::Value;

const RULE_POINTERS: &[&str] = &["/rule_id", "/ruleId", "/check_id", "/rule", "/rule/id", "/id"];

const LINE_POINTERS: &[&str] = &[
    "/line",
    "/start_line",
    "/start/line",
    "/location/line",
    "/region/startLine",
    "/locations/0/physicalLocation/region/startLine",
];

const PATH_POINTERS: &[&str] = &[
    "/path",
    "/file",
    "/location/path",
    "/locations/0/physicalLocation/artifactLocation/uri",
];

const SPAN_POINTERS: &[&str] = &[
    "/span",
    "/snippet",
    "/text",
    "/extra/lines",
    "/locations/0/physicalLocation/region/snippet/text",
];

/// Keys that may hold the result list inside a top-level object.
const RESULT_KEYS: &[&str] = &["results", "matches", "findings"];

#[derive(Debug, Clone, Copy)]
pub struct NormalizeOptions {
    pub line_base: LineBase,
    pub rule_id_style: RuleIdStyle,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        NormalizeOptions {
            line_base: LineBase::One,
            rule_id_style: RuleIdStyle::Full,
        }
    }
}

/// One normalized engine record. `path` is whatever the engine reported and
/// is only used when a single output covers several files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMatch {
    pub path: Option<String>,
    pub rule_id: String,
    /// 1-based line.
    pub line: usize,
    pub span: Option<String>,
}

/// Parses and normalizes raw engine output.
///
/// # Errors
///
/// [`EngineError::Normalize`] when the text is not JSON, holds no
/// recognizable result list, or any record lacks a rule id or line.
///
/// ```
/// use oxidized_rulecov::engine::normalize::{normalize, NormalizeOptions};
///
/// let raw = r#"{"results": [{"check_id": "openai-chat", "start": {"line": 4}}]}"#;
/// let matches = normalize(raw, &NormalizeOptions::default()).unwrap();
/// assert_eq!(matches[0].rule_id, "openai-chat");
/// assert_eq!(matches[0].line, 4);
/// ```
pub fn normalize(raw: &str, opts: &NormalizeOptions) -> Result<Vec<RawMatch>, EngineError> {
    let root: Value = serde_json::from_str(raw)
        .map_err(|e| EngineError::Normalize(format!("invalid JSON: {e}")))?;

    let records = result_list(&root)?;
    records
        .iter()
        .enumerate()
        .map(|(i, item)| normalize_record(item, opts).map_err(|e| tag_index(e, i)))
        .collect()
}

fn tag_index(err: EngineError, index: usize) -> EngineError {
    match err {
        EngineError::Normalize(msg) => EngineError::Normalize(format!("record {index}: {msg}")),
        other => other,
    }
}

fn result_list(root: &Value) -> Result<Vec<&Value>, EngineError> {
    match root {
        Value::Array(items) => Ok(items.iter().collect()),
        Value::Object(map) => {
            // SARIF: results live under each run.
            if let Some(runs) = map.get("runs").and_then(Value::as_array) {
                let mut out = Vec::new();
                for run in runs {
                    match run.get("results") {
                        Some(Value::Array(results)) => out.extend(results.iter()),
                        None | Some(Value::Null) => {}
                        Some(_) => {
                            return Err(EngineError::Normalize(
                                "SARIF run 'results' is not an array".into(),
                            ))
                        }
                    }
                }
                return Ok(out);
            }

            RESULT_KEYS
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_array))
                .map(|items| items.iter().collect())
                .ok_or_else(|| {
                    EngineError::Normalize(format!(
                        "no result list found (expected an array or one of: {})",
                        RESULT_KEYS.join(", ")
                    ))
                })
        }
        _ => Err(EngineError::Normalize(
            "output is neither an array nor an object".into(),
        )),
    }
}

fn normalize_record(item: &Value, opts: &NormalizeOptions) -> Result<RawMatch, EngineError> {
    if !item.is_object() {
        return Err(EngineError::Normalize("record is not an object".into()));
    }

    let rule = first_str(item, RULE_POINTERS)
        .ok_or_else(|| EngineError::Normalize("missing rule identifier".into()))?;
    let rule_id = match opts.rule_id_style {
        RuleIdStyle::Full => rule.trim(),
        RuleIdStyle::LastSegment => rule.trim().rsplit('.').next().unwrap_or(""),
    };
    if rule_id.is_empty() {
        return Err(EngineError::Normalize("empty rule identifier".into()));
    }

    let reported = first_u64(item, LINE_POINTERS)
        .ok_or_else(|| EngineError::Normalize(format!("missing line for rule '{rule_id}'")))?;
    let line = match opts.line_base {
        LineBase::One if reported == 0 => {
            return Err(EngineError::Normalize(format!(
                "line 0 reported for rule '{rule_id}' with 1-based numbering"
            )))
        }
        LineBase::One => usize::try_from(reported).ok(),
        LineBase::Zero => usize::try_from(reported)
            .ok()
            .and_then(|l| l.checked_add(1)),
    }
    .ok_or_else(|| {
        EngineError::Normalize(format!("line {reported} out of range for rule '{rule_id}'"))
    })?;

    Ok(RawMatch {
        path: first_str(item, PATH_POINTERS).map(|p| p.replace('\\', "/")),
        rule_id: rule_id.to_string(),
        line,
        span: first_str(item, SPAN_POINTERS).map(|s| s.trim().to_string()),
    })
}

fn first_str<'a>(item: &'a Value, pointers: &[&str]) -> Option<&'a str> {
    pointers
        .iter()
        .find_map(|p| item.pointer(p).and_then(Value::as_str))
}

fn first_u64(item: &Value, pointers: &[&str]) -> Option<u64> {
    pointers.iter().find_map(|p| {
        item.pointer(p).and_then(|v| {
            v.as_u64()
                .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
        })
    })
}
