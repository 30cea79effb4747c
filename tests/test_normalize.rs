use oxidized_rulecov::config::{LineBase, RuleIdStyle};
use oxidized_rulecov::engine::normalize::{normalize, NormalizeOptions};
use oxidized_rulecov::error::EngineError;

fn default_opts() -> NormalizeOptions {
    NormalizeOptions::default()
}

// ── accepted shapes ─────────────────────────────────────────────────────────

#[test]
fn semgrep_results_are_normalized() {
    let raw = std::fs::read_to_string("tests/fixtures/matches.json").unwrap();
    let opts = NormalizeOptions {
        line_base: LineBase::One,
        rule_id_style: RuleIdStyle::LastSegment,
    };
    let matches = normalize(&raw, &opts).unwrap();
    assert_eq!(matches.len(), 9);
    assert_eq!(matches[0].rule_id, "anthropic-sdk-imports");
    assert_eq!(matches[0].line, 7);
    assert_eq!(
        matches[0].path.as_deref(),
        Some("tests/fixtures/corpus/anthropic/client.py")
    );
    assert_eq!(matches[0].span.as_deref(), Some("import anthropic"));
}

#[test]
fn full_rule_id_style_keeps_dotted_prefix() {
    let raw = r#"{"results": [{"check_id": "rules.openai.openai-chat", "start": {"line": 3}}]}"#;
    let matches = normalize(raw, &default_opts()).unwrap();
    assert_eq!(matches[0].rule_id, "rules.openai.openai-chat");
}

#[test]
fn flat_array_with_plain_fields() {
    let raw = r#"[{"rule_id": "R1", "line": 2, "path": "a/b.py"}, {"ruleId": "R2", "start_line": "5"}]"#;
    let matches = normalize(raw, &default_opts()).unwrap();
    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].path.as_deref(), Some("a/b.py"));
    assert_eq!(matches[1].rule_id, "R2");
    assert_eq!(matches[1].line, 5);
    assert!(matches[1].path.is_none());
}

#[test]
fn findings_key_is_accepted() {
    let raw = r#"{"findings": [{"rule": "R1", "location": {"line": 4, "path": "x.py"}}]}"#;
    let matches = normalize(raw, &default_opts()).unwrap();
    assert_eq!(matches[0].line, 4);
    assert_eq!(matches[0].path.as_deref(), Some("x.py"));
}

#[test]
fn sarif_runs_are_flattened() {
    let raw = r#"{
        "version": "2.1.0",
        "runs": [
            {"results": [{
                "ruleId": "gemini-import",
                "locations": [{"physicalLocation": {
                    "artifactLocation": {"uri": "gemini\\a.py"},
                    "region": {"startLine": 3}
                }}]
            }]},
            {"results": []},
            {}
        ]
    }"#;
    let matches = normalize(raw, &default_opts()).unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].rule_id, "gemini-import");
    assert_eq!(matches[0].line, 3);
    // Backslashes are folded to forward slashes.
    assert_eq!(matches[0].path.as_deref(), Some("gemini/a.py"));
}

#[test]
fn empty_result_list_is_no_matches() {
    let matches = normalize(r#"{"results": [], "errors": []}"#, &default_opts()).unwrap();
    assert!(matches.is_empty());
}

// ── line numbering ──────────────────────────────────────────────────────────

#[test]
fn zero_based_lines_are_shifted() {
    let opts = NormalizeOptions {
        line_base: LineBase::Zero,
        rule_id_style: RuleIdStyle::Full,
    };
    let matches = normalize(r#"[{"rule_id": "R1", "line": 0}]"#, &opts).unwrap();
    assert_eq!(matches[0].line, 1);
}

#[test]
fn line_zero_with_one_based_numbering_is_rejected() {
    let err = normalize(r#"[{"rule_id": "R1", "line": 0}]"#, &default_opts()).unwrap_err();
    assert!(matches!(err, EngineError::Normalize(ref m) if m.contains("line 0")));
}

// ── rejected output ─────────────────────────────────────────────────────────

#[test]
fn invalid_json_is_an_error_not_empty() {
    let err = normalize("semgrep: command not found", &default_opts()).unwrap_err();
    assert!(matches!(err, EngineError::Normalize(ref m) if m.contains("invalid JSON")));
    assert!(!err.is_retryable());
}

#[test]
fn object_without_result_list_is_rejected() {
    let err = normalize(r#"{"errors": [], "stats": {}}"#, &default_opts()).unwrap_err();
    assert!(matches!(err, EngineError::Normalize(ref m) if m.contains("no result list")));
}

#[test]
fn scalar_output_is_rejected() {
    assert!(normalize("42", &default_opts()).is_err());
}

#[test]
fn record_without_rule_fails_whole_output() {
    let raw = r#"[{"rule_id": "R1", "line": 1}, {"line": 2}]"#;
    let err = normalize(raw, &default_opts()).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("record 1"), "got: {msg}");
    assert!(msg.contains("missing rule identifier"), "got: {msg}");
}

#[test]
fn record_without_line_is_rejected() {
    let err = normalize(r#"[{"rule_id": "R1"}]"#, &default_opts()).unwrap_err();
    assert!(err.to_string().contains("missing line"));
}

#[test]
fn non_object_record_is_rejected() {
    let err = normalize(r#"["R1"]"#, &default_opts()).unwrap_err();
    assert!(err.to_string().contains("not an object"));
}

#[test]
fn zero_based_line_at_integer_limit_is_rejected() {
    let raw = format!(r#"[{{"rule_id": "R1", "line": {}}}]"#, u64::MAX);
    let opts = NormalizeOptions {
        line_base: LineBase::Zero,
        rule_id_style: RuleIdStyle::Full,
    };
    let err = normalize(&raw, &opts).unwrap_err();
    assert!(matches!(err, EngineError::Normalize(_)));
    assert!(err.to_string().contains("out of range"), "got: {err}");
}
