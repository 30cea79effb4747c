use oxidized_rulecov::annotation::{is_valid_rule_id, parse, AnnotationSyntax};

fn parse_default(text: &str) -> oxidized_rulecov::annotation::Annotations {
    parse(text, &AnnotationSyntax::default()).expect("annotations should parse")
}

fn parse_err(text: &str) -> oxidized_rulecov::error::AnnotationError {
    parse(text, &AnnotationSyntax::default()).expect_err("annotations should be rejected")
}

// ── expect ──────────────────────────────────────────────────────────────────

#[test]
fn inline_expect_targets_its_own_line() {
    let parsed = parse_default("import os\nimport anthropic  # rulecov: expect anthropic-sdk-imports\n");
    assert_eq!(parsed.expectations.len(), 1);
    assert_eq!(parsed.expectations[0].rule_id, "anthropic-sdk-imports");
    assert_eq!(parsed.expectations[0].line, 2);
    assert_eq!(parsed.expectations[0].marker_line, 2);
}

#[test]
fn standalone_expect_targets_next_code_line() {
    let text = "# rulecov: expect openai-chat\n\n# unrelated comment\nresp = client.chat.completions.create()\n";
    let parsed = parse_default(text);
    assert_eq!(parsed.expectations[0].line, 4);
    assert_eq!(parsed.expectations[0].marker_line, 1);
}

#[test]
fn stacked_markers_share_the_same_target() {
    let text = "# rulecov: expect rule-a\n# rulecov: expect rule-b\nx = call()\n";
    let parsed = parse_default(text);
    let lines: Vec<usize> = parsed.expectations.iter().map(|e| e.line).collect();
    assert_eq!(lines, vec![3, 3]);
}

#[test]
fn multiple_rule_ids_on_one_marker() {
    let parsed = parse_default("client = OpenAI()  # rulecov: expect deepseek-client, openai-client-usage\n");
    let ids: Vec<&str> = parsed
        .expectations
        .iter()
        .map(|e| e.rule_id.as_str())
        .collect();
    assert_eq!(ids, vec!["deepseek-client", "openai-client-usage"]);
}

#[test]
fn justification_is_captured() {
    let parsed = parse_default("x = 1  # rulecov: expect rule-a -- key passed inline\n");
    assert_eq!(
        parsed.expectations[0].justification.as_deref(),
        Some("key passed inline")
    );
}

#[test]
fn slash_slash_leader_is_recognized() {
    let parsed = parse_default("const c = new Anthropic(); // rulecov: expect anthropic-js-client\n");
    assert_eq!(parsed.expectations[0].rule_id, "anthropic-js-client");
}

#[test]
fn custom_tag_and_leader() {
    let syntax = AnnotationSyntax::new("oracle", &["--".to_string()]).unwrap();
    let parsed = parse("SELECT 1; -- oracle: expect sql-select\n", &syntax).unwrap();
    assert_eq!(parsed.expectations[0].rule_id, "sql-select");
    // The default tag is ignored under a custom syntax.
    let parsed = parse("x = 1  # rulecov: expect rule-a\n", &syntax).unwrap();
    assert!(parsed.expectations.is_empty());
}

#[test]
fn free_text_prose_is_not_an_annotation() {
    let parsed = parse_default("# Test 1: Import patterns (should trigger anthropic-sdk-imports)\nimport anthropic\n");
    assert!(parsed.expectations.is_empty());
    assert!(parsed.negative_regions.is_empty());
}

// ── expect-next ─────────────────────────────────────────────────────────────

#[test]
fn expect_next_skips_blank_and_comment_lines() {
    let text = "# rulecov: expect-next 2 client-usage\na = A()\n\n# note\nb = B()\nc = C()\n";
    let parsed = parse_default(text);
    let lines: Vec<usize> = parsed.expectations.iter().map(|e| e.line).collect();
    assert_eq!(lines, vec![2, 5]);
}

#[test]
fn expect_next_with_two_rules_expands_per_line() {
    let text = "# rulecov: expect-next 2 rule-a, rule-b\na = 1\nb = 2\n";
    let parsed = parse_default(text);
    assert_eq!(parsed.expectations.len(), 4);
}

#[test]
fn expect_next_running_out_of_code_is_malformed() {
    let err = parse_err("# rulecov: expect-next 3 rule-a\na = 1\nb = 2\n");
    assert_eq!(err.line, 1);
    assert!(err.message.contains("only 2"), "got: {}", err.message);
}

#[test]
fn expect_next_zero_is_malformed() {
    let err = parse_err("# rulecov: expect-next 0 rule-a\na = 1\n");
    assert!(err.message.contains("positive line count"));
}

// ── negative regions ────────────────────────────────────────────────────────

#[test]
fn none_next_covers_following_physical_lines() {
    let parsed = parse_default("# rulecov: none-next 3\na\nb\nc\nd\n");
    let region = &parsed.negative_regions[0];
    assert_eq!((region.start, region.end), (2, 4));
    assert!(!region.whole_file);
}

#[test]
fn none_file_covers_every_line() {
    let parsed = parse_default("# rulecov: none-file\na\nb\n");
    let region = &parsed.negative_regions[0];
    assert!(region.whole_file);
    assert_eq!((region.start, region.end), (1, 3));
    assert_eq!(region.label(), "whole file");
}

#[test]
fn inline_none_covers_its_own_line() {
    let parsed = parse_default("a = 1\nresp = requests.post(url)  # rulecov: none\n");
    let region = &parsed.negative_regions[0];
    assert_eq!((region.start, region.end), (2, 2));
}

#[test]
fn none_next_past_end_of_file_is_malformed() {
    let err = parse_err("a\n# rulecov: none-next 5\nb\n");
    assert_eq!(err.line, 2);
}

#[test]
fn none_with_rule_ids_is_malformed() {
    let err = parse_err("x = 1  # rulecov: none rule-a\n");
    assert!(err.message.contains("takes no rule identifiers"));
}

#[test]
fn expect_and_none_on_same_line_is_contradictory() {
    let text = "# rulecov: none\nx = call()  # rulecov: expect rule-a\n";
    let err = parse_err(text);
    assert!(err.message.contains("both 'expect' and 'none'"), "got: {}", err.message);
}

// ── malformed markers ───────────────────────────────────────────────────────

#[test]
fn expect_without_following_code_is_malformed() {
    let err = parse_err("x = 1\n# rulecov: expect rule-a\n\n# trailing comment\n");
    assert_eq!(err.line, 2);
    assert!(err.message.contains("no following code line"));
}

#[test]
fn empty_rule_id_is_malformed() {
    let err = parse_err("x = 1  # rulecov: expect\n");
    assert!(err.message.contains("missing rule identifier"));
    let err = parse_err("x = 1  # rulecov: expect rule-a, \n");
    assert!(err.message.contains("empty rule identifier"));
}

#[test]
fn malformed_rule_id_is_rejected() {
    let err = parse_err("x = 1  # rulecov: expect bad!rule\n");
    assert!(err.message.contains("malformed rule identifier"));
}

#[test]
fn unknown_directive_is_rejected() {
    let err = parse_err("x = 1  # rulecov: should-trigger rule-a\n");
    assert!(err.message.contains("unknown directive"));
}

#[test]
fn duplicate_provider_directive_is_rejected() {
    let err = parse_err("# rulecov: provider openai\n# rulecov: provider azure\nx = 1\n");
    assert_eq!(err.line, 2);
}

#[test]
fn provider_and_category_are_read() {
    let parsed = parse_default("# rulecov: provider bedrock\n# rulecov: category streaming\nx = 1\n");
    assert_eq!(parsed.provider.as_deref(), Some("bedrock"));
    assert_eq!(parsed.category.as_deref(), Some("streaming"));
}

#[test]
fn rule_id_grammar() {
    assert!(is_valid_rule_id("anthropic-api-messages"));
    assert!(is_valid_rule_id("bash/CAT-A1"));
    assert!(is_valid_rule_id("python.lang.security.audit"));
    assert!(!is_valid_rule_id("-leading-dash"));
    assert!(!is_valid_rule_id("has space"));
    assert!(!is_valid_rule_id(""));
}
