use std::path::Path;

use oxidized_rulecov::annotation::AnnotationSyntax;
use oxidized_rulecov::baseline::{diff, MetricName};
use oxidized_rulecov::config::{LineBase, RuleIdStyle};
use oxidized_rulecov::corpus::{discover, Corpus};
use oxidized_rulecov::engine::normalize::NormalizeOptions;
use oxidized_rulecov::engine::replay::ReplayEngine;
use oxidized_rulecov::error::DiffError;
use oxidized_rulecov::harness::{run, CancelToken, RunOptions};
use oxidized_rulecov::reconcile::{inconclusive, reconcile, MatchRecord, VerdictKind};
use oxidized_rulecov::report::{aggregate, CoverageReport};

// ── helpers ─────────────────────────────────────────────────────────────────

fn fixture_corpus() -> Corpus {
    let root = Path::new("tests/fixtures/corpus");
    let files = discover(root, &["py".to_string()]);
    Corpus::load(root, &files, &AnnotationSyntax::default()).unwrap()
}

fn report_from(matches: &str) -> CoverageReport {
    let opts = NormalizeOptions {
        line_base: LineBase::One,
        rule_id_style: RuleIdStyle::LastSegment,
    };
    let corpus = fixture_corpus();
    let engine = ReplayEngine::from_file(Path::new(matches), &opts)
        .unwrap()
        .bind(&corpus);
    run(
        &corpus,
        &engine,
        &RunOptions::default(),
        &CancelToken::new(),
    )
    .unwrap()
}

fn hit(path: &str, rule: &str, line: usize) -> MatchRecord {
    MatchRecord {
        rule_id: rule.to_string(),
        path: path.to_string(),
        line,
        span: None,
    }
}

/// One file with `R4` expected on lines 1 and 2.
fn r4_report(hits: &[usize]) -> CoverageReport {
    let corpus = Corpus::from_sources(
        vec![(
            "p/r4.py".to_string(),
            "a = f()  # rulecov: expect R4\nb = f()  # rulecov: expect R4\n".to_string(),
        )],
        &AnnotationSyntax::default(),
    )
    .unwrap();
    let file = &corpus.files()[0];
    let matches: Vec<MatchRecord> = hits.iter().map(|&l| hit("p/r4.py", "R4", l)).collect();
    aggregate(&[reconcile(file, &matches)], &[])
}

// ── regressions ─────────────────────────────────────────────────────────────

#[test]
fn report_against_itself_has_no_regressions() {
    let report = report_from("tests/fixtures/matches.json");
    let regressions = diff(&report, &report).unwrap();
    assert!(regressions.is_empty());
}

#[test]
fn recall_drop_is_reported() {
    let previous = r4_report(&[1, 2]);
    let current = r4_report(&[1]);
    let regressions = diff(&previous, &current).unwrap();

    assert_eq!(regressions.newly_failing.len(), 1);
    assert_eq!(regressions.newly_failing[0].line, 2);
    assert_eq!(regressions.newly_failing[0].current, VerdictKind::FalseNegative);

    let recall = regressions
        .regressed_rules
        .iter()
        .find(|r| r.metric == MetricName::Recall)
        .expect("recall regression");
    assert_eq!(recall.rule_id, "R4");
    assert!((recall.previous - 1.0).abs() < 1e-9);
    assert!((recall.current - 0.5).abs() < 1e-9);
    assert!(regressions.silenced_rules.is_empty());
}

#[test]
fn improvement_is_not_a_regression() {
    let previous = r4_report(&[1]);
    let current = r4_report(&[1, 2]);
    assert!(diff(&previous, &current).unwrap().is_empty());
}

#[test]
fn rule_losing_every_hit_is_silenced() {
    let previous = r4_report(&[1, 2]);
    let current = r4_report(&[]);
    let regressions = diff(&previous, &current).unwrap();
    assert_eq!(regressions.silenced_rules, vec!["R4".to_string()]);
    assert_eq!(regressions.newly_failing.len(), 2);
}

#[test]
fn regressed_recording_against_baseline() {
    let previous = report_from("tests/fixtures/matches.json");
    let current = report_from("tests/fixtures/matches-regressed.json");
    let regressions = diff(&previous, &current).unwrap();

    assert!(!regressions.is_empty());
    assert_eq!(regressions.newly_failing.len(), 1);
    assert_eq!(regressions.newly_failing[0].rule_id, "anthropic-api-messages");
    assert_eq!(regressions.new_unexpected.len(), 1);
    assert_eq!(regressions.new_unexpected[0].kind, VerdictKind::UnexpectedFire);
    assert_eq!(regressions.new_unexpected[0].path, "negative/plain_http.py");
    assert_eq!(
        regressions.silenced_rules,
        vec!["anthropic-api-messages".to_string()]
    );
    // openai-client-usage precision fell from 100% to 50%.
    assert!(regressions
        .regressed_rules
        .iter()
        .any(|r| r.rule_id == "openai-client-usage" && r.metric == MetricName::Precision));
}

#[test]
fn previously_failing_expectation_is_not_newly_failing() {
    let previous = r4_report(&[1]);
    let current = r4_report(&[1]);
    assert!(diff(&previous, &current).unwrap().newly_failing.is_empty());
}

#[test]
fn inconclusive_is_reported_separately() {
    let corpus = Corpus::from_sources(
        vec![(
            "p/r4.py".to_string(),
            "a = f()  # rulecov: expect R4\n".to_string(),
        )],
        &AnnotationSyntax::default(),
    )
    .unwrap();
    let file = &corpus.files()[0];
    let previous = aggregate(&[reconcile(file, &[hit("p/r4.py", "R4", 1)])], &[]);
    let current = aggregate(&[inconclusive(file, "engine produced no output")], &[]);

    let regressions = diff(&previous, &current).unwrap();
    assert_eq!(regressions.newly_inconclusive.len(), 1);
    assert!(regressions.newly_failing.is_empty());
    // Undetermined recall is not a measured drop.
    assert!(regressions.regressed_rules.is_empty());
}

#[test]
fn negative_only_file_turning_inconclusive_is_a_regression() {
    let corpus = Corpus::from_sources(
        vec![(
            "negative/plain.py".to_string(),
            "# rulecov: none-file\nimport requests\n".to_string(),
        )],
        &AnnotationSyntax::default(),
    )
    .unwrap();
    let file = &corpus.files()[0];
    let previous = aggregate(&[reconcile(file, &[])], &[]);
    let current = aggregate(&[inconclusive(file, "cannot normalize engine output: bad")], &[]);

    let regressions = diff(&previous, &current).unwrap();
    assert!(!regressions.is_empty());
    assert_eq!(regressions.newly_inconclusive_files, vec!["negative/plain.py"]);
    assert!(regressions.newly_inconclusive.is_empty());

    // Still failing on the next run is not new.
    assert!(diff(&current, &current).unwrap().is_empty());
}

// ── comparability ───────────────────────────────────────────────────────────

#[test]
fn different_file_sets_are_incomparable() {
    let previous = report_from("tests/fixtures/matches.json");
    let current = r4_report(&[1, 2]);
    let err = diff(&previous, &current).unwrap_err();
    let DiffError::IncomparableBaseline(msg) = err;
    assert!(msg.contains("anthropic/client.py"), "got: {msg}");
}

#[test]
fn changed_expectations_are_incomparable() {
    let previous = r4_report(&[1, 2]);
    let corpus = Corpus::from_sources(
        vec![(
            "p/r4.py".to_string(),
            "a = f()  # rulecov: expect R4\nb = f()  # rulecov: expect R5\n".to_string(),
        )],
        &AnnotationSyntax::default(),
    )
    .unwrap();
    let current = aggregate(&[reconcile(&corpus.files()[0], &[])], &[]);

    let err = diff(&previous, &current).unwrap_err();
    assert!(err.to_string().contains("incomparable baseline"));
}

#[test]
fn stored_baseline_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("baseline.json");
    let report = report_from("tests/fixtures/matches.json");
    std::fs::write(&path, report.to_json()).unwrap();

    let stored = CoverageReport::read(&path).unwrap();
    assert!(diff(&stored, &report).unwrap().is_empty());
}
