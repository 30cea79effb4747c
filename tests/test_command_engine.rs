//! Subprocess adapter tests. Each test writes a small shell script that
//! stands in for a rule engine.
#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use oxidized_rulecov::annotation::AnnotationSyntax;
use oxidized_rulecov::config::{Config, EngineKind, LineBase, RuleIdStyle};
use oxidized_rulecov::corpus::{discover, Corpus};
use oxidized_rulecov::engine::command::CommandEngine;
use oxidized_rulecov::engine::normalize::NormalizeOptions;
use oxidized_rulecov::engine::{self, Engine};
use oxidized_rulecov::error::EngineError;

/// Writes an executable script into `dir`.
fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

/// A one-file corpus with an expectation on line 2.
fn one_file_corpus(dir: &Path) -> Corpus {
    let root = dir.join("corpus");
    std::fs::create_dir_all(root.join("openai")).unwrap();
    std::fs::write(
        root.join("openai/chat.py"),
        "import os\nimport openai  # rulecov: expect openai-import\n",
    )
    .unwrap();
    let files = discover(&root, &["py".to_string()]);
    Corpus::load(&root, &files, &AnnotationSyntax::default()).unwrap()
}

fn engine_for(program: &Path, args: &[&str]) -> CommandEngine {
    CommandEngine::new(
        &program.to_string_lossy(),
        args.iter().map(|s| s.to_string()).collect(),
        Duration::from_secs(10),
    )
}

// ── success paths ───────────────────────────────────────────────────────────

#[test]
fn stdout_matches_are_attributed_to_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = one_file_corpus(dir.path());
    let prog = script(
        dir.path(),
        "engine.sh",
        r#"echo '{"results": [{"check_id": "openai-import", "path": "'"$1"'", "start": {"line": 2}}]}'"#,
    );

    let matches = engine_for(&prog, &[]).scan(&corpus.files()[0]).unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].rule_id, "openai-import");
    assert_eq!(matches[0].line, 2);
    assert_eq!(matches[0].path, "openai/chat.py");
}

#[test]
fn file_placeholder_is_substituted() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = one_file_corpus(dir.path());
    // Fails unless the second argument is an existing file.
    let prog = script(
        dir.path(),
        "engine.sh",
        r#"[ "$1" = "--target" ] && [ -f "$2" ] || exit 9
echo '[]'"#,
    );

    let matches = engine_for(&prog, &["--target", "{file}"])
        .scan(&corpus.files()[0])
        .unwrap();
    assert!(matches.is_empty());
}

#[test]
fn output_placeholder_reads_report_file() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = one_file_corpus(dir.path());
    let prog = script(
        dir.path(),
        "engine.sh",
        r#"echo 'progress noise on stdout'
echo '[{"rule_id": "openai-import", "line": 2}]' > "$2""#,
    );

    let matches = engine_for(&prog, &["{file}", "{output}"])
        .scan(&corpus.files()[0])
        .unwrap();
    assert_eq!(matches.len(), 1);
}

#[test]
fn zero_based_engine_is_shifted() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = one_file_corpus(dir.path());
    let prog = script(
        dir.path(),
        "engine.sh",
        r#"echo '[{"rule_id": "rules.openai-import", "line": 1}]'"#,
    );

    let engine = engine_for(&prog, &[]).with_normalize(NormalizeOptions {
        line_base: LineBase::Zero,
        rule_id_style: RuleIdStyle::LastSegment,
    });
    let matches = engine.scan(&corpus.files()[0]).unwrap();
    assert_eq!(matches[0].line, 2);
    assert_eq!(matches[0].rule_id, "openai-import");
}

#[test]
fn accepted_nonzero_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = one_file_corpus(dir.path());
    let prog = script(dir.path(), "engine.sh", "echo '[]'\nexit 1");

    let engine = engine_for(&prog, &[]).with_ok_exit_codes(vec![0, 1]);
    assert!(engine.scan(&corpus.files()[0]).unwrap().is_empty());
}

// ── failures ────────────────────────────────────────────────────────────────

#[test]
fn unexpected_exit_code_carries_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = one_file_corpus(dir.path());
    let prog = script(dir.path(), "engine.sh", "echo 'rules failed to parse' >&2\nexit 7");

    let err = engine_for(&prog, &[]).scan(&corpus.files()[0]).unwrap_err();
    match err {
        EngineError::ExitStatus { code, ref stderr } => {
            assert_eq!(code, 7);
            assert!(stderr.contains("rules failed to parse"));
        }
        other => panic!("expected ExitStatus, got {other:?}"),
    }
    assert!(err.is_retryable());
}

#[test]
fn empty_output_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = one_file_corpus(dir.path());
    let prog = script(dir.path(), "engine.sh", "exit 0");

    let err = engine_for(&prog, &[]).scan(&corpus.files()[0]).unwrap_err();
    assert!(matches!(err, EngineError::EmptyOutput));
}

#[test]
fn garbage_output_is_a_normalize_error() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = one_file_corpus(dir.path());
    let prog = script(dir.path(), "engine.sh", "echo 'Traceback (most recent call last):'");

    let err = engine_for(&prog, &[]).scan(&corpus.files()[0]).unwrap_err();
    assert!(matches!(err, EngineError::Normalize(_)));
    assert!(!err.is_retryable());
}

#[test]
fn slow_engine_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = one_file_corpus(dir.path());
    let prog = script(dir.path(), "engine.sh", "sleep 5\necho '[]'");

    let engine = CommandEngine::new(
        &prog.to_string_lossy(),
        Vec::new(),
        Duration::from_millis(200),
    );
    let started = std::time::Instant::now();
    let err = engine.scan(&corpus.files()[0]).unwrap_err();
    assert!(matches!(err, EngineError::Timeout(_)));
    assert_eq!(err.to_string(), "engine timed out after 200ms");
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[test]
fn missing_program_is_a_spawn_error() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = one_file_corpus(dir.path());
    let engine = engine_for(&dir.path().join("no-such-engine"), &[]);

    assert!(!engine.is_available());
    let err = engine.scan(&corpus.files()[0]).unwrap_err();
    assert!(matches!(err, EngineError::Spawn { .. }));
}

// ── construction ────────────────────────────────────────────────────────────

#[test]
fn semgrep_preset_name() {
    let engine = CommandEngine::semgrep("", "rules", Duration::from_secs(30));
    assert_eq!(engine.name(), "semgrep");
}

#[test]
fn from_config_builds_command_engine() {
    let dir = tempfile::tempdir().unwrap();
    let prog = script(dir.path(), "engine.sh", "echo '[]'");

    let mut config = Config::default();
    config.engine.kind = EngineKind::Command;
    config.engine.program = prog.to_string_lossy().to_string();
    let engine = engine::from_config(&config);
    assert!(engine.is_available());
    assert!(engine.name().ends_with("engine.sh"));
}
