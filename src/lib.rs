//! # oxidized-rulecov
//!
//! Coverage harness for static-analysis rule engines.
//!
//! A rule engine (semgrep, or anything that reports `(rule, file, line)`
//! matches) is validated against a corpus of fixture files whose comments
//! declare which rule must fire on which line, and which regions must stay
//! silent. The harness scans every fixture, reconciles expected against
//! actual detections, aggregates per-rule recall and precision, and diffs
//! the result against a stored baseline to catch regressions between engine
//! versions. Fixtures are only ever read as text, never executed.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use oxidized_rulecov::{config::Config, corpus, engine, harness, output};
//!
//! let config = Config::load(None).expect("failed to load config");
//! let syntax = config.annotation_syntax().unwrap();
//! let root = Path::new("./corpus");
//! let files = corpus::discover(root, &config.corpus.extensions);
//! let corpus = corpus::Corpus::load(root, &files, &syntax).expect("invalid corpus");
//!
//! let engine = engine::from_config(&config);
//! let options = harness::RunOptions::from_config(&config);
//! let report = harness::run(&corpus, engine.as_ref(), &options, &harness::CancelToken::new())
//!     .expect("run cancelled");
//!
//! print!("{}", output::format_report(&report, &output::OutputFormat::Pretty));
//! ```
//!
//! ## Architecture
//!
//! 1. **[`annotation`]**: parse `rulecov:` comment markers into expectations
//!    and negative regions.
//! 2. **[`corpus`]**: load and validate fixture files.
//! 3. **[`engine`]**: invoke the rule engine and normalize its output into
//!    [`reconcile::MatchRecord`]s.
//! 4. **[`reconcile`]**: per-file verdicts (true positive, false negative,
//!    false positive, unexpected fire, inconclusive).
//! 5. **[`harness`]**: parallel, cancellable, retrying run over the corpus.
//! 6. **[`report`]**: aggregate verdicts into a deterministic
//!    [`report::CoverageReport`].
//! 7. **[`baseline`]**: diff two reports into a [`baseline::RegressionReport`].
//! 8. **[`output`]**: render reports as pretty text, JSON, or SARIF.

pub mod annotation;
pub mod baseline;
pub mod config;
pub mod corpus;
pub mod engine;
pub mod error;
pub mod harness;
pub mod output;
pub mod reconcile;
pub mod report;
