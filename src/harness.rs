//! Run orchestration.
//!
//! [`run`] scans every fixture file with the engine on a bounded worker
//! pool, reconciles each file independently, and aggregates the results into
//! a [`CoverageReport`].
//!
//! # Pipeline
//!
//! 1. Builds a [rayon] pool with `workers` threads.
//! 2. Scans files in parallel. Retryable engine failures are retried with
//!    exponential backoff; a file whose retries are exhausted becomes
//!    `Inconclusive` instead of aborting the run.
//! 3. Checks the [`CancelToken`] before every invocation. A cancelled run
//!    discards all partial results and returns [`RunError::Cancelled`]: the
//!    harness produces a complete report or none.
//! 4. Sorts per-file results by path and aggregates them, so worker
//!    scheduling never shows up in the report.
//!
//! ```rust,no_run
//! use std::path::Path;
//! use oxidized_rulecov::{config::Config, corpus, engine, harness};
//!
//! let config = Config::load(None).unwrap();
//! let syntax = config.annotation_syntax().unwrap();
//! let root = Path::new("./corpus");
//! let files = corpus::discover(root, &config.corpus.extensions);
//! let corpus = corpus::Corpus::load(root, &files, &syntax).unwrap();
//! let engine = engine::from_config(&config);
//! let report = harness::run(
//!     &corpus,
//!     engine.as_ref(),
//!     &harness::RunOptions::from_config(&config),
//!     &harness::CancelToken::new(),
//! )
//! .unwrap();
//!
//! std::process::exit(if report.passed() { 0 } else { 1 });
//! ```

use crate::config::Config;
use crate::corpus::{Corpus, FixtureFile};
use crate::engine::Engine;
use crate::error::{EngineError, RunError};
use crate::reconcile::{self, FileVerdicts, MatchRecord};
use crate::report::{self, CoverageReport};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Granularity of cancellable sleeps.
const CANCEL_POLL: Duration = Duration::from_millis(25);

/// Cancellation scope shared by everything in one run.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Cancels the token once `deadline` has elapsed.
    pub fn cancel_after(&self, deadline: Duration) {
        let token = self.clone();
        std::thread::spawn(move || {
            std::thread::sleep(deadline);
            if !token.is_cancelled() {
                tracing::warn!(deadline_secs = deadline.as_secs(), "run deadline reached");
                token.cancel();
            }
        });
    }

    /// Sleeps for `duration` unless cancelled first. Returns `false` when
    /// the sleep was cut short.
    fn sleep(&self, duration: Duration) -> bool {
        let until = Instant::now() + duration;
        while Instant::now() < until {
            if self.is_cancelled() {
                return false;
            }
            std::thread::sleep(CANCEL_POLL.min(until.saturating_duration_since(Instant::now())));
        }
        !self.is_cancelled()
    }
}

/// Worker pool and retry policy for one run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub workers: usize,
    pub max_retries: u32,
    pub backoff: Duration,
    /// Rule ids known to the engine, reported as untested when no fixture
    /// covers them.
    pub catalog: Vec<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            workers: 4,
            max_retries: 0,
            backoff: Duration::from_millis(0),
            catalog: Vec::new(),
        }
    }
}

impl RunOptions {
    pub fn from_config(config: &Config) -> Self {
        RunOptions {
            workers: config.run.workers.max(1),
            max_retries: config.run.max_retries,
            backoff: Duration::from_millis(config.run.backoff_ms),
            catalog: config.rules.catalog.clone(),
        }
    }
}

enum ScanFailure {
    Cancelled,
    Engine(EngineError),
}

/// Scans, reconciles and aggregates the whole corpus.
///
/// # Errors
///
/// [`RunError::Cancelled`] when `cancel` fires before every file has been
/// scanned; [`RunError::ThreadPool`] when the worker pool cannot be built.
pub fn run(
    corpus: &Corpus,
    engine: &dyn Engine,
    options: &RunOptions,
    cancel: &CancelToken,
) -> Result<CoverageReport, RunError> {
    let start = Instant::now();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.workers.max(1))
        .build()?;

    let results: Vec<Option<FileVerdicts>> = pool.install(|| {
        corpus
            .files()
            .par_iter()
            .map(|file| match scan_with_retry(engine, file, options, cancel) {
                Ok(matches) => Some(reconcile::reconcile(file, &matches)),
                Err(ScanFailure::Cancelled) => None,
                Err(ScanFailure::Engine(e)) => {
                    tracing::warn!(file = %file.path, error = %e, "file scan inconclusive");
                    Some(reconcile::inconclusive(file, &e.to_string()))
                }
            })
            .collect()
    });

    if cancel.is_cancelled() || results.iter().any(Option::is_none) {
        return Err(RunError::Cancelled);
    }

    let mut files: Vec<FileVerdicts> = results.into_iter().flatten().collect();
    files.sort_by(|a, b| a.path.cmp(&b.path));

    let report = report::aggregate(&files, &options.catalog);
    tracing::info!(
        engine = engine.name(),
        files = report.summary.files,
        expectations = report.summary.counts.expectations,
        failures = report.summary.counts.failures(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "run complete"
    );
    Ok(report)
}

fn scan_with_retry(
    engine: &dyn Engine,
    file: &FixtureFile,
    options: &RunOptions,
    cancel: &CancelToken,
) -> Result<Vec<MatchRecord>, ScanFailure> {
    let mut backoff = options.backoff;
    let mut attempt = 0u32;
    loop {
        if cancel.is_cancelled() {
            return Err(ScanFailure::Cancelled);
        }
        tracing::debug!(file = %file.path, attempt, "scanning");

        match engine.scan(file) {
            Ok(matches) => return Ok(matches),
            Err(e) if e.is_retryable() && attempt < options.max_retries => {
                attempt += 1;
                tracing::warn!(
                    file = %file.path,
                    attempt,
                    max_retries = options.max_retries,
                    error = %e,
                    "engine invocation failed; retrying"
                );
                if !cancel.sleep(backoff) {
                    return Err(ScanFailure::Cancelled);
                }
                backoff = backoff.saturating_mul(2);
            }
            Err(e) => return Err(ScanFailure::Engine(e)),
        }
    }
}
