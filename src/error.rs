//! Error taxonomy.
//!
//! Structural problems (bad annotations, inconsistent corpora, unusable
//! configuration) are fatal to a run. Engine failures are isolated per file
//! and surface as `Inconclusive` verdicts instead of aborting the run.

use std::path::PathBuf;
use std::time::Duration;

/// A corpus authoring defect found while parsing one file's annotations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {message}")]
pub struct AnnotationError {
    /// 1-based line of the offending marker.
    pub line: usize,
    pub message: String,
}

impl AnnotationError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        AnnotationError {
            line,
            message: message.into(),
        }
    }
}

/// Why a single fixture file could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum FileLoadError {
    #[error("{path}: failed to read: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: malformed annotation at {source}")]
    Malformed {
        path: String,
        #[source]
        source: AnnotationError,
    },

    #[error("{path}: line {line}: duplicate expectation for rule '{rule_id}'")]
    DuplicateExpectation {
        path: String,
        rule_id: String,
        line: usize,
    },

    #[error(
        "{path}: line {line}: expectation for '{rule_id}' overlaps negative region {start}-{end}"
    )]
    NegativeOverlap {
        path: String,
        rule_id: String,
        line: usize,
        start: usize,
        end: usize,
    },

    #[error("{path}: fixture path is listed more than once")]
    DuplicatePath { path: String },
}

impl FileLoadError {
    /// Corpus-relative path of the file the error belongs to.
    pub fn path(&self) -> &str {
        match self {
            FileLoadError::Read { path, .. }
            | FileLoadError::Malformed { path, .. }
            | FileLoadError::DuplicateExpectation { path, .. }
            | FileLoadError::NegativeOverlap { path, .. }
            | FileLoadError::DuplicatePath { path } => path,
        }
    }
}

/// Aggregate load failure. Loading is all-or-nothing: one bad file fails the
/// whole corpus.
#[derive(Debug, thiserror::Error)]
#[error("corpus failed to load ({} error(s)); first: {}", .errors.len(), first_error(.errors))]
pub struct CorpusLoadError {
    pub errors: Vec<FileLoadError>,
}

fn first_error(errors: &[FileLoadError]) -> String {
    errors
        .first()
        .map(|e| e.to_string())
        .unwrap_or_else(|| "unknown error".to_string())
}

impl CorpusLoadError {
    pub fn first(&self) -> Option<&FileLoadError> {
        self.errors.first()
    }
}

/// An engine invocation that produced no usable result.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to start engine '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("engine timed out after {0:?}")]
    Timeout(Duration),

    #[error("engine exited with status {code}: {stderr}")]
    ExitStatus { code: i32, stderr: String },

    #[error("engine produced no output")]
    EmptyOutput,

    #[error("cannot normalize engine output: {0}")]
    Normalize(String),

    #[error("engine I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Infrastructure failures may succeed on another attempt; malformed
    /// output will not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::Spawn { .. }
                | EngineError::Timeout(_)
                | EngineError::ExitStatus { .. }
                | EngineError::Io(_)
        )
    }
}

/// Returned by the baseline differ when two reports describe different corpora.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiffError {
    #[error("incomparable baseline: {0}")]
    IncomparableBaseline(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("run cancelled; no report produced")]
    Cancelled,

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Failure reading or writing a serialized report.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to read report {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse report {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
