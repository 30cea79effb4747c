//! Replay of a recorded engine run.
//!
//! A [`ReplayEngine`] holds the output of one engine run over the whole
//! corpus and serves it back file by file. It lets the harness reconcile
//! against a stored run without the engine installed, and doubles as the
//! stub adapter in tests.
//!
//! Recorded paths usually carry whatever prefix the engine was run from, so
//! [`ReplayEngine::bind`] resolves each one to a corpus-relative fixture path
//! before the harness scans.

use crate::corpus::{Corpus, FixtureFile};
use crate::engine::normalize::{normalize, NormalizeOptions};
use crate::engine::Engine;
use crate::error::EngineError;
use crate::reconcile::MatchRecord;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct ReplayEngine {
    records: Vec<MatchRecord>,
}

impl ReplayEngine {
    /// Replays canned records. Paths are compared verbatim with fixture paths
    /// until the engine is [bound](ReplayEngine::bind) to a corpus.
    pub fn from_records(records: Vec<MatchRecord>) -> Self {
        ReplayEngine { records }
    }

    /// Parses a recorded engine output in any shape the normalizer accepts.
    ///
    /// # Errors
    ///
    /// [`EngineError::Normalize`] when the output cannot be normalized or a
    /// record carries no file path.
    pub fn from_output(raw: &str, opts: &NormalizeOptions) -> Result<Self, EngineError> {
        let records = normalize(raw, opts)?
            .into_iter()
            .map(|m| {
                let path = m.path.ok_or_else(|| {
                    EngineError::Normalize(format!(
                        "recorded match for '{}' at line {} has no file path",
                        m.rule_id, m.line
                    ))
                })?;
                Ok(MatchRecord {
                    rule_id: m.rule_id,
                    path,
                    line: m.line,
                    span: m.span,
                })
            })
            .collect::<Result<Vec<_>, EngineError>>()?;
        Ok(ReplayEngine { records })
    }

    /// Reads a recorded output from disk.
    pub fn from_file(path: &Path, opts: &NormalizeOptions) -> Result<Self, EngineError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_output(&raw, opts)
    }

    /// Resolves every recorded path to the fixture it belongs to.
    ///
    /// A record belongs to the fixture whose corpus-relative path it equals
    /// or ends with, compared by whole components. When several fixtures
    /// qualify (`client.py` and `anthropic/client.py`) the longest path wins,
    /// so each record lands in exactly one file. Records that match no
    /// fixture are dropped with a warning.
    pub fn bind(self, corpus: &Corpus) -> Self {
        let mut fixtures: Vec<&str> = corpus.files().iter().map(|f| f.path.as_str()).collect();
        fixtures.sort_by_key(|p| std::cmp::Reverse(Path::new(p).components().count()));

        let records = self
            .records
            .into_iter()
            .filter_map(|r| {
                let recorded = Path::new(&r.path);
                match fixtures
                    .iter()
                    .find(|f| r.path == **f || recorded.ends_with(f))
                {
                    Some(fixture) => Some(MatchRecord {
                        path: fixture.to_string(),
                        ..r
                    }),
                    None => {
                        tracing::warn!(
                            path = %r.path,
                            rule = %r.rule_id,
                            line = r.line,
                            "recorded match belongs to no fixture; dropped"
                        );
                        None
                    }
                }
            })
            .collect();
        ReplayEngine { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Engine for ReplayEngine {
    fn name(&self) -> &str {
        "replay"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn scan(&self, file: &FixtureFile) -> Result<Vec<MatchRecord>, EngineError> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.path == file.path)
            .cloned()
            .collect())
    }
}
