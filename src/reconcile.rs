//! Expected-versus-actual reconciliation for a single fixture file.
//!
//! [`reconcile`] joins a file's expectations with the engine's match records
//! by exact `(rule id, line)` equality. There is no line-window tolerance:
//! annotations sit on the exact triggering line, so the oracle stays
//! unambiguous.

use crate::corpus::FixtureFile;
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// One detection reported by the engine, in canonical shape.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MatchRecord {
    pub rule_id: String,
    /// Corpus-relative path of the scanned file.
    pub path: String,
    /// 1-based line.
    pub line: usize,
    pub span: Option<String>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum VerdictKind {
    TruePositive,
    FalseNegative,
    FalsePositive,
    UnexpectedFire,
    Inconclusive,
}

impl VerdictKind {
    /// `true` for every kind that makes a run fail.
    pub fn is_failure(self) -> bool {
        !matches!(self, VerdictKind::TruePositive)
    }
}

impl fmt::Display for VerdictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerdictKind::TruePositive => write!(f, "true_positive"),
            VerdictKind::FalseNegative => write!(f, "false_negative"),
            VerdictKind::FalsePositive => write!(f, "false_positive"),
            VerdictKind::UnexpectedFire => write!(f, "unexpected_fire"),
            VerdictKind::Inconclusive => write!(f, "inconclusive"),
        }
    }
}

/// Outcome for one expectation or one unexpected match.
///
/// Verdicts are owned copies; they never point back into the corpus.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct Verdict {
    pub path: String,
    pub line: usize,
    pub rule_id: String,
    pub kind: VerdictKind,
    pub provider: String,
    /// Expectation justification, or the negative region for unexpected fires.
    pub detail: Option<String>,
}

/// Extra fires for a `(rule, line)` that already produced a verdict.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct DuplicateFire {
    pub path: String,
    pub line: usize,
    pub rule_id: String,
    /// Records beyond the first.
    pub extra: usize,
}

/// Reconciliation result for one file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileVerdicts {
    pub path: String,
    pub provider: String,
    pub verdicts: Vec<Verdict>,
    pub duplicates: Vec<DuplicateFire>,
    /// Engine failure message when the file could not be scanned.
    pub inconclusive: Option<String>,
}

impl FileVerdicts {
    pub fn count(&self, kind: VerdictKind) -> usize {
        self.verdicts.iter().filter(|v| v.kind == kind).count()
    }
}

/// Reconciles `matches` against the expectations of `file`.
///
/// For each match: inside a negative region → `UnexpectedFire`; equal to an
/// expectation key → `TruePositive`; otherwise → `FalsePositive`. Every
/// expectation left unsatisfied becomes a `FalseNegative`. Repeated records
/// for the same `(rule, line)` collapse into one verdict and are counted in
/// [`FileVerdicts::duplicates`].
///
/// Records whose path differs from the file's are ignored with a warning.
pub fn reconcile(file: &FixtureFile, matches: &[MatchRecord]) -> FileVerdicts {
    let expected: BTreeMap<(&str, usize), &crate::annotation::Expectation> = file
        .expectations
        .iter()
        .map(|e| ((e.rule_id.as_str(), e.line), e))
        .collect();

    let mut satisfied: HashSet<(&str, usize)> = HashSet::new();
    let mut fired: BTreeMap<(String, usize), usize> = BTreeMap::new();
    let mut verdicts = Vec::new();

    for record in matches {
        if record.path != file.path {
            tracing::warn!(
                file = %file.path,
                path = %record.path,
                rule = %record.rule_id,
                line = record.line,
                "match reported for another path; ignored"
            );
            continue;
        }
        let count = fired
            .entry((record.rule_id.clone(), record.line))
            .or_insert(0);
        *count += 1;
        if *count > 1 {
            continue;
        }

        let key = (record.rule_id.as_str(), record.line);
        let (kind, detail) = if let Some(region) = file.negative_region_at(record.line) {
            (VerdictKind::UnexpectedFire, Some(region.label()))
        } else if let Some((&matched_key, exp)) = expected.get_key_value(&key) {
            satisfied.insert(matched_key);
            (VerdictKind::TruePositive, exp.justification.clone())
        } else {
            (VerdictKind::FalsePositive, None)
        };

        verdicts.push(Verdict {
            path: file.path.clone(),
            line: record.line,
            rule_id: record.rule_id.clone(),
            kind,
            provider: file.provider.clone(),
            detail,
        });
    }

    for (key, exp) in &expected {
        if !satisfied.contains(key) {
            verdicts.push(Verdict {
                path: file.path.clone(),
                line: exp.line,
                rule_id: exp.rule_id.clone(),
                kind: VerdictKind::FalseNegative,
                provider: file.provider.clone(),
                detail: exp.justification.clone(),
            });
        }
    }

    verdicts.sort();

    let duplicates = fired
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|((rule_id, line), count)| DuplicateFire {
            path: file.path.clone(),
            line,
            rule_id,
            extra: count - 1,
        })
        .collect();

    FileVerdicts {
        path: file.path.clone(),
        provider: file.provider.clone(),
        verdicts,
        duplicates,
        inconclusive: None,
    }
}

/// Verdicts for a file whose scan failed: every expectation is
/// `Inconclusive` and the error is kept for the report.
pub fn inconclusive(file: &FixtureFile, error: &str) -> FileVerdicts {
    let mut verdicts: Vec<Verdict> = file
        .expectations
        .iter()
        .map(|exp| Verdict {
            path: file.path.clone(),
            line: exp.line,
            rule_id: exp.rule_id.clone(),
            kind: VerdictKind::Inconclusive,
            provider: file.provider.clone(),
            detail: exp.justification.clone(),
        })
        .collect();
    verdicts.sort();

    FileVerdicts {
        path: file.path.clone(),
        provider: file.provider.clone(),
        verdicts,
        duplicates: Vec::new(),
        inconclusive: Some(error.to_string()),
    }
}
