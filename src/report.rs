//! Coverage aggregation.
//!
//! [`aggregate`] folds per-file verdicts into a [`CoverageReport`]: tallies
//! by verdict kind, by rule and by provider, per-rule recall and precision,
//! and the full list of failing expectations. Reports hold owned copies of
//! everything they mention, so they outlive the corpus they were built from
//! and can be stored as baselines.
//!
//! Serialization is deterministic: maps are ordered, lists are sorted, and
//! nothing time-dependent is recorded. Two runs over an unchanged corpus and
//! engine produce byte-identical JSON.

use crate::error::ReportError;
use crate::reconcile::{DuplicateFire, FileVerdicts, Verdict, VerdictKind};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Version of the serialized report layout.
pub const SCHEMA_VERSION: &str = "1";

/// A ratio that may legitimately have no value.
///
/// An empty denominator is never reported as 0% or 100%.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Metric {
    Measured { value: f64 },
    /// The rule has no expectation anywhere in the corpus.
    Untested,
    /// Expectations exist but the denominator is empty.
    Undetermined,
}

impl Metric {
    fn ratio(numerator: usize, denominator: usize) -> Metric {
        if denominator == 0 {
            Metric::Undetermined
        } else {
            Metric::Measured {
                value: numerator as f64 / denominator as f64,
            }
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Metric::Measured { value } => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Measured { value } => write!(f, "{:.1}%", value * 100.0),
            Metric::Untested => write!(f, "untested"),
            Metric::Undetermined => write!(f, "n/a"),
        }
    }
}

/// Verdict counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Tally {
    pub expectations: usize,
    pub true_positive: usize,
    pub false_negative: usize,
    pub false_positive: usize,
    pub unexpected_fire: usize,
    pub inconclusive: usize,
}

impl Tally {
    fn add(&mut self, kind: VerdictKind) {
        match kind {
            VerdictKind::TruePositive => {
                self.expectations += 1;
                self.true_positive += 1;
            }
            VerdictKind::FalseNegative => {
                self.expectations += 1;
                self.false_negative += 1;
            }
            VerdictKind::Inconclusive => {
                self.expectations += 1;
                self.inconclusive += 1;
            }
            VerdictKind::FalsePositive => self.false_positive += 1,
            VerdictKind::UnexpectedFire => self.unexpected_fire += 1,
        }
    }

    pub fn failures(&self) -> usize {
        self.false_negative + self.false_positive + self.unexpected_fire + self.inconclusive
    }

    fn recall(&self) -> Metric {
        if self.expectations == 0 {
            Metric::Untested
        } else {
            Metric::ratio(self.true_positive, self.true_positive + self.false_negative)
        }
    }

    fn precision(&self) -> Metric {
        if self.expectations == 0 {
            Metric::Untested
        } else {
            Metric::ratio(
                self.true_positive,
                self.true_positive + self.false_positive + self.unexpected_fire,
            )
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStatus {
    Passing,
    Failing,
    Inconclusive,
    Untested,
}

impl fmt::Display for RuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleStatus::Passing => write!(f, "passing"),
            RuleStatus::Failing => write!(f, "failing"),
            RuleStatus::Inconclusive => write!(f, "inconclusive"),
            RuleStatus::Untested => write!(f, "untested"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RuleStats {
    pub status: RuleStatus,
    pub recall: Metric,
    pub precision: Metric,
    pub counts: Tally,
}

impl RuleStats {
    fn from_tally(counts: Tally) -> Self {
        let status = if counts.expectations == 0 {
            RuleStatus::Untested
        } else if counts.false_negative + counts.false_positive + counts.unexpected_fire > 0 {
            RuleStatus::Failing
        } else if counts.inconclusive > 0 {
            RuleStatus::Inconclusive
        } else {
            RuleStatus::Passing
        };
        RuleStats {
            status,
            recall: counts.recall(),
            precision: counts.precision(),
            counts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ProviderStats {
    pub files: usize,
    pub recall: Metric,
    pub counts: Tally,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Summary {
    pub files: usize,
    pub rules: usize,
    pub untested_rules: usize,
    pub duplicate_fires: usize,
    pub passed: bool,
    pub counts: Tally,
}

/// Outcome of one expectation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct ExpectationOutcome {
    pub path: String,
    pub line: usize,
    pub rule_id: String,
    pub kind: VerdictKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ExpectationOutcome {
    /// `(path, rule, line)`: identity used when comparing reports.
    pub fn key(&self) -> (&str, &str, usize) {
        (&self.path, &self.rule_id, self.line)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct InconclusiveFile {
    pub path: String,
    pub error: String,
}

/// Immutable snapshot of one harness run.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CoverageReport {
    pub schema_version: String,
    pub summary: Summary,
    pub rules: BTreeMap<String, RuleStats>,
    pub providers: BTreeMap<String, ProviderStats>,
    /// Every fixture path in the corpus, sorted.
    pub files: Vec<String>,
    pub expectations: Vec<ExpectationOutcome>,
    /// FalsePositive and UnexpectedFire verdicts.
    pub unexpected: Vec<Verdict>,
    pub inconclusive: Vec<InconclusiveFile>,
    pub duplicates: Vec<DuplicateFire>,
}

impl CoverageReport {
    pub fn passed(&self) -> bool {
        self.summary.passed
    }

    /// Expectations that did not come out as true positives.
    pub fn failing_expectations(&self) -> impl Iterator<Item = &ExpectationOutcome> {
        self.expectations.iter().filter(|e| e.kind.is_failure())
    }

    /// Canonical JSON form, also used as the baseline format.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).expect("report serialization failed")
    }

    pub fn from_json(text: &str) -> Result<CoverageReport, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Reads a stored report (e.g. a baseline).
    pub fn read(path: &Path) -> Result<CoverageReport, ReportError> {
        let text = std::fs::read_to_string(path).map_err(|source| ReportError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text).map_err(|source| ReportError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Aggregates per-file verdicts into a report.
///
/// `catalog` lists rule ids known to the engine; catalogue rules without any
/// expectation appear in the report as [`RuleStatus::Untested`].
///
/// The fold does not depend on the order of `files`.
pub fn aggregate(files: &[FileVerdicts], catalog: &[String]) -> CoverageReport {
    let mut total = Tally::default();
    let mut by_rule: BTreeMap<String, Tally> = BTreeMap::new();
    let mut by_provider: BTreeMap<String, (usize, Tally)> = BTreeMap::new();
    let mut paths = Vec::with_capacity(files.len());
    let mut expectations = Vec::new();
    let mut unexpected = Vec::new();
    let mut inconclusive = Vec::new();
    let mut duplicates = Vec::new();

    for rule in catalog {
        by_rule.entry(rule.clone()).or_default();
    }

    for file in files {
        paths.push(file.path.clone());
        let provider = by_provider.entry(file.provider.clone()).or_default();
        provider.0 += 1;

        for verdict in &file.verdicts {
            total.add(verdict.kind);
            provider.1.add(verdict.kind);
            by_rule
                .entry(verdict.rule_id.clone())
                .or_default()
                .add(verdict.kind);

            match verdict.kind {
                VerdictKind::FalsePositive | VerdictKind::UnexpectedFire => {
                    unexpected.push(verdict.clone())
                }
                _ => expectations.push(ExpectationOutcome {
                    path: verdict.path.clone(),
                    line: verdict.line,
                    rule_id: verdict.rule_id.clone(),
                    kind: verdict.kind,
                    detail: verdict.detail.clone(),
                }),
            }
        }

        if let Some(error) = &file.inconclusive {
            inconclusive.push(InconclusiveFile {
                path: file.path.clone(),
                error: error.clone(),
            });
        }
        duplicates.extend(file.duplicates.iter().cloned());
    }

    paths.sort();
    expectations.sort();
    unexpected.sort();
    inconclusive.sort();
    duplicates.sort();

    let rules: BTreeMap<String, RuleStats> = by_rule
        .into_iter()
        .map(|(id, tally)| (id, RuleStats::from_tally(tally)))
        .collect();
    let providers = by_provider
        .into_iter()
        .map(|(tag, (files, counts))| {
            let recall = counts.recall();
            (
                tag,
                ProviderStats {
                    files,
                    recall,
                    counts,
                },
            )
        })
        .collect();

    let summary = Summary {
        files: paths.len(),
        rules: rules.len(),
        untested_rules: rules
            .values()
            .filter(|r| r.status == RuleStatus::Untested)
            .count(),
        duplicate_fires: duplicates.iter().map(|d| d.extra).sum(),
        // A file the engine never scanned fails the run even when it holds
        // no expectations (negative-only fixtures).
        passed: total.failures() == 0 && inconclusive.is_empty(),
        counts: total,
    };

    CoverageReport {
        schema_version: SCHEMA_VERSION.to_string(),
        summary,
        rules,
        providers,
        files: paths,
        expectations,
        unexpected,
        inconclusive,
        duplicates,
    }
}
