//! Regression detection against a stored baseline report.
//!
//! [`diff`] compares two [`CoverageReport`]s built from the same corpus and
//! lists everything that got worse. Reports from different corpora are
//! rejected with [`DiffError::IncomparableBaseline`] rather than producing a
//! misleading diff.

use crate::error::DiffError;
use crate::reconcile::{Verdict, VerdictKind};
use crate::report::{CoverageReport, Metric};
use std::collections::{BTreeMap, BTreeSet};

/// Tolerance for metric comparisons; ratios are rebuilt from integer counts
/// so anything below this is float noise.
const METRIC_EPSILON: f64 = 1e-9;

/// An expectation whose outcome changed from true positive to a failure.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
pub struct ExpectationChange {
    pub path: String,
    pub line: usize,
    pub rule_id: String,
    pub previous: VerdictKind,
    pub current: VerdictKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricName {
    Recall,
    Precision,
}

impl std::fmt::Display for MetricName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricName::Recall => write!(f, "recall"),
            MetricName::Precision => write!(f, "precision"),
        }
    }
}

/// A rule whose recall or precision dropped.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RuleRegression {
    pub rule_id: String,
    pub metric: MetricName,
    pub previous: f64,
    pub current: f64,
}

/// Everything that got worse between a baseline and the current report.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct RegressionReport {
    /// TruePositive → FalseNegative.
    pub newly_failing: Vec<ExpectationChange>,
    /// TruePositive → Inconclusive.
    pub newly_inconclusive: Vec<ExpectationChange>,
    /// FalsePositive / UnexpectedFire verdicts absent from the baseline.
    pub new_unexpected: Vec<Verdict>,
    pub regressed_rules: Vec<RuleRegression>,
    /// Rules that had at least one true positive and now have none.
    pub silenced_rules: Vec<String>,
    /// Files the engine scanned before and failed on now.
    pub newly_inconclusive_files: Vec<String>,
}

impl RegressionReport {
    pub fn is_empty(&self) -> bool {
        self.newly_failing.is_empty()
            && self.newly_inconclusive.is_empty()
            && self.new_unexpected.is_empty()
            && self.regressed_rules.is_empty()
            && self.silenced_rules.is_empty()
            && self.newly_inconclusive_files.is_empty()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).expect("regression report serialization failed")
    }
}

/// Compares `current` against `previous`.
///
/// # Errors
///
/// [`DiffError::IncomparableBaseline`] when the two reports do not cover the
/// same file paths and expectation keys.
///
/// ```
/// # use oxidized_rulecov::{baseline, report};
/// let report = report::aggregate(&[], &[]);
/// assert!(baseline::diff(&report, &report).unwrap().is_empty());
/// ```
pub fn diff(
    previous: &CoverageReport,
    current: &CoverageReport,
) -> Result<RegressionReport, DiffError> {
    check_comparable(previous, current)?;

    let before: BTreeMap<(&str, &str, usize), VerdictKind> = previous
        .expectations
        .iter()
        .map(|e| (e.key(), e.kind))
        .collect();

    let mut out = RegressionReport::default();

    for exp in &current.expectations {
        let Some(&was) = before.get(&exp.key()) else {
            continue;
        };
        if was != VerdictKind::TruePositive {
            continue;
        }
        let change = ExpectationChange {
            path: exp.path.clone(),
            line: exp.line,
            rule_id: exp.rule_id.clone(),
            previous: was,
            current: exp.kind,
        };
        match exp.kind {
            VerdictKind::FalseNegative => out.newly_failing.push(change),
            VerdictKind::Inconclusive => out.newly_inconclusive.push(change),
            _ => {}
        }
    }

    let seen: BTreeSet<(VerdictKind, &str, &str, usize)> = previous
        .unexpected
        .iter()
        .map(|v| (v.kind, v.path.as_str(), v.rule_id.as_str(), v.line))
        .collect();
    out.new_unexpected = current
        .unexpected
        .iter()
        .filter(|v| !seen.contains(&(v.kind, v.path.as_str(), v.rule_id.as_str(), v.line)))
        .cloned()
        .collect();

    for (rule_id, now) in &current.rules {
        let Some(then) = previous.rules.get(rule_id) else {
            continue;
        };
        for (metric, was, is) in [
            (MetricName::Recall, then.recall, now.recall),
            (MetricName::Precision, then.precision, now.precision),
        ] {
            if let Some((was, is)) = dropped(was, is) {
                out.regressed_rules.push(RuleRegression {
                    rule_id: rule_id.clone(),
                    metric,
                    previous: was,
                    current: is,
                });
            }
        }
        if then.counts.true_positive > 0 && now.counts.true_positive == 0 {
            out.silenced_rules.push(rule_id.clone());
        }
    }

    let was_inconclusive: BTreeSet<&str> =
        previous.inconclusive.iter().map(|f| f.path.as_str()).collect();
    out.newly_inconclusive_files = current
        .inconclusive
        .iter()
        .filter(|f| !was_inconclusive.contains(f.path.as_str()))
        .map(|f| f.path.clone())
        .collect();

    out.newly_failing.sort();
    out.newly_inconclusive.sort();
    out.new_unexpected.sort();
    out.newly_inconclusive_files.sort();

    Ok(out)
}

fn dropped(previous: Metric, current: Metric) -> Option<(f64, f64)> {
    match (previous.value(), current.value()) {
        (Some(was), Some(is)) if is < was - METRIC_EPSILON => Some((was, is)),
        _ => None,
    }
}

fn check_comparable(previous: &CoverageReport, current: &CoverageReport) -> Result<(), DiffError> {
    let before: BTreeSet<&str> = previous.files.iter().map(String::as_str).collect();
    let after: BTreeSet<&str> = current.files.iter().map(String::as_str).collect();
    if let Some(missing) = before.difference(&after).next() {
        return Err(DiffError::IncomparableBaseline(format!(
            "file '{missing}' is in the baseline but not in the current report"
        )));
    }
    if let Some(extra) = after.difference(&before).next() {
        return Err(DiffError::IncomparableBaseline(format!(
            "file '{extra}' is in the current report but not in the baseline"
        )));
    }

    let keys_before: BTreeSet<_> = previous.expectations.iter().map(|e| e.key()).collect();
    let keys_after: BTreeSet<_> = current.expectations.iter().map(|e| e.key()).collect();
    if let Some((path, rule, line)) = keys_before.difference(&keys_after).next() {
        return Err(DiffError::IncomparableBaseline(format!(
            "expectation {rule} at {path}:{line} is in the baseline but not in the current report"
        )));
    }
    if let Some((path, rule, line)) = keys_after.difference(&keys_before).next() {
        return Err(DiffError::IncomparableBaseline(format!(
            "expectation {rule} at {path}:{line} is in the current report but not in the baseline"
        )));
    }
    Ok(())
}
