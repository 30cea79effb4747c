//! JSON output formatter.
//!
//! The coverage report's JSON form is canonical: it is what baselines are
//! stored as and what [`CoverageReport::read`] parses back.

use crate::baseline::RegressionReport;
use crate::report::CoverageReport;

/// Formats a [`CoverageReport`] as pretty-printed JSON with a trailing newline.
pub fn format(report: &CoverageReport) -> String {
    let mut out = report.to_json();
    out.push('\n');
    out
}

pub fn format_regressions(regressions: &RegressionReport) -> String {
    let mut out = regressions.to_json();
    out.push('\n');
    out
}
