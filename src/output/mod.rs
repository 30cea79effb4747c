//! Output formatting for coverage and regression reports.
//!
//! | Format | Module | Use case |
//! |--------|--------|----------|
//! | [`Pretty`](OutputFormat::Pretty) | [`pretty`] | Terminal / human review |
//! | [`Json`](OutputFormat::Json)     | [`json`]   | Baselines / automation  |
//! | [`Sarif`](OutputFormat::Sarif)   | [`sarif`]  | CI/CD integration       |
//!
//! Use [`format_report`] to render a [`CoverageReport`] and
//! [`format_regressions`] for a [`RegressionReport`].

pub mod json;
pub mod pretty;
pub mod sarif;

use crate::baseline::RegressionReport;
use crate::report::CoverageReport;

/// Supported output formats for coverage reports.
#[derive(Debug, Clone, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable colored text with summary tables.
    Pretty,
    /// Canonical JSON; the format baselines are stored in.
    Json,
    /// [SARIF 2.1.0](https://sarifweb.azurewebsites.net/) listing every failing verdict.
    Sarif,
}

/// Supported output formats for regression reports.
#[derive(Debug, Clone, clap::ValueEnum)]
pub enum DiffFormat {
    Pretty,
    Json,
}

/// Formats a [`CoverageReport`] in the requested [`OutputFormat`].
///
/// ```rust,no_run
/// use oxidized_rulecov::output::{format_report, OutputFormat};
/// # use oxidized_rulecov::report::CoverageReport;
/// # fn example(report: &CoverageReport) {
/// let json = format_report(report, &OutputFormat::Json);
/// println!("{json}");
/// # }
/// ```
pub fn format_report(report: &CoverageReport, format: &OutputFormat) -> String {
    match format {
        OutputFormat::Pretty => pretty::format(report),
        OutputFormat::Json => json::format(report),
        OutputFormat::Sarif => sarif::format(report),
    }
}

pub fn format_regressions(regressions: &RegressionReport, format: &DiffFormat) -> String {
    match format {
        DiffFormat::Pretty => pretty::format_regressions(regressions),
        DiffFormat::Json => json::format_regressions(regressions),
    }
}
