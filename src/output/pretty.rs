//! Human-readable colored text formatter.

use crate::baseline::RegressionReport;
use crate::reconcile::VerdictKind;
use crate::report::{CoverageReport, RuleStatus};
use colored::Colorize;

/// Formats a [`CoverageReport`] as ANSI-colored text.
///
/// Sections rendered (in order):
/// 1. **Rules**: status, recall and precision per rule id.
/// 2. **Providers**: file count and recall per provider tag.
/// 3. **Failures**: every missed expectation and unexpected fire, unabridged.
/// 4. **Inconclusive**: files the engine could not scan.
/// 5. **Duplicate fires**: non-fatal quality signal.
/// 6. **Summary**: overall result and verdict counts.
pub fn format(report: &CoverageReport) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "\n{}\n",
        format!("  Rule Coverage: {} files  ", report.summary.files)
            .bold()
            .on_blue()
            .white()
    ));
    out.push('\n');

    out.push_str(&format!("{}\n", "Rules".bold().underline()));
    for (rule_id, stats) in &report.rules {
        let icon = match stats.status {
            RuleStatus::Passing => "PASS".green().bold().to_string(),
            RuleStatus::Failing => "FAIL".red().bold().to_string(),
            RuleStatus::Inconclusive => "INC?".yellow().bold().to_string(),
            RuleStatus::Untested => "NONE".dimmed().to_string(),
        };
        out.push_str(&format!(
            "  [{icon}] {rule_id:<40} recall {recall:<10} precision {precision:<10} {tp}/{exp}\n",
            recall = stats.recall.to_string(),
            precision = stats.precision.to_string(),
            tp = stats.counts.true_positive,
            exp = stats.counts.expectations,
        ));
    }
    out.push('\n');

    if !report.providers.is_empty() {
        out.push_str(&format!("{}\n", "Providers".bold().underline()));
        for (tag, stats) in &report.providers {
            out.push_str(&format!(
                "  {tag:<20} {files:>4} files  recall {recall:<10} {failures} failing\n",
                files = stats.files,
                recall = stats.recall.to_string(),
                failures = stats.counts.failures(),
            ));
        }
        out.push('\n');
    }

    let mut failing = report.failing_expectations().peekable();
    if failing.peek().is_some() || !report.unexpected.is_empty() {
        out.push_str(&format!("{}\n", "Failures".bold().underline()));
        for exp in failing {
            let tag = match exp.kind {
                VerdictKind::Inconclusive => " INC".yellow().bold().to_string(),
                _ => "MISS".red().bold().to_string(),
            };
            out.push_str(&format!(
                "  [{tag}] {rule:<40} {loc}\n",
                rule = exp.rule_id,
                loc = format!("{}:{}", exp.path, exp.line).dimmed(),
            ));
            if let Some(ref why) = exp.detail {
                out.push_str(&format!("         > {}\n", why.dimmed()));
            }
        }
        for v in &report.unexpected {
            let tag = match v.kind {
                VerdictKind::UnexpectedFire => "FIRE".red().bold().to_string(),
                _ => "  FP".yellow().bold().to_string(),
            };
            out.push_str(&format!(
                "  [{tag}] {rule:<40} {loc}\n",
                rule = v.rule_id,
                loc = format!("{}:{}", v.path, v.line).dimmed(),
            ));
            if let Some(ref region) = v.detail {
                out.push_str(&format!(
                    "         > {}\n",
                    format!("inside negative region ({region})").dimmed()
                ));
            }
        }
        out.push('\n');
    }

    if !report.inconclusive.is_empty() {
        out.push_str(&format!("{}\n", "Inconclusive".bold().underline()));
        for file in &report.inconclusive {
            out.push_str(&format!("  {}  {}\n", file.path, file.error.dimmed()));
        }
        out.push('\n');
    }

    if !report.duplicates.is_empty() {
        out.push_str(&format!("{}\n", "Duplicate fires".bold().underline()));
        for dup in &report.duplicates {
            out.push_str(&format!(
                "  {rule:<40} {loc}  +{extra}\n",
                rule = dup.rule_id,
                loc = format!("{}:{}", dup.path, dup.line).dimmed(),
                extra = dup.extra,
            ));
        }
        out.push('\n');
    }

    let status = if report.passed() {
        "PASSED".green().bold().to_string()
    } else {
        "FAILED".red().bold().to_string()
    };
    let c = &report.summary.counts;
    out.push_str(&format!(
        "Result: {status}  |  {} expectations: {} true positive, {} false negative, {} false positive, {} unexpected, {} inconclusive\n",
        c.expectations,
        c.true_positive,
        c.false_negative,
        c.false_positive,
        c.unexpected_fire,
        c.inconclusive,
    ));

    out
}

/// Formats a [`RegressionReport`] as ANSI-colored text.
pub fn format_regressions(regressions: &RegressionReport) -> String {
    let mut out = String::new();

    if regressions.is_empty() {
        out.push_str(&format!(
            "{}  no regressions against baseline\n",
            "OK".green().bold()
        ));
        return out;
    }

    if !regressions.newly_failing.is_empty() {
        out.push_str(&format!("{}\n", "Newly failing".bold().underline()));
        for c in &regressions.newly_failing {
            out.push_str(&format!(
                "  [{}] {:<40} {}\n",
                "MISS".red().bold(),
                c.rule_id,
                format!("{}:{}", c.path, c.line).dimmed()
            ));
        }
        out.push('\n');
    }

    if !regressions.newly_inconclusive.is_empty() {
        out.push_str(&format!("{}\n", "Newly inconclusive".bold().underline()));
        for c in &regressions.newly_inconclusive {
            out.push_str(&format!(
                "  [{}] {:<40} {}\n",
                " INC".yellow().bold(),
                c.rule_id,
                format!("{}:{}", c.path, c.line).dimmed()
            ));
        }
        out.push('\n');
    }

    if !regressions.newly_inconclusive_files.is_empty() {
        out.push_str(&format!("{}\n", "Newly unscannable files".bold().underline()));
        for path in &regressions.newly_inconclusive_files {
            out.push_str(&format!("  [{}] {}\n", " INC".yellow().bold(), path));
        }
        out.push('\n');
    }

    if !regressions.new_unexpected.is_empty() {
        out.push_str(&format!("{}\n", "New unexpected fires".bold().underline()));
        for v in &regressions.new_unexpected {
            out.push_str(&format!(
                "  [{}] {:<40} {}  ({})\n",
                "FIRE".red().bold(),
                v.rule_id,
                format!("{}:{}", v.path, v.line).dimmed(),
                v.kind
            ));
        }
        out.push('\n');
    }

    if !regressions.regressed_rules.is_empty() {
        out.push_str(&format!("{}\n", "Regressed rules".bold().underline()));
        for r in &regressions.regressed_rules {
            out.push_str(&format!(
                "  {:<40} {:<9} {:.1}% -> {:.1}%\n",
                r.rule_id,
                r.metric.to_string(),
                r.previous * 100.0,
                r.current * 100.0
            ));
        }
        out.push('\n');
    }

    if !regressions.silenced_rules.is_empty() {
        out.push_str(&format!("{}\n", "Silenced rules".bold().underline()));
        for rule in &regressions.silenced_rules {
            out.push_str(&format!("  {rule}\n"));
        }
        out.push('\n');
    }

    out.push_str(&format!("Result: {}\n", "REGRESSED".red().bold()));
    out
}
