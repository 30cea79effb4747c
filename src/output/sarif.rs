//! SARIF 2.1.0 output.
//!
//! Each failing verdict becomes one SARIF result: false negatives are
//! `error`, false positives and unexpected fires `warning`, inconclusive
//! expectations `note`. Every file the engine could not scan also gets a
//! file-level `note`, so negative-only fixtures are not lost. Passing
//! verdicts are not emitted.

use crate::reconcile::VerdictKind;
use crate::report::CoverageReport;
use serde_sarif::sarif::{
    ArtifactLocation, Location, Message, MultiformatMessageString, PhysicalLocation, Region,
    ReportingDescriptor, Result as SarifResult, ResultLevel, Run, Sarif, Tool, ToolComponent,
};
use std::collections::{BTreeSet, HashMap};

struct Entry<'a> {
    rule_id: &'a str,
    path: &'a str,
    line: usize,
    kind: VerdictKind,
}

pub fn format(report: &CoverageReport) -> String {
    let entries: Vec<Entry<'_>> = report
        .failing_expectations()
        .map(|e| Entry {
            rule_id: &e.rule_id,
            path: &e.path,
            line: e.line,
            kind: e.kind,
        })
        .chain(report.unexpected.iter().map(|v| Entry {
            rule_id: &v.rule_id,
            path: &v.path,
            line: v.line,
            kind: v.kind,
        }))
        .collect();

    let rule_ids: BTreeSet<&str> = entries.iter().map(|e| e.rule_id).collect();
    let rule_index: HashMap<&str, i64> = rule_ids
        .iter()
        .enumerate()
        .map(|(i, id)| (*id, i as i64))
        .collect();

    let rules: Vec<ReportingDescriptor> = rule_ids
        .iter()
        .map(|id| {
            let mut rule = ReportingDescriptor::builder().id(id.to_string()).build();
            if let Some(stats) = report.rules.get(*id) {
                rule.short_description = Some(
                    MultiformatMessageString::builder()
                        .text(format!(
                            "{}: recall {}, precision {}",
                            stats.status, stats.recall, stats.precision
                        ))
                        .build(),
                );
            }
            rule
        })
        .collect();

    let mut results: Vec<SarifResult> = entries
        .iter()
        .map(|e| {
            let (level, text) = match e.kind {
                VerdictKind::FalseNegative => (
                    ResultLevel::Error,
                    format!("expected rule '{}' did not fire", e.rule_id),
                ),
                VerdictKind::Inconclusive => (
                    ResultLevel::Note,
                    format!("could not verify rule '{}': engine failed on this file", e.rule_id),
                ),
                VerdictKind::UnexpectedFire => (
                    ResultLevel::Warning,
                    format!("rule '{}' fired inside a negative region", e.rule_id),
                ),
                _ => (
                    ResultLevel::Warning,
                    format!("rule '{}' fired without an expectation", e.rule_id),
                ),
            };

            let mut result = SarifResult::builder()
                .message(Message::builder().text(text).build())
                .build();
            result.rule_id = Some(e.rule_id.to_string());
            result.level = Some(level);
            result.rule_index = rule_index.get(e.rule_id).copied();

            let mut location = Location::builder().build();
            let mut physical = PhysicalLocation::builder().build();
            physical.artifact_location =
                Some(ArtifactLocation::builder().uri(e.path.to_string()).build());
            physical.region = Some(Region::builder().start_line(e.line as i64).build());
            location.physical_location = Some(physical);
            result.locations = Some(vec![location]);

            result
        })
        .collect();

    results.extend(report.inconclusive.iter().map(|file| {
        let mut result = SarifResult::builder()
            .message(
                Message::builder()
                    .text(format!("engine could not scan this file: {}", file.error))
                    .build(),
            )
            .build();
        result.level = Some(ResultLevel::Note);

        let mut location = Location::builder().build();
        let mut physical = PhysicalLocation::builder().build();
        physical.artifact_location =
            Some(ArtifactLocation::builder().uri(file.path.clone()).build());
        location.physical_location = Some(physical);
        result.locations = Some(vec![location]);
        result
    }));

    let driver = ToolComponent::builder()
        .name("oxidized-rulecov")
        .version(env!("CARGO_PKG_VERSION").to_string())
        .rules(rules)
        .build();

    let tool = Tool::builder().driver(driver).build();
    let run = Run::builder().tool(tool).results(results).build();
    let sarif = Sarif::builder().version("2.1.0").runs(vec![run]).build();

    serde_json::to_string_pretty(&sarif).expect("SARIF serialization failed")
}
