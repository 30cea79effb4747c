//! Annotation parsing.
//!
//! Fixture files declare what the rule engine must (and must not) report via
//! structured comments. The parser is line-oriented and only ever inspects
//! comment text; the surrounding code is never executed or type-checked.
//!
//! # Grammar
//!
//! ```text
//! <leader> rulecov: expect <id>[, <id>...] [-- justification]
//! <leader> rulecov: expect-next <N> <id>[, <id>...] [-- justification]
//! <leader> rulecov: none [-- justification]
//! <leader> rulecov: none-next <N> [-- justification]
//! <leader> rulecov: none-file [-- justification]
//! <leader> rulecov: provider <tag>
//! <leader> rulecov: category <name>
//! ```
//!
//! `expect` and `none` target the marker's own line when code precedes the
//! comment, otherwise the next code line. A *code line* is any non-blank
//! line that is not comment-only.
//!
//! ```
//! use oxidized_rulecov::annotation::{parse, AnnotationSyntax};
//!
//! let text = "import anthropic  # rulecov: expect anthropic-sdk-imports\n";
//! let parsed = parse(text, &AnnotationSyntax::default()).unwrap();
//! assert_eq!(parsed.expectations[0].rule_id, "anthropic-sdk-imports");
//! assert_eq!(parsed.expectations[0].line, 1);
//! ```

use crate::error::AnnotationError;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static RE_RULE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.:/-]*$").unwrap());

static RE_TAG_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*$").unwrap());

/// Returns `true` if `id` matches the rule identifier grammar shared with
/// the engine.
///
/// ```
/// use oxidized_rulecov::annotation::is_valid_rule_id;
///
/// assert!(is_valid_rule_id("openai-chat-completions"));
/// assert!(is_valid_rule_id("rules.bedrock/invoke-model"));
/// assert!(!is_valid_rule_id(""));
/// assert!(!is_valid_rule_id("bad id"));
/// ```
pub fn is_valid_rule_id(id: &str) -> bool {
    RE_RULE_ID.is_match(id)
}

/// "This rule must fire on this line."
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expectation {
    pub rule_id: String,
    /// 1-based line the rule must fire on.
    pub line: usize,
    /// Line of the marker that declared the expectation.
    pub marker_line: usize,
    pub justification: Option<String>,
}

/// A span of lines (inclusive, 1-based) on which no rule may fire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegativeRegion {
    pub start: usize,
    pub end: usize,
    pub marker_line: usize,
    pub whole_file: bool,
    pub justification: Option<String>,
}

impl NegativeRegion {
    pub fn contains(&self, line: usize) -> bool {
        line >= self.start && line <= self.end
    }

    /// Human-readable label used in verdicts and reports.
    pub fn label(&self) -> String {
        if self.whole_file {
            "whole file".to_string()
        } else {
            format!("lines {}-{}", self.start, self.end)
        }
    }
}

/// Everything the annotations of one file declare.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Annotations {
    pub expectations: Vec<Expectation>,
    pub negative_regions: Vec<NegativeRegion>,
    pub provider: Option<String>,
    pub category: Option<String>,
}

/// Comment leaders and tag that introduce an annotation.
#[derive(Debug, Clone)]
pub struct AnnotationSyntax {
    tag: String,
    leaders: Vec<String>,
    marker: Regex,
}

impl AnnotationSyntax {
    /// Builds the syntax for the given tag (without the trailing colon) and
    /// comment leaders.
    ///
    /// Returns `None` when `tag` or `leaders` is empty.
    pub fn new(tag: &str, leaders: &[String]) -> Option<Self> {
        let leaders: Vec<String> = leaders
            .iter()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        if tag.trim().is_empty() || leaders.is_empty() {
            return None;
        }

        let alternation = leaders
            .iter()
            .map(|l| regex::escape(l))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = format!(
            r"(?:{alternation})\s*{}:(.*)$",
            regex::escape(tag.trim())
        );
        let marker = Regex::new(&pattern).ok()?;

        Some(AnnotationSyntax {
            tag: tag.trim().to_string(),
            leaders,
            marker,
        })
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    fn is_comment_only(&self, trimmed: &str) -> bool {
        self.leaders.iter().any(|l| trimmed.starts_with(l.as_str()))
    }

    fn is_code_line(&self, line: &str) -> bool {
        let trimmed = line.trim();
        !trimmed.is_empty() && !self.is_comment_only(trimmed)
    }
}

impl Default for AnnotationSyntax {
    fn default() -> Self {
        AnnotationSyntax::new("rulecov", &["#".to_string(), "//".to_string()])
            .expect("default annotation syntax is valid")
    }
}

enum Directive {
    Expect(Vec<String>),
    ExpectNext(usize, Vec<String>),
    None,
    NoneNext(usize),
    NoneFile,
    Provider(String),
    Category(String),
}

/// Parses every annotation in `text`.
///
/// # Errors
///
/// Returns [`AnnotationError`] for unknown directives, malformed rule ids,
/// markers with no code line to attach to, blocks running past the end of
/// the file, repeated `provider`/`category` directives, and lines claimed by
/// both an `expect` and a `none` marker.
pub fn parse(text: &str, syntax: &AnnotationSyntax) -> Result<Annotations, AnnotationError> {
    let lines: Vec<&str> = text.lines().collect();
    let mut out = Annotations::default();
    // (line, marker_line) claimed by single-line `none` markers.
    let mut none_lines: Vec<(usize, usize)> = Vec::new();

    for (idx, raw) in lines.iter().enumerate() {
        let line_no = idx + 1;
        let Some(caps) = syntax.marker.captures(raw) else {
            continue;
        };
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let body = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let has_code_before = !raw[..whole.start()].trim().is_empty();

        let (directive_text, justification) = split_justification(body);
        let directive = parse_directive(directive_text, line_no)?;

        match directive {
            Directive::Expect(ids) => {
                let target = if has_code_before {
                    line_no
                } else {
                    next_code_line(&lines, idx, syntax).ok_or_else(|| {
                        AnnotationError::new(line_no, "'expect' marker has no following code line")
                    })?
                };
                for id in ids {
                    out.expectations.push(Expectation {
                        rule_id: id,
                        line: target,
                        marker_line: line_no,
                        justification: justification.clone(),
                    });
                }
            }
            Directive::ExpectNext(count, ids) => {
                let mut targets = Vec::with_capacity(count);
                let mut cursor = idx;
                while targets.len() < count {
                    match next_code_line(&lines, cursor, syntax) {
                        Some(target) => {
                            targets.push(target);
                            cursor = target - 1;
                        }
                        None => {
                            return Err(AnnotationError::new(
                                line_no,
                                format!(
                                    "'expect-next {count}' found only {} following code line(s)",
                                    targets.len()
                                ),
                            ));
                        }
                    }
                }
                for target in targets {
                    for id in &ids {
                        out.expectations.push(Expectation {
                            rule_id: id.clone(),
                            line: target,
                            marker_line: line_no,
                            justification: justification.clone(),
                        });
                    }
                }
            }
            Directive::None => {
                let target = if has_code_before {
                    line_no
                } else {
                    next_code_line(&lines, idx, syntax).ok_or_else(|| {
                        AnnotationError::new(line_no, "'none' marker has no following code line")
                    })?
                };
                none_lines.push((target, line_no));
                out.negative_regions.push(NegativeRegion {
                    start: target,
                    end: target,
                    marker_line: line_no,
                    whole_file: false,
                    justification,
                });
            }
            Directive::NoneNext(count) => {
                let start = line_no + 1;
                let end = line_no + count;
                if end > lines.len() {
                    return Err(AnnotationError::new(
                        line_no,
                        format!(
                            "'none-next {count}' runs past end of file ({} lines)",
                            lines.len()
                        ),
                    ));
                }
                out.negative_regions.push(NegativeRegion {
                    start,
                    end,
                    marker_line: line_no,
                    whole_file: false,
                    justification,
                });
            }
            Directive::NoneFile => {
                out.negative_regions.push(NegativeRegion {
                    start: 1,
                    end: lines.len().max(1),
                    marker_line: line_no,
                    whole_file: true,
                    justification,
                });
            }
            Directive::Provider(tag) => {
                if out.provider.replace(tag).is_some() {
                    return Err(AnnotationError::new(line_no, "duplicate 'provider' directive"));
                }
            }
            Directive::Category(name) => {
                if out.category.replace(name).is_some() {
                    return Err(AnnotationError::new(line_no, "duplicate 'category' directive"));
                }
            }
        }
    }

    let expected_lines: BTreeSet<usize> = out.expectations.iter().map(|e| e.line).collect();
    if let Some((line, marker)) = none_lines
        .iter()
        .find(|(line, _)| expected_lines.contains(line))
    {
        return Err(AnnotationError::new(
            *marker,
            format!("line {line} is claimed by both 'expect' and 'none' markers"),
        ));
    }

    Ok(out)
}

fn split_justification(body: &str) -> (&str, Option<String>) {
    match body.split_once(" -- ") {
        Some((directive, why)) => {
            let why = why.trim();
            (directive, (!why.is_empty()).then(|| why.to_string()))
        }
        None => (body.trim_end_matches(" --"), None),
    }
}

fn parse_directive(text: &str, line: usize) -> Result<Directive, AnnotationError> {
    let text = text.trim();
    let (keyword, rest) = match text.split_once(char::is_whitespace) {
        Some((k, r)) => (k, r.trim()),
        None => (text, ""),
    };

    match keyword {
        "expect" => Ok(Directive::Expect(parse_rule_ids(rest, line)?)),
        "expect-next" => {
            let (count, rest) = parse_count(rest, line, keyword)?;
            Ok(Directive::ExpectNext(count, parse_rule_ids(rest, line)?))
        }
        "none" => {
            expect_no_arguments(rest, line, keyword)?;
            Ok(Directive::None)
        }
        "none-next" => {
            let (count, rest) = parse_count(rest, line, keyword)?;
            expect_no_arguments(rest, line, keyword)?;
            Ok(Directive::NoneNext(count))
        }
        "none-file" => {
            expect_no_arguments(rest, line, keyword)?;
            Ok(Directive::NoneFile)
        }
        "provider" => Ok(Directive::Provider(parse_tag_value(rest, line, keyword)?)),
        "category" => Ok(Directive::Category(parse_tag_value(rest, line, keyword)?)),
        "" => Err(AnnotationError::new(line, "empty annotation")),
        other => Err(AnnotationError::new(
            line,
            format!("unknown directive '{other}'"),
        )),
    }
}

fn parse_rule_ids(text: &str, line: usize) -> Result<Vec<String>, AnnotationError> {
    if text.trim().is_empty() {
        return Err(AnnotationError::new(line, "missing rule identifier"));
    }
    let mut ids = Vec::new();
    for part in text.split(',') {
        let id = part.trim();
        if id.is_empty() {
            return Err(AnnotationError::new(line, "empty rule identifier"));
        }
        if !is_valid_rule_id(id) {
            return Err(AnnotationError::new(
                line,
                format!("malformed rule identifier '{id}'"),
            ));
        }
        if !ids.iter().any(|existing| existing == id) {
            ids.push(id.to_string());
        } else {
            return Err(AnnotationError::new(
                line,
                format!("rule identifier '{id}' listed twice"),
            ));
        }
    }
    Ok(ids)
}

fn parse_count<'a>(
    text: &'a str,
    line: usize,
    keyword: &str,
) -> Result<(usize, &'a str), AnnotationError> {
    let (count, rest) = match text.split_once(char::is_whitespace) {
        Some((c, r)) => (c, r.trim()),
        None => (text, ""),
    };
    match count.parse::<usize>() {
        Ok(n) if n > 0 => Ok((n, rest)),
        _ => Err(AnnotationError::new(
            line,
            format!("'{keyword}' needs a positive line count, got '{count}'"),
        )),
    }
}

fn expect_no_arguments(text: &str, line: usize, keyword: &str) -> Result<(), AnnotationError> {
    if text.is_empty() {
        Ok(())
    } else {
        Err(AnnotationError::new(
            line,
            format!("'{keyword}' takes no rule identifiers, got '{text}'"),
        ))
    }
}

fn parse_tag_value(text: &str, line: usize, keyword: &str) -> Result<String, AnnotationError> {
    if RE_TAG_VALUE.is_match(text) {
        Ok(text.to_string())
    } else {
        Err(AnnotationError::new(
            line,
            format!("'{keyword}' needs a single name, got '{text}'"),
        ))
    }
}

/// 1-based number of the first code line after index `idx`.
fn next_code_line(lines: &[&str], idx: usize, syntax: &AnnotationSyntax) -> Option<usize> {
    lines
        .iter()
        .enumerate()
        .skip(idx + 1)
        .find(|(_, l)| syntax.is_code_line(l))
        .map(|(i, _)| i + 1)
}
