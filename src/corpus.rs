//! In-memory fixture corpus.
//!
//! A [`Corpus`] is built once from an already-enumerated list of files (see
//! [`discover`] for the default enumeration) and is immutable afterwards.
//! Loading is all-or-nothing: every file is parsed, every invariant is
//! checked, and if any file fails the whole load fails with every collected
//! error.

use crate::annotation::{self, AnnotationSyntax, Expectation, NegativeRegion};
use crate::error::{CorpusLoadError, FileLoadError};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Provider tag used when neither a `provider` directive nor a parent
/// directory names one.
pub const DEFAULT_PROVIDER: &str = "default";

/// One annotated fixture file.
#[derive(Debug, Clone)]
pub struct FixtureFile {
    /// Corpus-relative path with forward slashes. Unique within a corpus.
    pub path: String,
    /// Location handed to the engine.
    pub source: PathBuf,
    pub provider: String,
    pub category: Option<String>,
    pub text: String,
    pub expectations: Vec<Expectation>,
    pub negative_regions: Vec<NegativeRegion>,
}

impl FixtureFile {
    /// Parses `text` and validates the per-file invariants.
    pub fn parse(
        path: &str,
        source: PathBuf,
        text: String,
        syntax: &AnnotationSyntax,
    ) -> Result<FixtureFile, FileLoadError> {
        let parsed = annotation::parse(&text, syntax).map_err(|source| FileLoadError::Malformed {
            path: path.to_string(),
            source,
        })?;

        let mut seen: HashSet<(&str, usize)> = HashSet::new();
        for exp in &parsed.expectations {
            if !seen.insert((exp.rule_id.as_str(), exp.line)) {
                return Err(FileLoadError::DuplicateExpectation {
                    path: path.to_string(),
                    rule_id: exp.rule_id.clone(),
                    line: exp.line,
                });
            }
            if let Some(region) = parsed.negative_regions.iter().find(|r| r.contains(exp.line)) {
                return Err(FileLoadError::NegativeOverlap {
                    path: path.to_string(),
                    rule_id: exp.rule_id.clone(),
                    line: exp.line,
                    start: region.start,
                    end: region.end,
                });
            }
        }

        let provider = parsed
            .provider
            .unwrap_or_else(|| provider_from_path(path));

        Ok(FixtureFile {
            path: path.to_string(),
            source,
            provider,
            category: parsed.category,
            text,
            expectations: parsed.expectations,
            negative_regions: parsed.negative_regions,
        })
    }

    /// The negative region covering `line`, if any.
    pub fn negative_region_at(&self, line: usize) -> Option<&NegativeRegion> {
        self.negative_regions.iter().find(|r| r.contains(line))
    }
}

/// The full set of fixture files, sorted by path.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    files: Vec<FixtureFile>,
}

impl Corpus {
    /// Loads fixture files from disk.
    ///
    /// `files` is the enumerated file list; `root` is only used to compute
    /// corpus-relative paths (files outside `root` keep their path as given).
    ///
    /// # Errors
    ///
    /// Returns [`CorpusLoadError`] holding every per-file failure, sorted by
    /// path, when any file cannot be read or violates an annotation invariant.
    pub fn load(
        root: &Path,
        files: &[PathBuf],
        syntax: &AnnotationSyntax,
    ) -> Result<Corpus, CorpusLoadError> {
        let results: Vec<Result<FixtureFile, FileLoadError>> = files
            .par_iter()
            .map(|file| {
                let rel = relative_path(root, file);
                let text =
                    std::fs::read_to_string(file).map_err(|source| FileLoadError::Read {
                        path: rel.clone(),
                        source,
                    })?;
                FixtureFile::parse(&rel, file.clone(), text, syntax)
            })
            .collect();

        let corpus = Self::assemble(results)?;
        tracing::info!(
            files = corpus.files.len(),
            expectations = corpus.expectation_count(),
            "corpus loaded"
        );
        Ok(corpus)
    }

    /// Builds a corpus from in-memory `(path, text)` pairs.
    ///
    /// ```
    /// use oxidized_rulecov::annotation::AnnotationSyntax;
    /// use oxidized_rulecov::corpus::Corpus;
    ///
    /// let corpus = Corpus::from_sources(
    ///     vec![("openai/chat.py".to_string(), "import openai  # rulecov: expect openai-import\n".to_string())],
    ///     &AnnotationSyntax::default(),
    /// ).unwrap();
    /// assert_eq!(corpus.files()[0].provider, "openai");
    /// ```
    pub fn from_sources(
        sources: Vec<(String, String)>,
        syntax: &AnnotationSyntax,
    ) -> Result<Corpus, CorpusLoadError> {
        let results: Vec<Result<FixtureFile, FileLoadError>> = sources
            .into_par_iter()
            .map(|(path, text)| {
                let path = path.replace('\\', "/");
                let source = PathBuf::from(&path);
                FixtureFile::parse(&path, source, text, syntax)
            })
            .collect();
        Self::assemble(results)
    }

    fn assemble(results: Vec<Result<FixtureFile, FileLoadError>>) -> Result<Corpus, CorpusLoadError> {
        let mut files = Vec::new();
        let mut errors = Vec::new();
        for result in results {
            match result {
                Ok(file) => files.push(file),
                Err(e) => errors.push(e),
            }
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        for pair in files.windows(2) {
            if pair[0].path == pair[1].path {
                errors.push(FileLoadError::DuplicatePath {
                    path: pair[0].path.clone(),
                });
            }
        }

        if errors.is_empty() {
            Ok(Corpus { files })
        } else {
            errors.sort_by(|a, b| a.path().cmp(b.path()));
            Err(CorpusLoadError { errors })
        }
    }

    pub fn files(&self) -> &[FixtureFile] {
        &self.files
    }

    pub fn get(&self, path: &str) -> Option<&FixtureFile> {
        self.files
            .binary_search_by(|f| f.path.as_str().cmp(path))
            .ok()
            .map(|i| &self.files[i])
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn expectation_count(&self) -> usize {
        self.files.iter().map(|f| f.expectations.len()).sum()
    }

    /// Files grouped by provider tag.
    pub fn by_provider(&self) -> BTreeMap<&str, Vec<&FixtureFile>> {
        let mut groups: BTreeMap<&str, Vec<&FixtureFile>> = BTreeMap::new();
        for file in &self.files {
            groups.entry(file.provider.as_str()).or_default().push(file);
        }
        groups
    }

    /// Files grouped by category; uncategorized files are omitted.
    pub fn by_category(&self) -> BTreeMap<&str, Vec<&FixtureFile>> {
        let mut groups: BTreeMap<&str, Vec<&FixtureFile>> = BTreeMap::new();
        for file in &self.files {
            if let Some(category) = file.category.as_deref() {
                groups.entry(category).or_default().push(file);
            }
        }
        groups
    }

    /// Every rule id referenced by at least one expectation.
    pub fn rule_ids(&self) -> BTreeSet<&str> {
        self.files
            .iter()
            .flat_map(|f| f.expectations.iter().map(|e| e.rule_id.as_str()))
            .collect()
    }
}

/// Enumerates fixture files under `root` whose extension (case-insensitive)
/// appears in `extensions`. Hidden directories are skipped; the result is
/// sorted.
///
/// ```rust,no_run
/// use std::path::Path;
/// use oxidized_rulecov::corpus::discover;
///
/// let files = discover(Path::new("./corpus"), &["py".to_string()]);
/// ```
pub fn discover(root: &Path, extensions: &[String]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .map(|ext| {
                    let ext = ext.to_string_lossy().to_lowercase();
                    extensions.iter().any(|want| want.eq_ignore_ascii_case(&ext))
                })
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    files
}

fn relative_path(root: &Path, file: &Path) -> String {
    let rel = file.strip_prefix(root).unwrap_or(file);
    rel.to_string_lossy().replace('\\', "/")
}

/// First directory component of a corpus-relative path.
fn provider_from_path(path: &str) -> String {
    let mut parts = path.split('/').filter(|p| !p.is_empty() && *p != ".");
    match (parts.next(), parts.next()) {
        (Some(dir), Some(_)) => dir.to_string(),
        _ => DEFAULT_PROVIDER.to_string(),
    }
}
