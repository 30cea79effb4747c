//! Configuration loading.
//!
//! The default configuration file is `rulecov.toml` in the current working
//! directory. Every section carries defaults, so the file may be omitted
//! entirely:
//!
//! ```rust,no_run
//! use oxidized_rulecov::config::Config;
//!
//! let config = Config::load(None).expect("failed to load config");
//! assert!(config.run.workers >= 1);
//! ```

use crate::annotation::AnnotationSyntax;
use crate::error::ConfigError;
use std::path::Path;

/// File name probed in the working directory when no explicit path is given.
pub const DEFAULT_CONFIG_FILE: &str = "rulecov.toml";

/// Main configuration for a harness run.
#[derive(Debug, Clone, Default, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct Config {
    /// Fixture discovery and annotation syntax.
    pub corpus: CorpusConfig,
    /// How the rule engine is invoked and its output normalized.
    pub engine: EngineConfig,
    /// Worker pool and retry policy.
    pub run: RunConfig,
    /// Known rule catalogue.
    pub rules: RulesConfig,
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct CorpusConfig {
    /// Fixture file extensions (case-insensitive, without the dot).
    pub extensions: Vec<String>,
    /// Annotation tag, written as `<tag>:` after a comment leader.
    pub annotation_tag: String,
    /// Comment leaders that may introduce an annotation.
    pub comment_leaders: Vec<String>,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        CorpusConfig {
            extensions: vec!["py".to_string()],
            annotation_tag: "rulecov".to_string(),
            comment_leaders: vec!["#".to_string(), "//".to_string()],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EngineKind {
    /// `semgrep scan --json` against the configured rules.
    Semgrep,
    /// Arbitrary program driven by an argument template.
    Command,
}

/// Whether engine line numbers count from zero or one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LineBase {
    Zero,
    One,
}

/// How engine rule identifiers map to corpus rule identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleIdStyle {
    /// Use the identifier verbatim.
    Full,
    /// Keep only the text after the last `.` (semgrep prefixes `check_id`
    /// with the rule file's directory).
    LastSegment,
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct EngineConfig {
    pub kind: EngineKind,
    /// Program to run. Defaults to `semgrep` for the semgrep kind.
    pub program: String,
    /// Argument template for the command kind. `{file}` is replaced by the
    /// fixture path and `{output}` by a temporary report file the engine
    /// writes to (read instead of stdout).
    pub args: Vec<String>,
    /// Value passed to `semgrep --config`.
    pub rules: String,
    /// Per-invocation wall-clock limit.
    pub timeout_secs: u64,
    /// Exit codes that still count as a successful scan.
    pub ok_exit_codes: Vec<i32>,
    pub line_base: LineBase,
    pub rule_id_style: RuleIdStyle,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            kind: EngineKind::Semgrep,
            program: "semgrep".to_string(),
            args: Vec::new(),
            rules: "rules".to_string(),
            timeout_secs: 30,
            ok_exit_codes: vec![0, 1],
            line_base: LineBase::One,
            rule_id_style: RuleIdStyle::LastSegment,
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct RunConfig {
    /// Maximum concurrent engine invocations.
    pub workers: usize,
    /// Extra attempts after a retryable engine failure.
    pub max_retries: u32,
    /// Initial backoff; doubled after each failed attempt.
    pub backoff_ms: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            workers: 4,
            max_retries: 2,
            backoff_ms: 250,
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Rule ids the engine is known to ship. Catalogue rules without any
    /// expectation are reported as untested.
    pub catalog: Vec<String>,
}

impl Config {
    /// Loads configuration from a TOML file.
    ///
    /// Resolution order:
    /// 1. If `path` is `Some`, load from that file (error if missing).
    /// 2. If `path` is `None`, try `rulecov.toml` in the current directory.
    /// 3. If that file does not exist either, return [`Config::default()`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the explicit path is missing, the file
    /// cannot be read or parsed, or the values fail [`Config::validate`].
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        let config_path = match path {
            Some(p) if p.exists() => Some(p.to_path_buf()),
            Some(p) => return Err(ConfigError::NotFound(p.to_path_buf())),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                default_path.exists().then(|| default_path.to_path_buf())
            }
        };

        let config = match config_path {
            Some(path) => {
                let content = std::fs::read_to_string(&path).map_err(|source| {
                    ConfigError::Read {
                        path: path.clone(),
                        source,
                    }
                })?;
                toml::from_str::<Config>(&content)
                    .map_err(|source| ConfigError::Parse { path, source })?
            }
            None => Config::default(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Rejects values the harness cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.run.workers == 0 {
            return Err(ConfigError::Invalid("run.workers must be at least 1".into()));
        }
        if self.engine.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "engine.timeout_secs must be at least 1".into(),
            ));
        }
        if self.corpus.extensions.is_empty() {
            return Err(ConfigError::Invalid(
                "corpus.extensions must not be empty".into(),
            ));
        }
        if self.engine.kind == EngineKind::Command && self.engine.program.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "engine.program is required for the command engine".into(),
            ));
        }
        self.annotation_syntax().map(|_| ())
    }

    /// Annotation syntax described by the `[corpus]` section.
    pub fn annotation_syntax(&self) -> Result<AnnotationSyntax, ConfigError> {
        AnnotationSyntax::new(&self.corpus.annotation_tag, &self.corpus.comment_leaders).ok_or_else(
            || {
                ConfigError::Invalid(
                    "corpus.annotation_tag and corpus.comment_leaders must not be empty".into(),
                )
            },
        )
    }
}
