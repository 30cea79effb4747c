//! Subprocess engine adapter.
//!
//! Runs an external rule engine once per fixture file and normalizes its
//! JSON output.
//!
//! # How it works
//!
//! 1. Expands the argument template: `{file}` becomes the fixture path and
//!    `{output}` a temporary report file the engine writes to. Without a
//!    `{file}` placeholder the path is appended as the last argument.
//! 2. Spawns the program with piped stdout/stderr, drained on helper threads
//!    so a chatty engine cannot fill the pipe and stall.
//! 3. Polls the child until it exits or the timeout elapses; on timeout the
//!    child is killed and [`EngineError::Timeout`] is returned.
//! 4. Checks the exit code against the accepted set (semgrep exits 1 when it
//!    has findings) and hands the output to [`normalize`].

use crate::config::{EngineConfig, EngineKind};
use crate::corpus::FixtureFile;
use crate::engine::normalize::{normalize, NormalizeOptions};
use crate::engine::{which_exists, Engine};
use crate::error::EngineError;
use crate::reconcile::MatchRecord;
use std::io::Read;
use std::process::{Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const FILE_PLACEHOLDER: &str = "{file}";
const OUTPUT_PLACEHOLDER: &str = "{output}";

/// Longest stderr excerpt kept in an [`EngineError::ExitStatus`].
const STDERR_EXCERPT: usize = 400;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Engine adapter that shells out to a rule engine binary.
#[derive(Debug, Clone)]
pub struct CommandEngine {
    name: String,
    program: String,
    args: Vec<String>,
    timeout: Duration,
    ok_exit_codes: Vec<i32>,
    normalize: NormalizeOptions,
}

impl CommandEngine {
    pub fn new(program: &str, args: Vec<String>, timeout: Duration) -> Self {
        CommandEngine {
            name: program.to_string(),
            program: program.to_string(),
            args,
            timeout,
            ok_exit_codes: vec![0],
            normalize: NormalizeOptions::default(),
        }
    }

    pub fn with_ok_exit_codes(mut self, codes: Vec<i32>) -> Self {
        self.ok_exit_codes = codes;
        self
    }

    pub fn with_normalize(mut self, opts: NormalizeOptions) -> Self {
        self.normalize = opts;
        self
    }

    /// Builds the adapter described by `[engine]`.
    pub fn from_config(config: &EngineConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout_secs);
        let opts = NormalizeOptions {
            line_base: config.line_base,
            rule_id_style: config.rule_id_style,
        };

        let mut engine = match config.kind {
            EngineKind::Semgrep => Self::semgrep(&config.program, &config.rules, timeout),
            EngineKind::Command => Self::new(&config.program, config.args.clone(), timeout),
        };
        engine.ok_exit_codes = config.ok_exit_codes.clone();
        engine.normalize = opts;
        engine
    }

    /// `semgrep scan --json --quiet --config <rules> {file}`.
    pub fn semgrep(program: &str, rules: &str, timeout: Duration) -> Self {
        let program = if program.trim().is_empty() {
            "semgrep"
        } else {
            program
        };
        let args = ["scan", "--json", "--quiet", "--config", rules, FILE_PLACEHOLDER]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut engine = Self::new(program, args, timeout).with_ok_exit_codes(vec![0, 1]);
        engine.name = "semgrep".to_string();
        engine
    }

    fn run(&self, file: &FixtureFile) -> Result<String, EngineError> {
        let report = if self.args.iter().any(|a| a.contains(OUTPUT_PLACEHOLDER)) {
            Some(tempfile::NamedTempFile::new()?)
        } else {
            None
        };

        let file_arg = file.source.to_string_lossy();
        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|a| {
                let a = a.replace(FILE_PLACEHOLDER, &file_arg);
                match &report {
                    Some(r) => a.replace(OUTPUT_PLACEHOLDER, &r.path().to_string_lossy()),
                    None => a,
                }
            })
            .collect();
        if !self.args.iter().any(|a| a.contains(FILE_PLACEHOLDER)) {
            args.push(file_arg.to_string());
        }

        let start = Instant::now();
        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| EngineError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = loop {
            match child.try_wait()? {
                Some(status) => break status,
                None => {
                    if start.elapsed() >= self.timeout {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(EngineError::Timeout(self.timeout));
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
            }
        };

        let stdout = join(stdout)?;
        let stderr = join(stderr)?;

        // Killed by a signal when there is no exit code.
        let code = status.code().unwrap_or(-1);
        if !self.ok_exit_codes.contains(&code) {
            let stderr = String::from_utf8_lossy(&stderr);
            let excerpt: String = stderr.trim().chars().take(STDERR_EXCERPT).collect();
            return Err(EngineError::ExitStatus {
                code,
                stderr: excerpt,
            });
        }

        let text = match &report {
            Some(r) => std::fs::read_to_string(r.path())?,
            None => String::from_utf8_lossy(&stdout).into_owned(),
        };

        tracing::debug!(
            engine = %self.name,
            file = %file.path,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "engine invocation finished"
        );
        Ok(text)
    }
}

impl Engine for CommandEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        // Explicit paths are checked directly; bare names are looked up on PATH.
        if self.program.contains('/') || self.program.contains('\\') {
            std::path::Path::new(&self.program).is_file()
        } else {
            which_exists(&self.program)
        }
    }

    fn scan(&self, file: &FixtureFile) -> Result<Vec<MatchRecord>, EngineError> {
        let text = self.run(file)?;
        if text.trim().is_empty() {
            return Err(EngineError::EmptyOutput);
        }

        let matches = normalize(&text, &self.normalize)?
            .into_iter()
            .map(|m| MatchRecord {
                rule_id: m.rule_id,
                path: file.path.clone(),
                line: m.line,
                span: m.span,
            })
            .collect();
        Ok(matches)
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<std::io::Result<Vec<u8>>>> {
    pipe.map(|mut p| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            p.read_to_end(&mut buf)?;
            Ok(buf)
        })
    })
}

fn join(handle: Option<JoinHandle<std::io::Result<Vec<u8>>>>) -> Result<Vec<u8>, EngineError> {
    match handle {
        Some(h) => h
            .join()
            .map_err(|_| EngineError::Io(std::io::Error::other("output reader thread panicked")))?
            .map_err(EngineError::from),
        None => Ok(Vec::new()),
    }
}
