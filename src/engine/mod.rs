//! Engine adapters.
//!
//! The rule engine under test is an opaque collaborator. Every adapter
//! implements [`Engine`] and returns canonical [`MatchRecord`]s; this module
//! is the only place that changes when the engine's interface does.
//!
//! | Adapter | Source of matches |
//! |---------|-------------------|
//! | [`command::CommandEngine`] | external process (semgrep preset or any JSON-emitting tool) |
//! | [`replay::ReplayEngine`] | a recorded run, served per file |

pub mod command;
pub mod normalize;
pub mod replay;

use crate::config::Config;
use crate::corpus::FixtureFile;
use crate::error::EngineError;
use crate::reconcile::MatchRecord;

/// A rule engine the harness can scan fixture files with.
///
/// Implementers **must** be [`Send`] + [`Sync`]: the harness scans files
/// concurrently on a worker pool. Adapters do not retry; retry policy
/// belongs to [`harness::run`](crate::harness::run).
pub trait Engine: Send + Sync {
    /// Short identifier used in logs and `check-engine` output.
    fn name(&self) -> &str;

    /// Returns `true` if the engine can be invoked at all.
    fn is_available(&self) -> bool;

    /// Scans one fixture file.
    ///
    /// # Errors
    ///
    /// [`EngineError`] when the invocation fails, times out, or returns
    /// output that cannot be normalized. Failure is never reported as an
    /// empty match list.
    fn scan(&self, file: &FixtureFile) -> Result<Vec<MatchRecord>, EngineError>;
}

/// Builds the engine adapter described by `config.engine`.
pub fn from_config(config: &Config) -> Box<dyn Engine> {
    Box::new(command::CommandEngine::from_config(&config.engine))
}

/// Returns `true` if an executable named `cmd` exists on `PATH`.
///
/// On Unix the file must also have an executable permission bit set.
pub fn which_exists(cmd: &str) -> bool {
    std::env::var_os("PATH")
        .map(|path| {
            std::env::split_paths(&path).any(|dir| {
                let candidate = dir.join(cmd);
                if !candidate.is_file() {
                    return false;
                }
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    std::fs::metadata(&candidate)
                        .map(|m| m.permissions().mode() & 0o111 != 0)
                        .unwrap_or(false)
                }
                #[cfg(not(unix))]
                {
                    true
                }
            })
        })
        .unwrap_or(false)
}
