//! Line-oriented build log shown to operators.
//!
//! Choosers and exclusion policies write human-readable lines here (the
//! "all branches excluded" warning, exclusion audit entries). Structured
//! events for machines go through [`crate::obs`] instead.

use tracing::{info, warn};

/// `tracing` target of every [`TracingBuildLog`] line.
pub const BUILD_LOG_TARGET: &str = "revsel::build_log";

/// Append-only sink for operator-facing log lines.
pub trait BuildLog: Send + Sync {
    fn info(&self, line: &str);
    fn warn(&self, line: &str);
}

/// Forwards build log lines to `tracing`.
#[derive(Debug, Clone, Default)]
pub struct TracingBuildLog {
    scope: Option<String>,
}

impl TracingBuildLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag every line with a scope, e.g. the repository being polled.
    pub fn scoped(scope: impl Into<String>) -> Self {
        Self {
            scope: Some(scope.into()),
        }
    }
}

impl BuildLog for TracingBuildLog {
    fn info(&self, line: &str) {
        match &self.scope {
            Some(scope) => info!(target: BUILD_LOG_TARGET, scope = %scope, "{line}"),
            None => info!(target: BUILD_LOG_TARGET, "{line}"),
        }
    }

    fn warn(&self, line: &str) {
        match &self.scope {
            Some(scope) => warn!(target: BUILD_LOG_TARGET, scope = %scope, "{line}"),
            None => warn!(target: BUILD_LOG_TARGET, "{line}"),
        }
    }
}
