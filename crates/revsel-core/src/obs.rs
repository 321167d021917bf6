//! Structured observability events for selection, polling and exclusion.
//!
//! Events are emitted at `info!` level unless noted; filter with `RUST_LOG`.

use tracing::{info, warn};

use crate::capability::{ClientCapability, ClientKind};

/// RAII guard that enters a repository-scoped span for one cycle.
///
/// ```ignore
/// let _span = CycleSpan::enter("/srv/repos/app", "poll");
/// ```
pub struct CycleSpan {
    _span: tracing::span::EnteredSpan,
}

impl CycleSpan {
    pub fn enter(repository: &str, mode: &str) -> Self {
        let span = tracing::info_span!("revsel.cycle", repository = %repository, mode = %mode);
        Self {
            _span: span.entered(),
        }
    }
}

pub fn emit_selection_started(chooser: &str, is_poll: bool, branch_tips: usize) {
    info!(
        event = "selection.started",
        chooser = %chooser,
        is_poll = is_poll,
        branch_tips = branch_tips,
    );
}

pub fn emit_selection_finished(chooser: &str, is_poll: bool, candidates: usize) {
    info!(
        event = "selection.finished",
        chooser = %chooser,
        is_poll = is_poll,
        candidates = candidates,
    );
}

/// Every branch was excluded by configuration (warning level).
pub fn emit_all_excluded(chooser: &str) {
    warn!(event = "selection.all_excluded", chooser = %chooser);
}

pub fn emit_rerun_last_build(chooser: &str, sha1: &str) {
    info!(event = "selection.rerun_last_build", chooser = %chooser, sha1 = %sha1);
}

pub fn emit_commit_excluded(policy: &str, commit: &str, detail: &str) {
    info!(
        event = "exclusion.commit_excluded",
        policy = %policy,
        commit = %commit,
        detail = %detail,
    );
}

pub fn emit_capability_resolved(required: ClientCapability, client: ClientKind) {
    info!(
        event = "capability.resolved",
        required = %required,
        client = %client,
    );
}

pub fn emit_poll_finished(repository: &str, significant: bool, duration_ms: u64) {
    info!(
        event = "poll.finished",
        repository = %repository,
        significant = significant,
        duration_ms = duration_ms,
    );
}

/// A poll job failed; the other jobs keep going (warning level).
pub fn emit_poll_error(repository: &str, error: &dyn std::fmt::Display) {
    warn!(event = "poll.error", repository = %repository, error = %error);
}
