//! Poll and build cycles.
//!
//! A poll asks the chooser for candidates and runs each through the
//! exclusion chain; a build takes the first candidate. [`poll_all`] runs
//! independent repositories concurrently, one handle per job.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::task::JoinSet;

use crate::capability::ClientKind;
use crate::chooser::{BuildChooser, ChooserContext};
use crate::config::SelectionConfig;
use crate::domain::error::{Result, RevselError};
use crate::domain::revision::{ObjectId, Revision};
use crate::exclusion::{ExclusionChain, ExclusionContext};
use crate::git::with_repository;
use crate::history::{BuildHistory, BuildResult, BuiltRevision};
use crate::log::{BuildLog, TracingBuildLog};
use crate::obs::{self, CycleSpan};
use crate::repository::RepositoryAccess;

/// Result of one poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PollOutcome {
    /// A candidate has at least one commit that is not excluded.
    Significant { revision: Revision },
    NoChanges,
}

impl PollOutcome {
    pub fn is_significant(&self) -> bool {
        matches!(self, PollOutcome::Significant { .. })
    }
}

/// Open a repository with the resolved backend for the duration of `f`.
pub fn with_client<T, F>(client: ClientKind, path: &Path, f: F) -> Result<T>
where
    F: FnOnce(&dyn RepositoryAccess) -> Result<T>,
{
    match client {
        ClientKind::Cli => with_repository(path, |repo| f(repo)),
        ClientKind::Embedded => Err(RevselError::UnsupportedClient(client)),
    }
}

/// Commit the changes of `candidate` are counted from: the last build of
/// one of its branches, else the last build overall.
fn previous_build(history: &dyn BuildHistory, candidate: &Revision) -> Option<ObjectId> {
    candidate
        .branches
        .iter()
        .find_map(|b| history.last_build_of_branch(&b.name))
        .map(|b| b.revision.sha1)
        .or_else(|| history.last_built_revision().map(|r| r.sha1))
}

/// Check whether anything worth building appeared.
///
/// Candidates are examined oldest first; the first one with a commit the
/// chain does not exclude wins. A candidate whose changes cannot be read or
/// judged counts as significant.
pub fn poll(
    repo: &dyn RepositoryAccess,
    chooser: &dyn BuildChooser,
    chain: &ExclusionChain,
    ctx: &ChooserContext<'_>,
    single_branch: Option<&str>,
) -> Result<PollOutcome> {
    let candidates = chooser.candidate_revisions(true, single_branch, repo, ctx)?;
    let exclusion = ExclusionContext {
        repo,
        history: ctx.history,
        env: ctx.env,
        log: ctx.log,
    };
    for candidate in candidates {
        if chain.is_empty() {
            return Ok(PollOutcome::Significant {
                revision: candidate,
            });
        }
        let since = previous_build(ctx.history, &candidate);
        let excluded = repo
            .changes(since.as_ref(), &candidate.sha1)
            .and_then(|changes| chain.is_revision_excluded(&changes, &exclusion));
        match excluded {
            Ok(true) => ctx.log.info(&format!(
                "Ignored {candidate}: every new commit was excluded"
            )),
            Ok(false) => {
                return Ok(PollOutcome::Significant {
                    revision: candidate,
                })
            }
            Err(e) => {
                ctx.log.warn(&format!(
                    "Failed to determine if we want to exclude {}: {e}",
                    candidate.sha1
                ));
                return Ok(PollOutcome::Significant {
                    revision: candidate,
                });
            }
        }
    }
    Ok(PollOutcome::NoChanges)
}

/// The revision a build should check out, if any.
pub fn choose_revision_to_build(
    repo: &dyn RepositoryAccess,
    chooser: &dyn BuildChooser,
    ctx: &ChooserContext<'_>,
    single_branch: Option<&str>,
) -> Result<Option<Revision>> {
    let candidates = chooser.candidate_revisions(false, single_branch, repo, ctx)?;
    Ok(candidates.into_iter().next())
}

/// Append a finished build to the ledger.
pub fn record_build(
    history: &dyn BuildHistory,
    build_number: u64,
    revision: Revision,
    result: BuildResult,
) -> BuiltRevision {
    let build = BuiltRevision::new(build_number, revision, result);
    history.save_build(build.clone());
    build
}

// ---------------------------------------------------------------------------
// Concurrent polling
// ---------------------------------------------------------------------------

/// Where a poll job reads its repository from.
#[derive(Clone)]
pub enum PollTarget {
    /// Opened with the configured backend when the job runs.
    Path(PathBuf),
    /// An already open handle.
    Handle(Arc<dyn RepositoryAccess>),
}

/// One repository to poll.
#[derive(Clone)]
pub struct PollJob {
    pub name: String,
    pub target: PollTarget,
    pub config: Arc<SelectionConfig>,
    pub history: Arc<dyn BuildHistory>,
    pub single_branch: Option<String>,
}

impl PollJob {
    pub fn new(
        name: impl Into<String>,
        target: PollTarget,
        config: Arc<SelectionConfig>,
        history: Arc<dyn BuildHistory>,
    ) -> Self {
        Self {
            name: name.into(),
            target,
            config,
            history,
            single_branch: None,
        }
    }

    pub fn with_single_branch(mut self, branch: impl Into<String>) -> Self {
        self.single_branch = Some(branch.into());
        self
    }

    /// Run the whole poll synchronously on this thread.
    ///
    /// The client capability is resolved before the repository is opened.
    pub fn run(&self) -> Result<PollOutcome> {
        let _span = CycleSpan::enter(&self.name, "poll");
        let config = self.config.as_ref();
        let client = config.resolve_client()?;
        let chain = config.exclusion_chain()?;
        let chooser = config.chooser();
        let env = config.environment();
        let log = TracingBuildLog::scoped(self.name.clone());
        let ctx = ChooserContext {
            branches: config.branch_specs(),
            remotes: &config.remotes,
            env: &env,
            history: self.history.as_ref(),
            log: &log as &dyn BuildLog,
        };
        let single_branch = self.single_branch.as_deref();

        match &self.target {
            PollTarget::Path(path) => with_client(client, path, |repo| {
                poll(repo, chooser.as_ref(), &chain, &ctx, single_branch)
            }),
            PollTarget::Handle(repo) => {
                poll(repo.as_ref(), chooser.as_ref(), &chain, &ctx, single_branch)
            }
        }
    }
}

/// Per-job result of [`poll_all`].
#[derive(Debug)]
pub struct PollReport {
    pub name: String,
    pub outcome: Result<PollOutcome>,
    pub duration_ms: u64,
}

/// Poll every job concurrently. Reports come back in job order; a failing
/// job never affects the others.
pub async fn poll_all(jobs: Vec<PollJob>) -> Vec<PollReport> {
    let mut reports: Vec<PollReport> = jobs
        .iter()
        .map(|job| PollReport {
            name: job.name.clone(),
            outcome: Err(RevselError::Task("poll task did not complete".to_string())),
            duration_ms: 0,
        })
        .collect();

    let mut join_set = JoinSet::new();
    for (idx, job) in jobs.into_iter().enumerate() {
        // git is blocking; keep it off the async workers.
        join_set.spawn_blocking(move || {
            let started = Instant::now();
            let outcome = job.run();
            let duration_ms = started.elapsed().as_millis() as u64;
            (idx, outcome, duration_ms)
        });
    }

    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((idx, outcome, duration_ms)) => {
                let report = &mut reports[idx];
                match &outcome {
                    Ok(o) => obs::emit_poll_finished(&report.name, o.is_significant(), duration_ms),
                    Err(e) => obs::emit_poll_error(&report.name, e),
                }
                report.outcome = outcome;
                report.duration_ms = duration_ms;
            }
            Err(e) => {
                // The slot keeps its "did not complete" error.
                tracing::warn!(error = %e, "poll task join error");
            }
        }
    }

    reports
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branch_spec::{BranchSpec, EnvVars};
    use crate::chooser::InverseChooser;
    use crate::domain::change::CommitChange;
    use crate::exclusion::UserExclusion;
    use crate::fakes::{FakeRepository, RecordingBuildLog};
    use crate::history::MemoryBuildHistory;

    fn oid(prefix: &str) -> ObjectId {
        format!("{prefix:0<40}").parse().unwrap()
    }

    fn change(id: &str, author: &str, time: i64) -> CommitChange {
        CommitChange {
            id: oid(id),
            author_name: author.to_string(),
            author_email: format!("{author}@example.com"),
            commit_time: time,
            message: format!("work by {author}"),
            affected_paths: vec!["src/lib.rs".to_string()],
        }
    }

    /// a1 (built) <- b1 by bot on origin/feat.
    fn repo() -> FakeRepository {
        FakeRepository::new()
            .with_commit(oid("a1"), 100)
            .with_commit(oid("b1"), 200)
            .with_parent(&oid("b1"), &oid("a1"))
            .with_change(change("a1", "dev", 100))
            .with_change(change("b1", "bot", 200))
            .with_tip("origin/master", &oid("a1"))
            .with_tip("origin/feat", &oid("b1"))
    }

    fn built_master() -> MemoryBuildHistory {
        let history = MemoryBuildHistory::new();
        record_build(
            &history,
            1,
            Revision::new(oid("a1")),
            BuildResult::Success,
        );
        history
    }

    fn run_poll(chain: &ExclusionChain, history: &MemoryBuildHistory, log: &RecordingBuildLog) -> PollOutcome {
        let specs = vec![BranchSpec::new("*/master")];
        let env = EnvVars::new();
        let ctx = ChooserContext {
            branches: &specs,
            remotes: &[],
            env: &env,
            history,
            log,
        };
        poll(&repo(), &InverseChooser, chain, &ctx, None).unwrap()
    }

    #[test]
    fn test_poll_without_policies_is_significant() {
        let log = RecordingBuildLog::new();
        let outcome = run_poll(&ExclusionChain::new(), &built_master(), &log);
        match outcome {
            PollOutcome::Significant { revision } => assert_eq!(revision.sha1, oid("b1")),
            other => panic!("expected significant, got {other:?}"),
        }
    }

    #[test]
    fn test_poll_all_commits_excluded_is_no_changes() {
        let chain = ExclusionChain::new().with_policy(Box::new(UserExclusion::new("bot")));
        let log = RecordingBuildLog::new();
        let outcome = run_poll(&chain, &built_master(), &log);
        assert_eq!(outcome, PollOutcome::NoChanges);
        assert!(log.contains("Found excluded author: bot"));
        assert!(log.contains("every new commit was excluded"));
    }

    #[test]
    fn test_poll_counts_from_last_build() {
        // Nothing built yet: only the candidate commit itself is inspected.
        let chain = ExclusionChain::new().with_policy(Box::new(UserExclusion::new("dev")));
        let log = RecordingBuildLog::new();
        let outcome = run_poll(&chain, &MemoryBuildHistory::new(), &log);
        assert!(outcome.is_significant());
    }

    #[test]
    fn test_poll_with_unreadable_last_build_is_significant() {
        // The ledger points at a1, which this clone no longer has.
        let repo = FakeRepository::new()
            .with_commit(oid("b1"), 200)
            .with_change(change("b1", "bot", 200))
            .with_tip("origin/feat", &oid("b1"));
        let chain = ExclusionChain::new().with_policy(Box::new(UserExclusion::new("bot")));
        let history = built_master();
        let specs = vec![BranchSpec::new("*/master")];
        let env = EnvVars::new();
        let log = RecordingBuildLog::new();
        let ctx = ChooserContext {
            branches: &specs,
            remotes: &[],
            env: &env,
            history: &history,
            log: &log,
        };

        let outcome = poll(&repo, &InverseChooser, &chain, &ctx, None).unwrap();
        match outcome {
            PollOutcome::Significant { revision } => {
                assert_eq!(revision.sha1, oid("b1"));
                assert_eq!(revision.branch_names(), vec!["origin/feat"]);
            }
            other => panic!("expected significant, got {other:?}"),
        }
        let warnings = log.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with(&format!(
            "Failed to determine if we want to exclude {}",
            oid("b1")
        )));
        assert!(!log.contains("Found excluded author"));
    }

    #[test]
    fn test_choose_and_record() {
        let repo = repo();
        let history = built_master();
        let specs = vec![BranchSpec::new("*/master")];
        let env = EnvVars::new();
        let log = RecordingBuildLog::new();
        let ctx = ChooserContext {
            branches: &specs,
            remotes: &[],
            env: &env,
            history: &history,
            log: &log,
        };
        let chosen = choose_revision_to_build(&repo, &InverseChooser, &ctx, None)
            .unwrap()
            .unwrap();
        assert_eq!(chosen.sha1, oid("b1"));

        let build = record_build(&history, 2, chosen, BuildResult::Success);
        assert_eq!(build.build_number, 2);
        assert!(history.has_been_built(&oid("b1")));

        // Nothing new now: the build falls back to the last built revision.
        let again = choose_revision_to_build(&repo, &InverseChooser, &ctx, None)
            .unwrap()
            .unwrap();
        assert_eq!(again.sha1, oid("b1"));
    }

    #[test]
    fn test_embedded_client_is_unsupported() {
        let err = with_client(ClientKind::Embedded, Path::new("."), |_| Ok(())).unwrap_err();
        assert!(matches!(err, RevselError::UnsupportedClient(ClientKind::Embedded)));
    }
}
