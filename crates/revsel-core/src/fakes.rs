//! In-memory fakes for the repository and build log (testing only)
//!
//! `FakeRepository` satisfies the `RepositoryAccess` contract over a
//! hand-built commit graph; `RecordingBuildLog` captures operator lines.
//! `ExclusionFixture` owns one of each for evaluating policies.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::branch_spec::EnvVars;
use crate::domain::change::CommitChange;
use crate::domain::error::{Result, RevselError};
use crate::domain::revision::{Branch, BranchTip, ObjectId, Revision};
use crate::exclusion::ExclusionContext;
use crate::history::MemoryBuildHistory;
use crate::log::BuildLog;
use crate::repository::RepositoryAccess;

// ---------------------------------------------------------------------------
// FakeRepository
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct FakeCommit {
    time: i64,
    parents: Vec<ObjectId>,
    change: Option<CommitChange>,
}

/// In-memory repository snapshot.
///
/// Every commit must be registered with [`FakeRepository::with_commit`];
/// asking for an unregistered object fails with `RevselError::Repository`
/// just like a missing object in a real repository.
#[derive(Debug, Default)]
pub struct FakeRepository {
    tips: Vec<BranchTip>,
    commits: HashMap<ObjectId, FakeCommit>,
    commit_time_calls: AtomicUsize,
}

impl FakeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_commit(mut self, id: ObjectId, time: i64) -> Self {
        self.commits.insert(
            id,
            FakeCommit {
                time,
                parents: Vec::new(),
                change: None,
            },
        );
        self
    }

    /// Register `child` as a descendant of `parent`. Both must be known.
    pub fn with_parent(mut self, child: &ObjectId, parent: &ObjectId) -> Self {
        if let Some(commit) = self.commits.get_mut(child) {
            commit.parents.push(parent.clone());
        }
        self
    }

    /// A branch tip or tag pointing at `id`.
    pub fn with_tip(mut self, name: &str, id: &ObjectId) -> Self {
        self.tips.push(Branch::new(name, id.clone()));
        self
    }

    /// Attach author, message and paths to an already registered commit.
    pub fn with_change(mut self, change: CommitChange) -> Self {
        if let Some(commit) = self.commits.get_mut(&change.id) {
            commit.change = Some(change);
        }
        self
    }

    /// How many times `commit_time` reached the object store.
    pub fn commit_time_calls(&self) -> usize {
        self.commit_time_calls.load(Ordering::SeqCst)
    }

    fn commit(&self, id: &ObjectId) -> Result<&FakeCommit> {
        self.commits.get(id).ok_or_else(|| RevselError::Repository {
            object: id.to_string(),
            reason: "object not found".to_string(),
        })
    }

    /// `id` and every commit reachable from it.
    fn ancestry(&self, id: &ObjectId) -> Result<Vec<ObjectId>> {
        let mut seen: HashSet<ObjectId> = HashSet::new();
        let mut order = Vec::new();
        let mut stack = vec![id.clone()];
        while let Some(next) = stack.pop() {
            if !seen.insert(next.clone()) {
                continue;
            }
            let commit = self.commit(&next)?;
            for parent in commit.parents.iter().rev() {
                stack.push(parent.clone());
            }
            order.push(next);
        }
        Ok(order)
    }

    fn change_of(&self, id: &ObjectId) -> Result<CommitChange> {
        let commit = self.commit(id)?;
        Ok(commit.change.clone().unwrap_or_else(|| CommitChange {
            id: id.clone(),
            author_name: "Fake Author".to_string(),
            author_email: "fake@example.com".to_string(),
            commit_time: commit.time,
            message: format!("commit {}", id.short()),
            affected_paths: Vec::new(),
        }))
    }
}

impl RepositoryAccess for FakeRepository {
    fn list_branch_tips(&self) -> Result<Vec<BranchTip>> {
        Ok(self.tips.clone())
    }

    fn filter_tip_branches(&self, revisions: Vec<Revision>) -> Result<Vec<Revision>> {
        let mut covered: HashSet<ObjectId> = HashSet::new();
        for rev in &revisions {
            // Strict ancestors only; a revision never hides itself.
            for ancestor in self.ancestry(&rev.sha1)?.into_iter().skip(1) {
                covered.insert(ancestor);
            }
        }
        Ok(revisions
            .into_iter()
            .filter(|r| !covered.contains(&r.sha1))
            .collect())
    }

    fn commit_time(&self, id: &ObjectId) -> Result<i64> {
        self.commit_time_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.commit(id)?.time)
    }

    fn rev_parse(&self, rev: &str) -> Result<Option<ObjectId>> {
        let rev = rev.trim();
        let by_name = self.tips.iter().find(|t| {
            t.name == rev || rev.strip_prefix("refs/remotes/") == Some(t.name.as_str())
        });
        if let Some(tip) = by_name {
            return Ok(Some(tip.sha1.clone()));
        }
        if rev.len() >= 4 && rev.chars().all(|c| c.is_ascii_hexdigit()) {
            let lower = rev.to_ascii_lowercase();
            let mut hits = self.commits.keys().filter(|id| id.as_str().starts_with(&lower));
            if let (Some(id), None) = (hits.next(), hits.next()) {
                return Ok(Some(id.clone()));
            }
        }
        Ok(None)
    }

    fn is_ancestor(&self, ancestor: &ObjectId, descendant: &ObjectId) -> Result<bool> {
        self.commit(ancestor)?;
        Ok(self.ancestry(descendant)?.contains(ancestor))
    }

    fn branches_containing(&self, id: &ObjectId) -> Result<Vec<String>> {
        self.commit(id)?;
        let mut names = Vec::new();
        for tip in self.tips.iter().filter(|t| !t.name.starts_with("refs/")) {
            if self.ancestry(&tip.sha1)?.contains(id) {
                names.push(tip.name.clone());
            }
        }
        Ok(names)
    }

    fn changes(&self, since: Option<&ObjectId>, to: &ObjectId) -> Result<Vec<CommitChange>> {
        let Some(since) = since else {
            return Ok(vec![self.change_of(to)?]);
        };
        let known: HashSet<ObjectId> = self.ancestry(since)?.into_iter().collect();
        let mut ids: Vec<ObjectId> = self
            .ancestry(to)?
            .into_iter()
            .filter(|id| !known.contains(id))
            .collect();
        // Newest first, ties in walk order.
        let mut keyed = Vec::with_capacity(ids.len());
        for id in ids.drain(..) {
            keyed.push((self.commit(&id)?.time, id));
        }
        keyed.sort_by(|a, b| b.0.cmp(&a.0));
        keyed.into_iter().map(|(_, id)| self.change_of(&id)).collect()
    }
}

// ---------------------------------------------------------------------------
// RecordingBuildLog
// ---------------------------------------------------------------------------

/// Severity of a recorded line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
}

/// Build log that keeps every line in memory.
#[derive(Debug, Default)]
pub struct RecordingBuildLog {
    lines: Mutex<Vec<(LogLevel, String)>>,
}

impl RecordingBuildLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<(LogLevel, String)> {
        self.lock().clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.with_level(LogLevel::Warn)
    }

    pub fn infos(&self) -> Vec<String> {
        self.with_level(LogLevel::Info)
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lock().iter().any(|(_, l)| l.contains(needle))
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(LogLevel, String)>> {
        self.lines.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn with_level(&self, level: LogLevel) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, line)| line.clone())
            .collect()
    }
}

impl BuildLog for RecordingBuildLog {
    fn info(&self, line: &str) {
        self.lock().push((LogLevel::Info, line.to_string()));
    }

    fn warn(&self, line: &str) {
        self.lock().push((LogLevel::Warn, line.to_string()));
    }
}

// ---------------------------------------------------------------------------
// ExclusionFixture
// ---------------------------------------------------------------------------

/// Everything an exclusion policy may consult, owned in one place.
#[derive(Debug, Default)]
pub struct ExclusionFixture {
    pub repo: FakeRepository,
    pub history: MemoryBuildHistory,
    pub env: EnvVars,
    pub log: RecordingBuildLog,
}

impl ExclusionFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_repo(repo: FakeRepository) -> Self {
        Self {
            repo,
            ..Self::default()
        }
    }

    pub fn ctx(&self) -> ExclusionContext<'_> {
        ExclusionContext {
            repo: &self.repo,
            history: &self.history,
            env: &self.env,
            log: &self.log,
        }
    }
}
