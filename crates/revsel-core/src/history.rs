//! Build history ledger.
//!
//! The ledger outlives every cycle. Choosers only read from it; the build
//! side appends one [`BuiltRevision`] per finished build.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::revision::{ObjectId, Revision};

/// Outcome of one build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildResult {
    Success,
    Unstable,
    Failure,
    Aborted,
    NotBuilt,
}

impl fmt::Display for BuildResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BuildResult::Success => "success",
            BuildResult::Unstable => "unstable",
            BuildResult::Failure => "failure",
            BuildResult::Aborted => "aborted",
            BuildResult::NotBuilt => "not_built",
        };
        f.write_str(s)
    }
}

/// One recorded build.
///
/// `marked` is the revision chosen for the build; `revision` is what was
/// actually built, which differs when the build merged something first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuiltRevision {
    pub build_number: u64,
    pub marked: Revision,
    pub revision: Revision,
    pub result: BuildResult,
    pub recorded_at: DateTime<Utc>,
}

impl BuiltRevision {
    /// A build of `revision` with nothing merged in, recorded now.
    pub fn new(build_number: u64, revision: Revision, result: BuildResult) -> Self {
        Self {
            build_number,
            marked: revision.clone(),
            revision,
            result,
            recorded_at: Utc::now(),
        }
    }

    pub fn with_marked(mut self, marked: Revision) -> Self {
        self.marked = marked;
        self
    }
}

/// Append-only record of previously built revisions.
///
/// Guarantees:
/// - `has_been_built` is true for the built and the marked hash of every
///   saved build.
/// - `last_built_revision` is the built revision of the latest `save_build`.
/// - Appends are serialized; implementations must be safe to share across
///   threads.
pub trait BuildHistory: Send + Sync {
    fn has_been_built(&self, sha1: &ObjectId) -> bool;

    fn last_built_revision(&self) -> Option<Revision>;

    /// Latest build that carried `branch` in its marked or built revision.
    fn last_build_of_branch(&self, branch: &str) -> Option<BuiltRevision>;

    fn save_build(&self, build: BuiltRevision);
}

#[derive(Debug, Default)]
struct Ledger {
    builds: Vec<BuiltRevision>,
    by_branch: HashMap<String, usize>,
    last: Option<usize>,
}

/// In-memory ledger, appends serialized behind a `Mutex`.
#[derive(Debug, Default)]
pub struct MemoryBuildHistory {
    ledger: Mutex<Ledger>,
}

impl MemoryBuildHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the ledger with builds, in order.
    pub fn with_builds(builds: impl IntoIterator<Item = BuiltRevision>) -> Self {
        let history = Self::new();
        for build in builds {
            history.save_build(build);
        }
        history
    }

    pub fn builds(&self) -> Vec<BuiltRevision> {
        self.lock().builds.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Ledger> {
        // A panic while holding the lock leaves the ledger consistent: every
        // mutation is a single push followed by index updates.
        self.ledger.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl BuildHistory for MemoryBuildHistory {
    fn has_been_built(&self, sha1: &ObjectId) -> bool {
        self.lock()
            .builds
            .iter()
            .any(|b| &b.revision.sha1 == sha1 || &b.marked.sha1 == sha1)
    }

    fn last_built_revision(&self) -> Option<Revision> {
        let ledger = self.lock();
        ledger.last.map(|i| ledger.builds[i].revision.clone())
    }

    fn last_build_of_branch(&self, branch: &str) -> Option<BuiltRevision> {
        let ledger = self.lock();
        ledger.by_branch.get(branch).map(|&i| ledger.builds[i].clone())
    }

    fn save_build(&self, build: BuiltRevision) {
        let mut ledger = self.lock();
        let index = ledger.builds.len();
        let names: Vec<String> = build
            .marked
            .branches
            .iter()
            .chain(build.revision.branches.iter())
            .map(|b| b.name.clone())
            .collect();
        for name in names {
            ledger.by_branch.insert(name, index);
        }
        ledger.builds.push(build);
        ledger.last = Some(index);
    }
}
