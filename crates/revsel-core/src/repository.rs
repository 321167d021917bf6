//! Repository access contract used by every chooser and by polling.

use crate::domain::change::CommitChange;
use crate::domain::error::Result;
use crate::domain::revision::{BranchTip, ObjectId, Revision};

/// Read-only view of a repository snapshot.
///
/// Implementations are handles: they are opened for one cycle and dropped at
/// its end. Nothing borrowed from a handle may outlive it.
pub trait RepositoryAccess: Send + Sync {
    /// Every remote-tracking branch and tag with the commit it points at.
    fn list_branch_tips(&self) -> Result<Vec<BranchTip>>;

    /// Keep only revisions that are not ancestors of another revision in the
    /// set. Input order is preserved among the survivors.
    fn filter_tip_branches(&self, revisions: Vec<Revision>) -> Result<Vec<Revision>>;

    /// Committer time of `id` in seconds since the epoch.
    ///
    /// A missing or unreadable object is a `Repository` error.
    fn commit_time(&self, id: &ObjectId) -> Result<i64>;

    /// Resolve a ref, abbreviated hash or other revision expression.
    /// `Ok(None)` when it does not name a commit.
    fn rev_parse(&self, rev: &str) -> Result<Option<ObjectId>>;

    /// Whether `ancestor` is reachable from `descendant`. A commit is its own
    /// ancestor. Either object missing is a `Repository` error.
    fn is_ancestor(&self, ancestor: &ObjectId, descendant: &ObjectId) -> Result<bool>;

    /// Remote-tracking branches (`origin/feat`) whose history contains `id`.
    fn branches_containing(&self, id: &ObjectId) -> Result<Vec<String>>;

    /// Commits reachable from `to` but not from `since`, newest first.
    /// With no `since`, only the `to` commit itself.
    fn changes(&self, since: Option<&ObjectId>, to: &ObjectId) -> Result<Vec<CommitChange>>;
}
