//! Commits as seen by polling, the input of the exclusion chain.

use serde::{Deserialize, Serialize};

use super::revision::ObjectId;

/// One commit found between the last build and a candidate revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitChange {
    pub id: ObjectId,
    pub author_name: String,
    pub author_email: String,
    /// Committer time, seconds since the epoch.
    pub commit_time: i64,
    /// Full commit message (subject and body).
    pub message: String,
    /// Paths touched by the commit, relative to the repository root.
    pub affected_paths: Vec<String>,
}

impl CommitChange {
    /// First line of the message.
    pub fn subject(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }
}
