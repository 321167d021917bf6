//! Commits, branch tips and the revisions built from them.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::RevselError;

/// Content-addressed commit hash.
///
/// Always lowercase hex, 40 chars (SHA-1) or 64 chars (SHA-256). The inner
/// field is private so every value has gone through validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectId(String);

impl ObjectId {
    /// Return the full hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form (first 7 hex chars), as git prints it.
    pub fn short(&self) -> &str {
        &self.0[..7.min(self.0.len())]
    }
}

impl TryFrom<String> for ObjectId {
    type Error = RevselError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        let valid_len = s.len() == 40 || s.len() == 64;
        if !valid_len || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(RevselError::InvalidObjectId(s));
        }
        Ok(ObjectId(s.to_ascii_lowercase()))
    }
}

impl FromStr for ObjectId {
    type Err = RevselError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        ObjectId::try_from(s.trim().to_string())
    }
}

impl From<ObjectId> for String {
    fn from(id: ObjectId) -> Self {
        id.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named ref pointing at a commit.
///
/// Remote-tracking branches are named `remote/branch` (e.g. `origin/master`),
/// tags `refs/tags/<tag>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
    pub sha1: ObjectId,
}

impl Branch {
    pub fn new(name: impl Into<String>, sha1: ObjectId) -> Self {
        Self {
            name: name.into(),
            sha1,
        }
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Branch {} ({})", self.name, self.sha1.short())
    }
}

/// A branch tip as reported by the repository layer.
pub type BranchTip = Branch;

/// One commit plus every branch name currently pointing at it.
///
/// Selection works on owned copies: choosers remove branch names from their
/// own `Revision` values while filtering, the hash never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    pub sha1: ObjectId,
    pub branches: Vec<Branch>,
}

impl Revision {
    /// A revision with no branches attached (e.g. a detached build).
    pub fn new(sha1: ObjectId) -> Self {
        Self {
            sha1,
            branches: Vec::new(),
        }
    }

    pub fn with_branches(sha1: ObjectId, branches: Vec<Branch>) -> Self {
        Self { sha1, branches }
    }

    pub fn contains_branch_name(&self, name: &str) -> bool {
        self.branches.iter().any(|b| b.name == name)
    }

    pub fn branch_names(&self) -> Vec<&str> {
        self.branches.iter().map(|b| b.name.as_str()).collect()
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Revision {} ({})",
            self.sha1,
            self.branch_names().join(", ")
        )
    }
}

/// Group branch tips into revisions, one per distinct hash.
///
/// Revisions come out in the order their hash was first seen and keep the
/// tips' relative order, so the same snapshot always yields the same list.
pub fn revisions_from_tips(tips: Vec<BranchTip>) -> Vec<Revision> {
    let mut index: HashMap<ObjectId, usize> = HashMap::new();
    let mut revisions: Vec<Revision> = Vec::new();
    for tip in tips {
        match index.get(&tip.sha1) {
            Some(&i) => revisions[i].branches.push(tip),
            None => {
                index.insert(tip.sha1.clone(), revisions.len());
                revisions.push(Revision::with_branches(tip.sha1.clone(), vec![tip]));
            }
        }
    }
    revisions
}
