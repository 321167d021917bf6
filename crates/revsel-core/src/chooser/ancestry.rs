//! Ancestry chooser: the default selection, limited by commit age and by a
//! required ancestor.

use chrono::{DateTime, Days, Local, NaiveDate, NaiveTime, TimeZone};
use serde::{Deserialize, Serialize};

use crate::domain::error::Result;
use crate::domain::revision::{ObjectId, Revision};
use crate::obs;
use crate::repository::RepositoryAccess;

use super::{BuildChooser, ChooserContext, DefaultChooser};

/// Limits applied on top of the default selection. Both are off by default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AncestryOptions {
    /// Keep commits made after local midnight this many days ago.
    #[serde(default)]
    pub maximum_age_days: Option<u32>,
    /// Keep only revisions that contain this commit. Blank disables it.
    #[serde(default)]
    pub ancestor_commit: Option<String>,
}

impl AncestryOptions {
    /// The required ancestor, parsed. A malformed id is an error.
    pub fn ancestor(&self) -> Result<Option<ObjectId>> {
        match self.ancestor_commit.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(sha) => sha.parse().map(Some),
        }
    }
}

/// Unix time of local midnight `days` days before `now`.
fn cutoff(now: DateTime<Local>, days: u32) -> i64 {
    let day = now
        .date_naive()
        .checked_sub_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MIN);
    let midnight = day.and_time(NaiveTime::MIN);
    // No local midnight on DST-gap days; fall back to the UTC reading.
    Local
        .from_local_datetime(&midnight)
        .earliest()
        .map_or_else(|| midnight.and_utc().timestamp(), |t| t.timestamp())
}

/// Runs the default chooser, then drops candidates that are too old or do
/// not descend from the configured ancestor.
#[derive(Debug, Clone, Default)]
pub struct AncestryChooser {
    options: AncestryOptions,
}

impl AncestryChooser {
    pub fn new(options: AncestryOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &AncestryOptions {
        &self.options
    }

    fn filter(
        &self,
        candidates: Vec<Revision>,
        repo: &dyn RepositoryAccess,
        now: DateTime<Local>,
    ) -> Result<Vec<Revision>> {
        let ancestor = self.options.ancestor()?;
        let oldest = self.options.maximum_age_days.map(|d| cutoff(now, d));
        if ancestor.is_none() && oldest.is_none() {
            return Ok(candidates);
        }

        let mut kept = Vec::with_capacity(candidates.len());
        for rev in candidates {
            if let Some(oldest) = oldest {
                if repo.commit_time(&rev.sha1)? <= oldest {
                    tracing::debug!(sha1 = %rev.sha1, "candidate older than maximum age");
                    continue;
                }
            }
            if let Some(ancestor) = &ancestor {
                if !repo.is_ancestor(ancestor, &rev.sha1)? {
                    tracing::debug!(sha1 = %rev.sha1, ancestor = %ancestor, "candidate lacks ancestor");
                    continue;
                }
            }
            kept.push(rev);
        }
        Ok(kept)
    }
}

impl BuildChooser for AncestryChooser {
    fn name(&self) -> &'static str {
        "ancestry"
    }

    fn candidate_revisions(
        &self,
        is_poll: bool,
        single_branch: Option<&str>,
        repo: &dyn RepositoryAccess,
        ctx: &ChooserContext<'_>,
    ) -> Result<Vec<Revision>> {
        let candidates = DefaultChooser.candidate_revisions(is_poll, single_branch, repo, ctx)?;
        let kept = self.filter(candidates, repo, Local::now())?;
        obs::emit_selection_finished(self.name(), is_poll, kept.len());
        Ok(kept)
    }
}
