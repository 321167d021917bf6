//! Default chooser: build the branches matching the configured specs.

use std::sync::OnceLock;

use regex::Regex;

use crate::branch_spec::{compile_specs, sort_branches_for_revision, BranchSpec};
use crate::commit_order::CommitOrder;
use crate::domain::error::Result;
use crate::domain::revision::{revisions_from_tips, Branch, ObjectId, Revision};
use crate::obs;
use crate::repository::RepositoryAccess;

use super::inverse::BUILDING_LAST_REVISION;
use super::{BuildChooser, ChooserContext, HEAD_SPEC};

/// Branch name given to a revision built from a bare commit hash.
pub const DETACHED: &str = "detached";

fn commit_hash_hint() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9a-f]{6,40}$").expect("static regex"))
}

/// Selects branch tips matching any configured spec, oldest first.
///
/// A plain single-branch hint (no wildcard, not a `:regex`) short-cuts the
/// scan and resolves that one branch directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultChooser;

impl DefaultChooser {
    fn is_advanced(hint: Option<&str>) -> bool {
        match hint {
            None => true,
            Some(h) => h.contains('*') || h.starts_with(':'),
        }
    }

    fn single_branch(
        &self,
        is_poll: bool,
        hint: &str,
        repo: &dyn RepositoryAccess,
        ctx: &ChooserContext<'_>,
    ) -> Result<Vec<Revision>> {
        if !is_poll && commit_hash_hint().is_match(hint) {
            if let Some(sha1) = repo.rev_parse(hint)? {
                tracing::debug!(sha1 = %sha1, "building detached commit");
                let branch = Branch::new(DETACHED, sha1.clone());
                return Ok(vec![Revision::with_branches(sha1, vec![branch])]);
            }
            // Not a commit; may still be a branch called e.g. "badface".
        }

        let mut qualified: Vec<String> = Vec::new();
        if !hint.contains('/') {
            // NAME is shorthand for */NAME.
            for remote in ctx.remotes {
                qualified.push(format!("{remote}/{hint}"));
            }
        } else {
            for remote in ctx.remotes {
                let fqbn = if hint.starts_with(&format!("{remote}/")) {
                    format!("refs/remotes/{hint}")
                } else if hint.starts_with(&format!("remotes/{remote}/")) {
                    format!("refs/{hint}")
                } else if let Some(rest) = hint.strip_prefix("refs/heads/") {
                    format!("refs/remotes/{remote}/{rest}")
                } else {
                    hint.to_string()
                };
                qualified.push(fqbn);
                qualified.push(format!("refs/remotes/{remote}/{hint}"));
            }
        }

        let mut revisions: Vec<Revision> = Vec::new();
        for name in &qualified {
            for rev in self.head_revision(is_poll, name, repo, ctx)? {
                // First qualification that resolves a commit names it.
                if !revisions.iter().any(|r| r.sha1 == rev.sha1) {
                    revisions.push(rev);
                }
            }
        }

        if revisions.is_empty() {
            // Could be a tag or another non-branch ref.
            revisions = self.head_revision(is_poll, hint, repo, ctx)?;
        }
        Ok(revisions)
    }

    fn head_revision(
        &self,
        is_poll: bool,
        name: &str,
        repo: &dyn RepositoryAccess,
        ctx: &ChooserContext<'_>,
    ) -> Result<Vec<Revision>> {
        let Some(sha1) = repo.rev_parse(name)? else {
            tracing::debug!(name = %name, "ref does not resolve");
            return Ok(Vec::new());
        };
        if is_poll && ctx.history.has_been_built(&sha1) {
            return Ok(Vec::new());
        }
        let branch = Branch::new(name, sha1.clone());
        Ok(vec![Revision::with_branches(sha1, vec![branch])])
    }

    fn advanced(
        &self,
        is_poll: bool,
        repo: &dyn RepositoryAccess,
        ctx: &ChooserContext<'_>,
    ) -> Result<Vec<Revision>> {
        let tips = repo.list_branch_tips()?;
        obs::emit_selection_started(self.name(), is_poll, tips.len());

        let everything = [BranchSpec::new("**")];
        let specs: &[BranchSpec] = if ctx.branches.is_empty() {
            &everything
        } else {
            ctx.branches
        };
        let wanted = compile_specs(specs, ctx.env)?;
        let head = BranchSpec::new(HEAD_SPEC).pattern(ctx.env)?;

        let mut revisions = revisions_from_tips(tips);
        for rev in revisions.iter_mut() {
            rev.branches
                .retain(|b| wanted.iter().any(|p| p.is_match(&b.name)));
            // HEAD only counts when nothing named points here.
            if rev.branches.len() > 1 {
                rev.branches.retain(|b| !head.is_match(&b.name));
            }
        }
        revisions.retain(|r| !r.branches.is_empty());

        let revisions = repo.filter_tip_branches(revisions)?;

        let mut last_built = ctx.history.last_built_revision();
        let mut fresh = Vec::with_capacity(revisions.len());
        for rev in revisions {
            if ctx.history.has_been_built(&rev.sha1) {
                // Remember branches that now point at the last build.
                if last_built.as_ref().is_some_and(|l| l.sha1 == rev.sha1) {
                    last_built = Some(rev);
                }
            } else {
                fresh.push(rev);
            }
        }

        if !is_poll && fresh.is_empty() {
            if let Some(last) = last_built {
                ctx.log.info(BUILDING_LAST_REVISION);
                obs::emit_rerun_last_build(self.name(), last.sha1.as_str());
                obs::emit_selection_finished(self.name(), is_poll, 1);
                return Ok(vec![sort_branches_for_revision(&last, specs, ctx.env)?]);
            }
        }

        let sorted = CommitOrder::new(repo).sort(fresh)?;
        obs::emit_selection_finished(self.name(), is_poll, sorted.len());
        Ok(sorted)
    }
}

impl BuildChooser for DefaultChooser {
    fn name(&self) -> &'static str {
        "default"
    }

    fn candidate_revisions(
        &self,
        is_poll: bool,
        single_branch: Option<&str>,
        repo: &dyn RepositoryAccess,
        ctx: &ChooserContext<'_>,
    ) -> Result<Vec<Revision>> {
        let hint = single_branch.map(|h| ctx.env.expand(h.trim()));
        if Self::is_advanced(hint.as_deref()) {
            return self.advanced(is_poll, repo, ctx);
        }
        // Not advanced, so a hint is present.
        let hint = hint.unwrap_or_default();
        let revisions = self.single_branch(is_poll, &hint, repo, ctx)?;
        obs::emit_selection_finished(self.name(), is_poll, revisions.len());
        Ok(revisions)
    }
}

/// Whether `id` looks like the output of a detached single-commit build.
pub fn is_detached(rev: &Revision, id: &ObjectId) -> bool {
    &rev.sha1 == id && rev.contains_branch_name(DETACHED)
}
