//! Ignore commits that only touch certain paths.

use regex::Regex;

use crate::domain::change::CommitChange;
use crate::domain::error::{Result, RevselError};
use crate::obs;

use super::{ExclusionContext, ExclusionPolicy, ExclusionVerdict};

/// Restricts polling to included regions and ignores excluded regions.
///
/// Regions are newline-separated regexes matched against the whole path.
/// With included regions configured, only paths inside them count. A commit
/// is excluded when every counted path also falls in an excluded region,
/// which includes the case where no path was counted at all.
#[derive(Debug, Clone)]
pub struct PathRestriction {
    included: Vec<Regex>,
    excluded: Vec<Regex>,
}

fn compile_regions(regions: &str) -> Result<Vec<Regex>> {
    regions
        .split(['\r', '\n'])
        .filter(|r| !r.trim().is_empty())
        .map(|r| {
            Regex::new(&format!("^(?:{r})$")).map_err(|e| {
                RevselError::Config(format!("invalid path region '{r}': {e}"))
            })
        })
        .collect()
}

impl PathRestriction {
    pub fn new(included_regions: &str, excluded_regions: &str) -> Result<Self> {
        Ok(Self {
            included: compile_regions(included_regions)?,
            excluded: compile_regions(excluded_regions)?,
        })
    }

    fn any_match(patterns: &[Regex], path: &str) -> bool {
        patterns.iter().any(|p| p.is_match(path))
    }
}

impl ExclusionPolicy for PathRestriction {
    fn name(&self) -> &'static str {
        "path_restriction"
    }

    fn evaluate(
        &self,
        commit: &CommitChange,
        ctx: &ExclusionContext<'_>,
    ) -> Result<ExclusionVerdict> {
        if commit.affected_paths.is_empty() {
            return Ok(ExclusionVerdict::Abstain);
        }

        let counted: Vec<&str> = commit
            .affected_paths
            .iter()
            .map(String::as_str)
            .filter(|p| self.included.is_empty() || Self::any_match(&self.included, p))
            .collect();

        let excluded: Vec<&str> = counted
            .iter()
            .copied()
            .filter(|p| Self::any_match(&self.excluded, p))
            .collect();

        if counted.len() != excluded.len() {
            return Ok(ExclusionVerdict::Abstain);
        }

        let listed = excluded.join(", ");
        ctx.log.info(&format!(
            "Ignored commit {}: Found only excluded paths: {listed}",
            commit.id
        ));
        obs::emit_commit_excluded(self.name(), commit.id.as_str(), &listed);
        Ok(ExclusionVerdict::Exclude)
    }

    fn requires_workspace_for_polling(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::revision::ObjectId;
    use crate::fakes::ExclusionFixture;

    fn commit(paths: &[&str]) -> CommitChange {
        CommitChange {
            id: ObjectId::try_from("ef".repeat(20)).unwrap(),
            author_name: "dev".to_string(),
            author_email: "dev@example.com".to_string(),
            commit_time: 0,
            message: "change".to_string(),
            affected_paths: paths.iter().map(|p| p.to_string()).collect(),
        }
    }

    fn verdict(policy: &PathRestriction, paths: &[&str]) -> ExclusionVerdict {
        policy
            .evaluate(&commit(paths), &ExclusionFixture::new().ctx())
            .unwrap()
    }

    #[test]
    fn test_only_excluded_paths_is_excluded() {
        let policy = PathRestriction::new("", "docs/.*\n.*\\.md").unwrap();
        assert_eq!(verdict(&policy, &["docs/a.txt", "README.md"]), ExclusionVerdict::Exclude);
        assert_eq!(verdict(&policy, &["docs/a.txt", "src/lib.rs"]), ExclusionVerdict::Abstain);
    }

    #[test]
    fn test_regions_are_anchored() {
        let policy = PathRestriction::new("", "docs").unwrap();
        assert_eq!(verdict(&policy, &["docs/a.txt"]), ExclusionVerdict::Abstain);
        assert_eq!(verdict(&policy, &["docs"]), ExclusionVerdict::Exclude);
    }

    #[test]
    fn test_nothing_included_is_excluded() {
        let policy = PathRestriction::new("src/.*", "").unwrap();
        assert_eq!(verdict(&policy, &["docs/a.txt"]), ExclusionVerdict::Exclude);
        assert_eq!(verdict(&policy, &["src/main.rs"]), ExclusionVerdict::Abstain);
    }

    #[test]
    fn test_included_then_excluded() {
        let policy = PathRestriction::new("src/.*", "src/generated/.*").unwrap();
        assert_eq!(
            verdict(&policy, &["src/generated/a.rs", "README"]),
            ExclusionVerdict::Exclude
        );
        assert_eq!(
            verdict(&policy, &["src/generated/a.rs", "src/lib.rs"]),
            ExclusionVerdict::Abstain
        );
    }

    #[test]
    fn test_no_paths_abstains() {
        let policy = PathRestriction::new("", ".*").unwrap();
        assert_eq!(verdict(&policy, &[]), ExclusionVerdict::Abstain);
    }

    #[test]
    fn test_audit_line_lists_paths() {
        let policy = PathRestriction::new("", "docs/.*").unwrap();
        let fx = ExclusionFixture::new();
        policy
            .evaluate(&commit(&["docs/a", "docs/b"]), &fx.ctx())
            .unwrap();
        assert!(fx.log.contains("Found only excluded paths: docs/a, docs/b"));
    }

    #[test]
    fn test_invalid_region_is_config_error() {
        let err = PathRestriction::new("(", "").unwrap_err();
        assert!(matches!(err, RevselError::Config(_)));
    }
}
