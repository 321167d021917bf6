//! Ignore commits whose message matches a pattern.

use regex::Regex;

use crate::domain::change::CommitChange;
use crate::domain::error::Result;
use crate::obs;

use super::{ExclusionContext, ExclusionPolicy, ExclusionVerdict};

#[derive(Debug, Clone)]
enum Compiled {
    Empty,
    Invalid(String),
    Pattern(Regex),
}

/// Vetoes commits whose full message contains a match of a regex.
///
/// An empty or invalid pattern never excludes anything; the problem is
/// reported on the build log each time the policy is consulted.
#[derive(Debug, Clone)]
pub struct MessageExclusion {
    source: String,
    compiled: Compiled,
}

impl MessageExclusion {
    pub fn new(excluded_message: &str) -> Self {
        let compiled = if excluded_message.trim().is_empty() {
            Compiled::Empty
        } else {
            match Regex::new(excluded_message) {
                Ok(re) => Compiled::Pattern(re),
                Err(e) => Compiled::Invalid(e.to_string()),
            }
        };
        Self {
            source: excluded_message.to_string(),
            compiled,
        }
    }

    pub fn excluded_message(&self) -> &str {
        &self.source
    }
}

impl ExclusionPolicy for MessageExclusion {
    fn name(&self) -> &'static str {
        "message_exclusion"
    }

    fn evaluate(
        &self,
        commit: &CommitChange,
        ctx: &ExclusionContext<'_>,
    ) -> Result<ExclusionVerdict> {
        let pattern = match &self.compiled {
            Compiled::Pattern(re) => re,
            Compiled::Empty => {
                ctx.log.info("Excluded message pattern is empty. No commits will be excluded based on message.");
                return Ok(ExclusionVerdict::Abstain);
            }
            Compiled::Invalid(reason) => {
                ctx.log.warn(&format!(
                    "Error compiling the excluded message pattern: {reason}"
                ));
                return Ok(ExclusionVerdict::Abstain);
            }
        };

        if !pattern.is_match(&commit.message) {
            return Ok(ExclusionVerdict::Abstain);
        }
        ctx.log.info(&format!(
            "Ignored commit {}: Found excluded message: {}",
            commit.id, commit.message
        ));
        obs::emit_commit_excluded(self.name(), commit.id.as_str(), commit.subject());
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

    fn commit(message: &str) -> CommitChange {
        CommitChange {
            id: ObjectId::try_from("cd".repeat(20)).unwrap(),
            author_name: "dev".to_string(),
            author_email: "dev@example.com".to_string(),
            commit_time: 0,
            message: message.to_string(),
            affected_paths: vec![],
        }
    }

    fn run(pattern: &str, message: &str, fx: &ExclusionFixture) -> ExclusionVerdict {
        MessageExclusion::new(pattern)
            .evaluate(&commit(message), &fx.ctx())
            .unwrap()
    }

    #[test]
    fn test_matches_anywhere_in_message() {
        let fx = ExclusionFixture::new();
        let verdict = run(r"\[ci skip\]", "Bump version\n\n[ci skip]", &fx);
        assert_eq!(verdict, ExclusionVerdict::Exclude);
        assert!(fx.log.contains("Found excluded message: Bump version"));
    }

    #[test]
    fn test_non_matching_abstains() {
        let fx = ExclusionFixture::new();
        assert_eq!(run("(?i)wip", "Add parser", &fx), ExclusionVerdict::Abstain);
        assert!(fx.log.lines().is_empty());
    }

    #[test]
    fn test_empty_pattern_logs_and_abstains() {
        let fx = ExclusionFixture::new();
        assert_eq!(run("  ", "anything", &fx), ExclusionVerdict::Abstain);
        assert!(fx.log.contains("pattern is empty"));
    }

    #[test]
    fn test_invalid_pattern_logs_and_abstains() {
        let fx = ExclusionFixture::new();
        assert_eq!(run("(unclosed", "anything", &fx), ExclusionVerdict::Abstain);
        assert_eq!(fx.log.warnings().len(), 1);
        assert!(fx.log.contains("Error compiling the excluded message pattern"));
    }
}
