//! Repository access through the `git` executable.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::domain::change::CommitChange;
use crate::domain::error::{Result, RevselError};
use crate::domain::revision::{Branch, BranchTip, ObjectId, Revision};
use crate::repository::RepositoryAccess;

const RECORD_SEP: char = '\u{1e}';
const FIELD_SEP: char = '\u{1f}';

/// Check whether a directory is inside a git work tree (or is a bare repo).
pub fn is_git_repo(dir: &Path) -> bool {
    Command::new("git")
        .args(["rev-parse", "--git-dir"])
        .current_dir(dir)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Open a handle on `path`, run `f`, and release the handle on every exit
/// path, including errors returned by `f`.
pub fn with_repository<T, F>(path: &Path, f: F) -> Result<T>
where
    F: FnOnce(&GitCliRepository) -> Result<T>,
{
    let repo = GitCliRepository::open(path)?;
    f(&repo)
}

/// Repository handle backed by the `git` command line client.
#[derive(Debug, Clone)]
pub struct GitCliRepository {
    path: PathBuf,
}

impl GitCliRepository {
    /// Open the repository at `path`. Fails if it is not a git repository.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !is_git_repo(&path) {
            return Err(RevselError::Git(format!(
                "{} is not a git repository",
                path.display()
            )));
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn git(&self, args: &[&str]) -> Result<std::process::Output> {
        debug!(repo = %self.path.display(), ?args, "running git");
        Command::new("git")
            .args(args)
            .current_dir(&self.path)
            .output()
            .map_err(|e| RevselError::Git(format!("failed to run git: {e}")))
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        let output = self.git(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RevselError::Git(format!(
                "git {} failed: {}",
                args.join(" "),
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl RepositoryAccess for GitCliRepository {
    fn list_branch_tips(&self) -> Result<Vec<BranchTip>> {
        // `*objectname` is the peeled commit for annotated tags, empty otherwise.
        let out = self.run(&[
            "for-each-ref",
            "--format=%(objectname) %(*objectname) %(refname)",
            "refs/remotes",
            "refs/tags",
        ])?;

        let mut tips = Vec::new();
        for line in out.lines() {
            let mut parts = line.split(' ');
            let (Some(object), Some(peeled), Some(refname)) =
                (parts.next(), parts.next(), parts.next())
            else {
                continue;
            };
            let sha = if peeled.is_empty() { object } else { peeled };
            let sha1: ObjectId = sha.parse()?;

            let name = if let Some(remote) = refname.strip_prefix("refs/remotes/") {
                remote.to_string()
            } else {
                refname.to_string()
            };
            tips.push(Branch::new(name, sha1));
        }
        Ok(tips)
    }

    fn filter_tip_branches(&self, revisions: Vec<Revision>) -> Result<Vec<Revision>> {
        if revisions.len() <= 1 {
            return Ok(revisions);
        }

        let mut args = vec!["merge-base", "--independent"];
        args.extend(revisions.iter().map(|r| r.sha1.as_str()));
        let out = self.run(&args)?;

        let independent: HashSet<ObjectId> = out
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| l.trim().parse::<ObjectId>())
            .collect::<Result<_>>()?;

        Ok(revisions
            .into_iter()
            .filter(|r| independent.contains(&r.sha1))
            .collect())
    }

    fn commit_time(&self, id: &ObjectId) -> Result<i64> {
        let spec = format!("{}^{{commit}}", id.as_str());
        let output = self.git(&["show", "-s", "--format=%ct", &spec])?;
        if !output.status.success() {
            return Err(RevselError::Repository {
                object: id.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout
            .trim()
            .parse::<i64>()
            .map_err(|e| RevselError::Repository {
                object: id.to_string(),
                reason: format!("unreadable commit time '{}': {e}", stdout.trim()),
            })
    }

    fn rev_parse(&self, rev: &str) -> Result<Option<ObjectId>> {
        let spec = format!("{rev}^{{commit}}");
        let output = self.git(&["rev-parse", "--verify", "--quiet", &spec])?;
        if !output.status.success() {
            return Ok(None);
        }
        let sha = String::from_utf8_lossy(&output.stdout);
        Ok(Some(sha.parse()?))
    }

    fn is_ancestor(&self, ancestor: &ObjectId, descendant: &ObjectId) -> Result<bool> {
        let output = self.git(&[
            "merge-base",
            "--is-ancestor",
            ancestor.as_str(),
            descendant.as_str(),
        ])?;
        // 0: ancestor, 1: not an ancestor, anything else: unreadable object.
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(RevselError::Repository {
                object: format!("{ancestor}..{descendant}"),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
        }
    }

    fn branches_containing(&self, id: &ObjectId) -> Result<Vec<String>> {
        let out = self.run(&[
            "branch",
            "-r",
            "--contains",
            id.as_str(),
            "--format=%(refname)",
        ])?;
        Ok(out
            .lines()
            .filter_map(|l| l.trim().strip_prefix("refs/remotes/"))
            .map(str::to_string)
            .collect())
    }

    fn changes(&self, since: Option<&ObjectId>, to: &ObjectId) -> Result<Vec<CommitChange>> {
        let format = format!("--format={RECORD_SEP}%H{FIELD_SEP}%an{FIELD_SEP}%ae{FIELD_SEP}%ct{FIELD_SEP}%B{FIELD_SEP}");
        let range = match since {
            Some(from) => format!("{from}..{to}"),
            None => to.to_string(),
        };
        let mut args = vec!["log", "--name-only", format.as_str()];
        if since.is_none() {
            args.push("-1");
        }
        args.push(range.as_str());

        let out = self.run(&args)?;
        out.split(RECORD_SEP)
            .filter(|record| !record.trim().is_empty())
            .map(parse_change_record)
            .collect()
    }
}

fn parse_change_record(record: &str) -> Result<CommitChange> {
    let fields: Vec<&str> = record.splitn(6, FIELD_SEP).collect();
    if fields.len() != 6 {
        return Err(RevselError::Git(format!(
            "unexpected git log record: {record:?}"
        )));
    }
    let id: ObjectId = fields[0].parse()?;
    let commit_time = fields[3]
        .trim()
        .parse::<i64>()
        .map_err(|e| RevselError::Repository {
            object: id.to_string(),
            reason: format!("unreadable commit time: {e}"),
        })?;

    Ok(CommitChange {
        id,
        author_name: fields[1].to_string(),
        author_email: fields[2].to_string(),
        commit_time,
        message: fields[4].trim_end().to_string(),
        affected_paths: fields[5]
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command as StdCommand;

    fn run_git(repo_dir: &Path, args: &[&str], date: Option<&str>) -> String {
        let mut cmd = StdCommand::new("git");
        cmd.args(args).current_dir(repo_dir);
        if let Some(date) = date {
            cmd.env("GIT_COMMITTER_DATE", date).env("GIT_AUTHOR_DATE", date);
        }
        let output = cmd.output().unwrap();
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }

    fn commit(repo: &Path, file: &str, message: &str, epoch: i64) -> ObjectId {
        std::fs::write(repo.join(file), message).unwrap();
        let date = format!("{epoch} +0000");
        run_git(repo, &["add", file], None);
        run_git(repo, &["commit", "-q", "-m", message], Some(&date));
        run_git(repo, &["rev-parse", "HEAD"], None).parse().unwrap()
    }

    fn make_git_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        run_git(dir.path(), &["init", "-q"], None);
        run_git(dir.path(), &["config", "user.name", "test-user"], None);
        run_git(dir.path(), &["config", "user.email", "test@example.com"], None);
        dir
    }

    /// `base` -> `mid` on one line, `side` forked from `base`; remote-tracking
    /// refs written directly so no remote is needed.
    fn fixture() -> (tempfile::TempDir, ObjectId, ObjectId, ObjectId) {
        let dir = make_git_repo();
        let repo = dir.path();
        let base = commit(repo, "a.txt", "base", 1_600_000_000);
        let mid = commit(repo, "b.txt", "mid", 1_600_000_100);
        run_git(repo, &["checkout", "-q", "-b", "side", base.as_str()], None);
        let side = commit(repo, "c.txt", "side", 1_600_000_050);

        run_git(repo, &["update-ref", "refs/remotes/origin/base", base.as_str()], None);
        run_git(repo, &["update-ref", "refs/remotes/origin/master", mid.as_str()], None);
        run_git(repo, &["update-ref", "refs/remotes/origin/side", side.as_str()], None);
        run_git(repo, &["tag", "-a", "v1", "-m", "release", mid.as_str()], None);
        (dir, base, mid, side)
    }

    #[test]
    fn test_open_rejects_non_repo() {
        let dir = tempfile::tempdir().unwrap();
        assert!(GitCliRepository::open(dir.path()).is_err());
        assert!(!is_git_repo(dir.path()));
    }

    #[test]
    fn test_list_branch_tips_strips_remote_prefix_and_peels_tags() {
        let (dir, base, mid, side) = fixture();
        let repo = GitCliRepository::open(dir.path()).unwrap();
        let tips = repo.list_branch_tips().unwrap();

        let find = |name: &str| tips.iter().find(|t| t.name == name).map(|t| t.sha1.clone());
        assert_eq!(find("origin/base"), Some(base));
        assert_eq!(find("origin/master"), Some(mid.clone()));
        assert_eq!(find("origin/side"), Some(side));
        assert_eq!(find("refs/tags/v1"), Some(mid));
        // local branches are not tips
        assert!(find("side").is_none());
    }

    #[test]
    fn test_filter_tip_branches_drops_ancestors() {
        let (dir, base, mid, side) = fixture();
        let repo = GitCliRepository::open(dir.path()).unwrap();
        let revs = vec![
            Revision::new(base),
            Revision::new(mid.clone()),
            Revision::new(side.clone()),
        ];
        let tips = repo.filter_tip_branches(revs).unwrap();
        let shas: Vec<ObjectId> = tips.into_iter().map(|r| r.sha1).collect();
        assert_eq!(shas, vec![mid, side]);
    }

    #[test]
    fn test_commit_time_and_missing_object() {
        let (dir, base, mid, _side) = fixture();
        let repo = GitCliRepository::open(dir.path()).unwrap();
        assert_eq!(repo.commit_time(&base).unwrap(), 1_600_000_000);
        assert_eq!(repo.commit_time(&mid).unwrap(), 1_600_000_100);

        let missing: ObjectId = "0123456789".repeat(4).parse().unwrap();
        let err = repo.commit_time(&missing).unwrap_err();
        assert!(matches!(err, RevselError::Repository { .. }));
    }

    #[test]
    fn test_rev_parse() {
        let (dir, _base, mid, _side) = fixture();
        let repo = GitCliRepository::open(dir.path()).unwrap();
        assert_eq!(repo.rev_parse("refs/remotes/origin/master").unwrap(), Some(mid.clone()));
        assert_eq!(repo.rev_parse("refs/tags/v1").unwrap(), Some(mid));
        assert_eq!(repo.rev_parse("refs/remotes/origin/nope").unwrap(), None);
    }

    #[test]
    fn test_changes_lists_commits_with_paths() {
        let (dir, base, mid, _side) = fixture();
        let repo = GitCliRepository::open(dir.path()).unwrap();

        let changes = repo.changes(Some(&base), &mid).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].id, mid);
        assert_eq!(changes[0].author_name, "test-user");
        assert_eq!(changes[0].message, "mid");
        assert_eq!(changes[0].affected_paths, vec!["b.txt".to_string()]);

        let single = repo.changes(None, &base).unwrap();
        assert_eq!(single.len(), 1);
        assert_eq!(single[0].id, base);
        assert_eq!(single[0].commit_time, 1_600_000_000);
    }

    #[test]
    fn test_is_ancestor() {
        let (dir, base, mid, side) = fixture();
        let repo = GitCliRepository::open(dir.path()).unwrap();
        assert!(repo.is_ancestor(&base, &mid).unwrap());
        assert!(repo.is_ancestor(&mid, &mid).unwrap());
        assert!(!repo.is_ancestor(&side, &mid).unwrap());

        let missing: ObjectId = "0123456789".repeat(4).parse().unwrap();
        let err = repo.is_ancestor(&missing, &mid).unwrap_err();
        assert!(matches!(err, RevselError::Repository { .. }));
    }

    #[test]
    fn test_branches_containing_lists_remote_branches() {
        let (dir, base, mid, side) = fixture();
        let repo = GitCliRepository::open(dir.path()).unwrap();

        let mut all = repo.branches_containing(&base).unwrap();
        all.sort();
        assert_eq!(all, vec!["origin/base", "origin/master", "origin/side"]);
        assert_eq!(repo.branches_containing(&mid).unwrap(), vec!["origin/master"]);
        assert_eq!(repo.branches_containing(&side).unwrap(), vec!["origin/side"]);
    }

    #[test]
    fn test_with_repository_scopes_the_handle() {
        let (dir, _base, _mid, _side) = fixture();
        let count = with_repository(dir.path(), |repo| Ok(repo.list_branch_tips()?.len())).unwrap();
        assert_eq!(count, 4);
    }
}
