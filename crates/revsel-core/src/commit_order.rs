//! Ordering of revisions by commit time, oldest first.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::domain::error::Result;
use crate::domain::revision::{ObjectId, Revision};
use crate::repository::RepositoryAccess;

/// Compares revisions by the commit time of their commit.
///
/// Built once per repository snapshot. Commit times are memoized per hash, so
/// repeated comparisons in one sort read each object once. The borrow of the
/// repository handle keeps an instance from outliving the handle.
pub struct CommitOrder<'r> {
    repo: &'r dyn RepositoryAccess,
    times: HashMap<ObjectId, i64>,
}

impl<'r> CommitOrder<'r> {
    pub fn new(repo: &'r dyn RepositoryAccess) -> Self {
        Self {
            repo,
            times: HashMap::new(),
        }
    }

    /// Commit time of `id`, from the cache when already read.
    pub fn time(&mut self, id: &ObjectId) -> Result<i64> {
        if let Some(&t) = self.times.get(id) {
            return Ok(t);
        }
        let t = self.repo.commit_time(id)?;
        self.times.insert(id.clone(), t);
        Ok(t)
    }

    pub fn compare(&mut self, a: &Revision, b: &Revision) -> Result<Ordering> {
        let lhs = self.time(&a.sha1)?;
        let rhs = self.time(&b.sha1)?;
        Ok(lhs.cmp(&rhs))
    }

    /// Sort oldest first. Equal times keep their input order.
    ///
    /// Every commit time is read before anything moves, so a lookup failure
    /// aborts with the input untouched rather than half sorted.
    pub fn sort(&mut self, revisions: Vec<Revision>) -> Result<Vec<Revision>> {
        let mut keyed = Vec::with_capacity(revisions.len());
        for rev in revisions {
            let t = self.time(&rev.sha1)?;
            keyed.push((t, rev));
        }
        keyed.sort_by_key(|(t, _)| *t);
        Ok(keyed.into_iter().map(|(_, rev)| rev).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::RevselError;
    use crate::fakes::FakeRepository;

    fn oid(prefix: &str) -> ObjectId {
        format!("{prefix:0<40}").parse().unwrap()
    }

    fn repo() -> FakeRepository {
        FakeRepository::new()
            .with_commit(oid("a1"), 300)
            .with_commit(oid("b1"), 100)
            .with_commit(oid("c1"), 200)
            .with_commit(oid("d1"), 200)
    }

    #[test]
    fn test_sort_is_old_to_new_for_any_input_order() {
        let repo = repo();
        let orders = [
            ["a1", "b1", "c1"],
            ["c1", "a1", "b1"],
            ["b1", "c1", "a1"],
            ["a1", "c1", "b1"],
        ];
        for order in orders {
            let revs = order.iter().map(|p| Revision::new(oid(p))).collect();
            let sorted = CommitOrder::new(&repo).sort(revs).unwrap();
            let got: Vec<ObjectId> = sorted.into_iter().map(|r| r.sha1).collect();
            assert_eq!(got, vec![oid("b1"), oid("c1"), oid("a1")]);
        }
    }

    #[test]
    fn test_ties_keep_input_order() {
        let repo = repo();
        let revs = vec![Revision::new(oid("d1")), Revision::new(oid("c1"))];
        let sorted = CommitOrder::new(&repo).sort(revs).unwrap();
        assert_eq!(sorted[0].sha1, oid("d1"));
        assert_eq!(sorted[1].sha1, oid("c1"));
    }

    #[test]
    fn test_compare() {
        let repo = repo();
        let mut order = CommitOrder::new(&repo);
        let a = Revision::new(oid("a1"));
        let b = Revision::new(oid("b1"));
        let c = Revision::new(oid("c1"));
        let d = Revision::new(oid("d1"));
        assert_eq!(order.compare(&a, &b).unwrap(), Ordering::Greater);
        assert_eq!(order.compare(&b, &a).unwrap(), Ordering::Less);
        assert_eq!(order.compare(&c, &d).unwrap(), Ordering::Equal);
    }

    #[test]
    fn test_times_are_memoized() {
        let repo = repo();
        let mut order = CommitOrder::new(&repo);
        let a = Revision::new(oid("a1"));
        let b = Revision::new(oid("b1"));
        for _ in 0..5 {
            order.compare(&a, &b).unwrap();
        }
        assert_eq!(repo.commit_time_calls(), 2);
    }

    #[test]
    fn test_missing_object_aborts() {
        let repo = repo();
        let revs = vec![Revision::new(oid("a1")), Revision::new(oid("ee"))];
        let err = CommitOrder::new(&repo).sort(revs).unwrap_err();
        assert!(matches!(err, RevselError::Repository { .. }));
    }
}
