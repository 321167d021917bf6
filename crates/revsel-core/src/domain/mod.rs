//! Domain types shared by every selection strategy.

pub mod change;
pub mod error;
pub mod revision;

pub use change::CommitChange;
pub use error::{Result, RevselError};
pub use revision::{revisions_from_tips, Branch, BranchTip, ObjectId, Revision};
