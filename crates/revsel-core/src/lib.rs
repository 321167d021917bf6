//! Revsel Core Library
//!
//! Chooses which commits of a git repository a CI job should build next:
//! branch specs, build choosers, commit-time ordering, the exclusion policy
//! chain and client capability negotiation.

pub mod branch_spec;
pub mod capability;
pub mod chooser;
pub mod commit_order;
pub mod config;
pub mod cycle;
pub mod domain;
pub mod exclusion;
pub mod fakes;
pub mod git;
pub mod history;
pub mod log;
pub mod obs;
pub mod repository;
pub mod telemetry;

pub use branch_spec::{sort_branches_for_revision, BranchSpec, EnvVars};
pub use capability::{ClientCapability, ClientKind};
pub use chooser::{
    AncestryChooser, AncestryOptions, BuildChooser, ChooserContext, ChooserKind, DefaultChooser,
    InverseChooser,
};
pub use commit_order::CommitOrder;
pub use config::SelectionConfig;
pub use cycle::{
    choose_revision_to_build, poll, poll_all, record_build, with_client, PollJob, PollOutcome,
    PollReport, PollTarget,
};
pub use domain::{
    revisions_from_tips, Branch, BranchTip, CommitChange, ObjectId, Result, Revision, RevselError,
};
pub use exclusion::{
    BranchRestriction, ExclusionChain, ExclusionContext, ExclusionPolicy, ExclusionVerdict,
    MessageExclusion, PathRestriction, PolicyConfig, PolicyKind, PollExclusion, UserExclusion,
};
pub use git::{is_git_repo, with_repository, GitCliRepository};
pub use history::{BuildHistory, BuildResult, BuiltRevision, MemoryBuildHistory};
pub use log::{BuildLog, TracingBuildLog};
pub use repository::RepositoryAccess;

/// Crate version, from Cargo metadata.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
